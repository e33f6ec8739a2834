//! Wishlist model: an insertion-ordered set of product IDs.

use dreamweave_core::ProductId;
use serde::{Deserialize, Serialize};

/// Saved products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist {
    items: Vec<ProductId>,
}

impl Wishlist {
    /// Product IDs in the order they were saved.
    #[must_use]
    pub fn items(&self) -> &[ProductId] {
        &self.items
    }

    /// Whether `id` is saved.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.contains(id)
    }

    /// Number of saved products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now
    /// saved.
    pub(crate) fn toggle(&mut self, id: &ProductId) -> bool {
        if let Some(position) = self.items.iter().position(|item| item == id) {
            self.items.remove(position);
            false
        } else {
            self.items.push(id.clone());
            true
        }
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop duplicate IDs from a snapshot read from storage. Returns whether
    /// anything was removed.
    pub(crate) fn normalize(&mut self) -> bool {
        let before = self.items.len();
        let mut seen: Vec<ProductId> = Vec::with_capacity(before);
        self.items.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(id.clone());
                true
            }
        });
        before != self.items.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(wishlist: &Wishlist) -> Vec<&str> {
        wishlist.items().iter().map(ProductId::as_str).collect()
    }

    #[test]
    fn test_toggle_is_an_involution() {
        let mut wishlist: Wishlist = serde_json::from_str(r#"["P1","P2"]"#).unwrap();
        let p2 = ProductId::new("P2");

        assert!(!wishlist.toggle(&p2));
        assert_eq!(ids(&wishlist), vec!["P1"]);

        assert!(wishlist.toggle(&p2));
        assert_eq!(ids(&wishlist), vec!["P1", "P2"]);
    }

    #[test]
    fn test_normalize_dedupes() {
        let mut wishlist: Wishlist = serde_json::from_str(r#"["P1","P2","P1"]"#).unwrap();
        assert!(wishlist.normalize());
        assert_eq!(ids(&wishlist), vec!["P1", "P2"]);
        assert!(!wishlist.normalize());
    }
}
