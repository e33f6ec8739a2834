//! Cart model.
//!
//! A cart is an ordered list of lines. Two lines never share a [`LineKey`]:
//! adding a product with a variant selection that is already in the cart
//! increments that line instead of appending a new one.

use std::fmt;

use dreamweave_core::{Price, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StoreError;

/// Product data captured when a product is added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price at the time of adding.
    pub price: Price,
    /// Primary image URL.
    pub image: Option<String>,
}

/// Variant selection and quantity for an add-to-cart action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    /// Units to add. Must be at least 1.
    pub quantity: u32,
    /// Selected size (e.g., "king").
    pub size: Option<String>,
    /// Selected color.
    pub color: Option<String>,
    /// Selected type (e.g., "fitted", "flat").
    pub kind: Option<String>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            quantity: 1,
            size: None,
            color: None,
            kind: None,
        }
    }
}

/// Identity of a cart line: product plus variant selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: Option<String>,
    pub color: Option<String>,
    pub kind: Option<String>,
}

impl LineKey {
    /// Key for a product with no variant selection.
    #[must_use]
    pub fn product(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            size: None,
            color: None,
            kind: None,
        }
    }

    /// Set the size component.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the color component.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the type component.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |p: &Option<String>| p.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}/{}/{}/{}",
            self.product_id,
            part(&self.size),
            part(&self.color),
            part(&self.kind)
        )
    }
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
    #[serde(default)]
    pub selected_type: Option<String>,
}

impl CartLine {
    /// The line's identity.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            size: self.selected_size.clone(),
            color: self.selected_color.clone(),
            kind: self.selected_type.clone(),
        }
    }

    /// Whether this line has the given identity.
    #[must_use]
    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id
            && self.selected_size == key.size
            && self.selected_color == key.color
            && self.selected_type == key.kind
    }

    /// `unit_price × quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line with the given identity.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(key))
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of `unit_price × quantity` over all lines.
    ///
    /// A cart built through [`Cart::add`] and [`Cart::set_quantity`] always
    /// has a representable total; anything else saturates at
    /// [`Decimal::MAX`].
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.checked_total_price().unwrap_or(Decimal::MAX)
    }

    /// Sum of `unit_price × quantity`, or `None` if it overflows.
    #[must_use]
    pub fn checked_total_price(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.line_total()?))
    }

    /// Total after setting the line `key` to `quantity` units of `unit_price`.
    fn total_with(&self, key: &LineKey, unit_price: Price, quantity: u32) -> Option<Decimal> {
        let others = self
            .lines
            .iter()
            .filter(|line| !line.matches(key))
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.line_total()?))?;
        others.checked_add(unit_price.checked_times(quantity)?)
    }

    /// Add units of a product, merging with an existing line of the same key.
    pub(crate) fn add(&mut self, product: &ProductSnapshot, options: &AddOptions) -> Result<(), StoreError> {
        if options.quantity == 0 {
            return Err(StoreError::InvalidQuantity(0));
        }

        let key = LineKey {
            product_id: product.id.clone(),
            size: options.size.clone(),
            color: options.color.clone(),
            kind: options.kind.clone(),
        };

        let existing = self.lines.iter().position(|line| line.matches(&key));
        let (unit_price, quantity) = match existing.and_then(|i| self.lines.get(i)) {
            Some(line) => (
                line.unit_price,
                line.quantity
                    .checked_add(options.quantity)
                    .ok_or_else(|| StoreError::QuantityOverflow(key.to_string()))?,
            ),
            None => (product.price, options.quantity),
        };
        if self.total_with(&key, unit_price, quantity).is_none() {
            return Err(StoreError::TotalOverflow(key.to_string()));
        }

        if let Some(line) = existing.and_then(|i| self.lines.get_mut(i)) {
            line.quantity = quantity;
            return Ok(());
        }

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.image.clone(),
            quantity: options.quantity,
            unit_price: product.price,
            selected_size: options.size.clone(),
            selected_color: options.color.clone(),
            selected_type: options.kind.clone(),
        });
        Ok(())
    }

    /// Set a line's quantity; zero or less removes it. Returns whether the
    /// cart changed.
    pub(crate) fn set_quantity(&mut self, key: &LineKey, quantity: i64) -> Result<bool, StoreError> {
        if quantity <= 0 {
            return Ok(self.remove(key));
        }
        let quantity = u32::try_from(quantity).map_err(|_| StoreError::InvalidQuantity(quantity))?;

        let Some(index) = self.lines.iter().position(|line| line.matches(key)) else {
            return Ok(false);
        };
        let Some(line) = self.lines.get(index) else {
            return Ok(false);
        };
        if line.quantity == quantity {
            return Ok(false);
        }
        if self.total_with(key, line.unit_price, quantity).is_none() {
            return Err(StoreError::TotalOverflow(key.to_string()));
        }

        if let Some(line) = self.lines.get_mut(index) {
            line.quantity = quantity;
        }
        Ok(true)
    }

    /// Remove a line. Returns whether it was present.
    pub(crate) fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| !line.matches(key));
        before != self.lines.len()
    }

    /// Remove every line.
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
    }

    /// Repair a snapshot read from storage: drop zero-quantity lines and fold
    /// duplicate keys into the first occurrence. Returns whether anything
    /// was repaired.
    pub(crate) fn normalize(&mut self) -> bool {
        let original_len = self.lines.len();
        let mut merged: Vec<CartLine> = Vec::with_capacity(self.lines.len());
        let mut repaired = false;

        for line in self.lines.drain(..) {
            if line.quantity == 0 {
                repaired = true;
                continue;
            }
            let key = line.key();
            if let Some(existing) = merged.iter_mut().find(|m| m.matches(&key)) {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                repaired = true;
            } else {
                merged.push(line);
            }
        }

        self.lines = merged;
        repaired || self.lines.len() != original_len
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: &str, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Sheet {id}"),
            price: Price::new(Decimal::from(price)).unwrap(),
            image: None,
        }
    }

    fn sized(quantity: u32, size: &str) -> AddOptions {
        AddOptions {
            quantity,
            size: Some(size.to_string()),
            ..AddOptions::default()
        }
    }

    #[test]
    fn test_same_key_merges() {
        let mut cart = Cart::default();
        let p1 = product("P1", 799);
        cart.add(&p1, &sized(2, "king")).unwrap();
        cart.add(&p1, &sized(1, "king")).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.total_price(), Decimal::from(2397));
    }

    #[test]
    fn test_different_variant_appends() {
        let mut cart = Cart::default();
        let p1 = product("P1", 799);
        cart.add(&p1, &sized(1, "king")).unwrap();
        cart.add(&p1, &sized(1, "queen")).unwrap();

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut cart = Cart::default();
        let err = cart.add(&product("P1", 10), &sized(0, "king")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuantity(0)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_overflow_rejected_without_change() {
        let mut cart = Cart::default();
        let p1 = product("P1", 1);
        cart.add(&p1, &sized(u32::MAX, "king")).unwrap();
        assert!(matches!(
            cart.add(&p1, &sized(1, "king")),
            Err(StoreError::QuantityOverflow(_))
        ));
        assert_eq!(cart.lines()[0].quantity, u32::MAX);
    }

    #[test]
    fn test_total_overflow_rejected_without_change() {
        let mut cart = Cart::default();
        let costly = ProductSnapshot {
            price: Price::new(Decimal::MAX / Decimal::from(3)).unwrap(),
            ..product("P1", 0)
        };
        cart.add(&costly, &sized(2, "king")).unwrap();

        assert!(matches!(
            cart.add(&costly, &sized(2, "king")),
            Err(StoreError::TotalOverflow(_))
        ));
        assert!(matches!(
            cart.add(&product("P2", 1), &AddOptions::default()),
            Ok(())
        ));
        assert!(matches!(
            cart.add(&costly, &sized(1, "queen")),
            Err(StoreError::TotalOverflow(_))
        ));
        let key = LineKey::product("P1").with_size("king");
        assert!(matches!(
            cart.set_quantity(&key, 4),
            Err(StoreError::TotalOverflow(_))
        ));

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.line(&key).unwrap().quantity, 2);
        assert_eq!(cart.checked_total_price(), Some(cart.total_price()));
    }

    #[test]
    fn test_set_quantity_non_positive_removes() {
        let mut cart = Cart::default();
        cart.add(&product("P1", 10), &AddOptions::default()).unwrap();
        let key = LineKey::product("P1");

        assert!(cart.set_quantity(&key, 4).unwrap());
        assert_eq!(cart.line(&key).unwrap().quantity, 4);
        assert!(!cart.set_quantity(&key, 4).unwrap());

        assert!(cart.set_quantity(&key, -3).unwrap());
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(&key, 0).unwrap());
    }

    #[test]
    fn test_empty_cart_totals() {
        let cart = Cart::default();
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_line_key_display() {
        let key = LineKey::product("P1").with_size("king").with_kind("fitted");
        assert_eq!(key.to_string(), "P1/king/-/fitted");
    }

    #[test]
    fn test_wire_format_is_camel_case_array() {
        let mut cart = Cart::default();
        cart.add(&product("P1", 799), &sized(2, "king")).unwrap();
        let json = serde_json::to_value(&cart).unwrap();

        assert!(json.is_array());
        assert_eq!(json[0]["productId"], "P1");
        assert_eq!(json[0]["selectedSize"], "king");
        assert_eq!(json[0]["quantity"], 2);
    }

    #[test]
    fn test_normalize_repairs_snapshot() {
        let json = r#"[
            {"productId":"P1","name":"a","quantity":2,"unitPrice":"10","selectedSize":"king"},
            {"productId":"P1","name":"a","quantity":1,"unitPrice":"10","selectedSize":"king"},
            {"productId":"P2","name":"b","quantity":0,"unitPrice":"5"}
        ]"#;
        let mut cart: Cart = serde_json::from_str(json).unwrap();
        assert!(cart.normalize());
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert!(!cart.normalize());
    }
}
