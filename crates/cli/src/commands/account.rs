//! Sign-in and sign-out commands.

use dreamweave_storefront::error::Result;
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;
use secrecy::SecretString;

use crate::output;

pub async fn login<S: Storage>(state: &AppState<S>, email: &str, password: String) -> Result<()> {
    let password = SecretString::from(password);
    let user = state.session().login(email, &password).await?;
    output::done(&format!("Signed in as {} <{}>.", user.name, user.email));
    Ok(())
}

pub async fn logout<S: Storage>(state: &AppState<S>) -> Result<()> {
    state.session().logout().await?;
    output::done("Signed out.");
    Ok(())
}
