//! Contact form command.

use clap::Args;
use dreamweave_storefront::api::ContactForm;
use dreamweave_storefront::error::Result;
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;

use crate::output;

#[derive(Args)]
pub struct ContactArgs {
    /// Your name
    #[arg(long)]
    name: String,

    /// Your email address
    #[arg(long)]
    email: String,

    /// Your phone number
    #[arg(long)]
    phone: Option<String>,

    /// Subject
    #[arg(long)]
    subject: Option<String>,

    /// Message
    #[arg(long)]
    message: String,
}

pub async fn run<S: Storage>(state: &AppState<S>, args: ContactArgs) -> Result<()> {
    let form = ContactForm {
        name: args.name,
        email: args.email,
        phone: args.phone,
        subject: args.subject,
        message: args.message,
    };
    state.client().submit_contact(&form).await?;
    output::done("Thanks! We'll get back to you soon.");
    Ok(())
}
