//! Dreamweave CLI - command-line shell over the storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Add two king-size fitted sheets to the cart
//! dw cart add P1 --name "Egyptian Cotton Sheet Set" --price 799 -q 2 --size king --type fitted
//!
//! # Show the cart and its totals
//! dw cart show
//!
//! # Sign in, then track an order
//! dw login -e ananya@example.com -p ********
//! dw orders track ORD-1001
//! ```
//!
//! # Commands
//!
//! - `cart` - Show and edit the cart
//! - `wishlist` - Show and edit the wishlist
//! - `orders` - List, show and track orders
//! - `checkout` - Place an order for the cart
//! - `login` / `logout` - Manage the customer session
//! - `contact` - Send a message to customer care

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dreamweave_storefront::config::ClientConfig;
use dreamweave_storefront::error::{AppError, ErrorKind, Result};
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{account, cart, checkout, contact, orders, wishlist};

#[derive(Parser)]
#[command(name = "dw")]
#[command(author, version, about = "Dreamweave storefront client")]
struct Cli {
    /// Write logs to stderr as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: cart::CartAction,
    },
    /// Show and edit the wishlist
    Wishlist {
        #[command(subcommand)]
        action: wishlist::WishlistAction,
    },
    /// List, show and track orders
    Orders {
        #[command(subcommand)]
        action: orders::OrdersAction,
    },
    /// Place an order for everything in the cart
    Checkout(checkout::CheckoutArgs),
    /// Sign in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Send a message to customer care
    Contact(contact::ContactArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(json: bool) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dreamweave_storefront=info,dreamweave_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            output::failure(&AppError::from(e));
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(cli.log_json);

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            let err = AppError::from(e);
            err.report();
            output::failure(&err);
            return ExitCode::FAILURE;
        }
    };

    match run(&state, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            err.report();
            if err.kind() == ErrorKind::SessionExpired
                && let Err(e) = state.session().handle_session_expired().await
            {
                AppError::from(e).report();
            }
            output::failure(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run<S: Storage>(state: &AppState<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Cart { action } => cart::run(state, action).await,
        Commands::Wishlist { action } => wishlist::run(state, action).await,
        Commands::Orders { action } => orders::run(state, action).await,
        Commands::Checkout(args) => checkout::run(state, args).await,
        Commands::Login { email, password } => account::login(state, &email, password).await,
        Commands::Logout => account::logout(state).await,
        Commands::Contact(args) => contact::run(state, args).await,
    }
}
