//! Cartsync CLI - a terminal storefront over the cartsync client stores.
//!
//! # Usage
//!
//! ```bash
//! # Log in (the session is kept in CARTSYNC_STATE_DIR between runs)
//! cartsync login -e ana@example.com --password secret
//!
//! # Work on the cart
//! cartsync cart add 12 --quantity 2
//! cartsync cart show
//!
//! # Finalize it
//! cartsync checkout --address "Av. Siempre Viva 742" --card 4242
//!
//! # Browse past orders
//! cartsync orders list
//! ```
//!
//! # Commands
//!
//! - `login` / `register` / `logout` / `whoami` - Session management
//! - `cart` - Show and edit the cart
//! - `checkout` - Finalize the cart into an order
//! - `orders` - Purchase history

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartsync_client::config::ClientConfig;
use cartsync_client::{AppError, Storefront};
use cartsync_core::{OrderId, ProductId};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Cartsync terminal storefront")]
struct Cli {
    /// Override the API base URL (otherwise `CARTSYNC_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and keep the session for later commands
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "CARTSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a new account
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "CARTSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Finalize the cart into an order
    Checkout {
        /// Shipping address
        #[arg(short, long)]
        address: String,

        /// Last four digits of the card
        #[arg(short, long)]
        card: String,
    },
    /// Browse purchase history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart with estimated totals
    Show,
    /// Add units of a product
    Add {
        /// Product ID
        product_id: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set a product's quantity (0 removes it)
    Set {
        /// Product ID
        product_id: ProductId,

        /// Target quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List past orders
    List,
    /// Show one order in detail
    Show {
        /// Order ID
        order_id: OrderId,
    },
}

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

    tracing::debug!("Sentry initialized");
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

fn load_config(api_url: Option<&str>) -> Result<ClientConfig, AppError> {
    let config = ClientConfig::from_env()?;
    Ok(match api_url {
        Some(url) => config.with_api_url(url)?,
        None => config,
    })
}

#[tokio::main]
#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.api_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays pipeable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync_client=warn,cartsync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match run(cli.command, &config).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            e.report();
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &ClientConfig) -> Result<String, AppError> {
    let storefront = Storefront::from_config(config)?;

    match command {
        Commands::Login { email, password } => {
            commands::session::login(&storefront, &email, SecretString::from(password)).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            commands::session::register(&storefront, &name, &email, SecretString::from(password))
                .await
        }
        Commands::Logout => Ok(commands::session::logout(&storefront)),
        Commands::Whoami => Ok(commands::session::whoami(&storefront)),
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&storefront, product_id, quantity).await,
            CartAction::Set {
                product_id,
                quantity,
            } => commands::cart::set(&storefront, product_id, quantity).await,
            CartAction::Remove { product_id } => {
                commands::cart::remove(&storefront, product_id).await
            }
            CartAction::Clear => commands::cart::clear(&storefront).await,
        },
        Commands::Checkout { address, card } => {
            commands::checkout::run(&storefront, address, card).await
        }
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::orders::list(&storefront).await,
            OrdersAction::Show { order_id } => commands::orders::show(&storefront, order_id).await,
        },
    }
}
