use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use swapdeck::adapters::AggregatorClient;
use swapdeck::cli;
use swapdeck::config::AppConfig;
use swapdeck::error::Result;
use swapdeck::persistence::OrderStore;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

/// Cross-chain swap client for an exchange-aggregator API
#[derive(Parser, Debug)]
#[command(name = "swapdeck")]
#[command(author, version, about = "Cross-chain swap client")]
struct Cli {
    /// Config directory (default.toml, <env>.toml)
    #[arg(long, default_value = "config", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List currencies supported by the exchange
    Currencies,

    /// List send currencies that can reach a receive currency
    Pairs {
        /// Receive currency ticker
        to: String,
    },

    /// Estimate a swap with the full fee breakdown
    Estimate {
        from: String,
        to: String,
        amount: Decimal,
        /// Lock a fixed rate instead of the floating one
        #[arg(long)]
        fixed: bool,
    },

    /// Validate a recipient address for a currency
    Validate { currency: String, address: String },

    /// Create a swap order
    Create {
        from: String,
        to: String,
        amount: Decimal,
        /// Recipient (payout) address
        address: String,
        /// Refund address for failed swaps
        #[arg(long)]
        refund: Option<String>,
        #[arg(long)]
        fixed: bool,
    },

    /// Fetch the current status of an order
    Status { id: String },

    /// Poll an order until it reaches a terminal status
    Watch { id: String },

    /// Show locally stored orders
    History {
        /// Only orders created in the last N hours
        #[arg(long)]
        hours: Option<u64>,
        #[arg(long)]
        json: bool,
    },

    /// Search upstream orders by payout address and merge them locally
    Search {
        payout_address: String,
        #[arg(long)]
        json: bool,
    },

    /// Accept the exchange terms of service
    AcceptTerms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = load_config(&args.config);
    init_logging(&config);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        std::process::exit(1);
    }

    let client = Arc::new(AggregatorClient::new(
        &config.exchange.api_url,
        Duration::from_millis(config.exchange.request_timeout_ms),
    )?);
    let store = Arc::new(OrderStore::open(&config.store.path).await?);

    match args.command {
        Commands::Currencies => cli::list_currencies(&client).await?,
        Commands::Pairs { to } => cli::list_pairs(&client, &to).await?,
        Commands::Estimate {
            from,
            to,
            amount,
            fixed,
        } => cli::estimate(client, &config, &from, &to, amount, fixed).await?,
        Commands::Validate { currency, address } => {
            cli::validate_address(client, &config, &currency, &address).await?
        }
        Commands::Create {
            from,
            to,
            amount,
            address,
            refund,
            fixed,
        } => {
            cli::create_order(
                client, store, &config, &from, &to, amount, &address, refund, fixed,
            )
            .await?
        }
        Commands::Status { id } => cli::show_status(client, store, &config, &id).await?,
        Commands::Watch { id } => cli::watch_order(client, store, &config, &id).await?,
        Commands::History { hours, json } => cli::show_history(store, hours, json).await?,
        Commands::Search {
            payout_address,
            json,
        } => cli::search_orders(client, store, &payout_address, json).await?,
        Commands::AcceptTerms => cli::accept_terms(store).await?,
    }

    Ok(())
}

fn load_config(config_dir: &str) -> AppConfig {
    match AppConfig::load_from(config_dir) {
        Ok(config) => config,
        Err(e) => {
            // missing config files are routine for CLI usage; fall back to
            // env-driven defaults. Logging is not up yet at this point.
            eprintln!("config: falling back to defaults ({config_dir}: {e})");
            let api_url = std::env::var("SWAPDECK_EXCHANGE__API_URL")
                .unwrap_or_else(|_| "https://api.example-aggregator.io/v2".to_string());
            AppConfig::default_config(&api_url, "swapdeck.db")
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
