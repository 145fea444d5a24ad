//! Command implementations for the `swapdeck` binary.
//!
//! Output is human-readable tables by default; commands that script well
//! also take `--json`.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::time::Duration;

use crate::adapters::AggregatorClient;
use crate::config::AppConfig;
use crate::domain::{send_options_for, EstimateRequest, Order, RateType, SwapIntent};
use crate::exchange::ExchangeApi;
use crate::persistence::OrderStore;
use crate::services::{
    AddressCheck, AddressValidator, OrderCoordinator, PollResult, RateEstimator, StatusPoller,
};

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct OrderRow {
    id: String,
    route: String,
    amount: String,
    status: String,
    created: String,
    payin: String,
}

impl OrderRow {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            route: order.route(),
            amount: format!(
                "{} {}",
                order.amount_expected_from,
                order.currency_from.to_uppercase()
            ),
            status: order.status.to_string(),
            created: order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            payin: order.payin_address.clone(),
        }
    }
}

pub async fn list_currencies(client: &AggregatorClient) -> Result<()> {
    let currencies = client.get_currencies().await?;
    println!("{} currencies available:", currencies.len());
    for chunk in currencies.chunks(10) {
        println!("  {}", chunk.join(", "));
    }
    Ok(())
}

/// Show the send currencies that can reach `receive`.
pub async fn list_pairs(client: &AggregatorClient, receive: &str) -> Result<()> {
    let pairs = client.get_pairs(None, Some(receive)).await?;
    let options = send_options_for(&pairs, receive);

    if options.is_empty() {
        println!("No currency can be swapped into {}", receive.to_uppercase());
    } else {
        println!(
            "{} currencies can be swapped into {}:",
            options.len(),
            receive.to_uppercase()
        );
        for chunk in options.chunks(10) {
            println!("  {}", chunk.join(", "));
        }
    }
    Ok(())
}

pub async fn estimate(
    client: Arc<AggregatorClient>,
    config: &AppConfig,
    from: &str,
    to: &str,
    amount: Decimal,
    fixed: bool,
) -> Result<()> {
    let estimator = RateEstimator::new(client, config.fees.clone());
    let rate_type = if fixed {
        RateType::Fixed
    } else {
        RateType::Floating
    };

    let estimate = estimator
        .estimate(EstimateRequest {
            from: from.to_lowercase(),
            to: to.to_lowercase(),
            amount,
            rate_type,
        })
        .await?;

    println!("{} {} -> {}", amount, from.to_uppercase(), to.to_uppercase());
    println!("  rate type:    {rate_type}");
    println!("  quoted:       {} {}", estimate.amount_to, to.to_uppercase());
    println!("  network fee:  {}", estimate.network_fee);
    println!("  exchange fee: {}", estimate.exchange_fee);
    println!(
        "  you receive:  {} {}",
        estimate.receive_amount,
        to.to_uppercase()
    );
    if let Some(rate_id) = &estimate.rate_id {
        println!("  rate id:      {rate_id}");
    }
    if let Some(bounds) = &estimate.bounds {
        println!("  limits:       {} - {} {}", bounds.min, bounds.max, from.to_uppercase());
    }
    Ok(())
}

pub async fn validate_address(
    client: Arc<AggregatorClient>,
    config: &AppConfig,
    currency: &str,
    address: &str,
) -> Result<()> {
    let validator = AddressValidator::new(
        client,
        Duration::from_millis(config.validator.debounce_ms),
    );

    match validator.validate_now(currency, address).await {
        AddressCheck::Valid => println!("VALID {} address", currency.to_uppercase()),
        AddressCheck::Invalid(message) => {
            println!("INVALID: {message}");
            std::process::exit(1);
        }
        AddressCheck::Unavailable(message) => {
            println!("UNAVAILABLE: {message}");
            std::process::exit(2);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn create_order(
    client: Arc<AggregatorClient>,
    store: Arc<OrderStore>,
    config: &AppConfig,
    from: &str,
    to: &str,
    amount: Decimal,
    address: &str,
    refund: Option<String>,
    fixed: bool,
) -> Result<()> {
    if !store.terms_accepted().await? {
        anyhow::bail!("terms of service not accepted yet; run `swapdeck accept-terms` first");
    }

    let estimator = Arc::new(RateEstimator::new(client.clone(), config.fees.clone()));
    let coordinator = OrderCoordinator::new(
        client.clone(),
        store,
        estimator,
        config.fees.quote_ttl_secs,
    );

    let validator = AddressValidator::new(
        client,
        Duration::from_millis(config.validator.debounce_ms),
    );
    if let AddressCheck::Invalid(message) = validator.validate_now(to, address).await {
        anyhow::bail!("recipient address rejected: {message}");
    }

    let order = coordinator
        .create(&SwapIntent {
            from: from.to_lowercase(),
            to: to.to_lowercase(),
            amount,
            recipient_address: address.to_string(),
            refund_address: refund,
            rate_type: if fixed { RateType::Fixed } else { RateType::Floating },
        })
        .await?;

    println!("Order {} created ({})", order.id, order.route());
    println!(
        "Send {} {} to: {}",
        order.amount_expected_from,
        order.currency_from.to_uppercase(),
        order.payin_address
    );
    println!(
        "You will receive about {} {} at {}",
        order.amount_expected_to,
        order.currency_to.to_uppercase(),
        order.payout_address
    );
    if let Some(url) = &order.track_url {
        println!("Track: {url}");
    }
    Ok(())
}

pub async fn show_status(
    client: Arc<AggregatorClient>,
    store: Arc<OrderStore>,
    config: &AppConfig,
    id: &str,
) -> Result<()> {
    let poller = StatusPoller::new(client, store, config.poller.clone());
    match poller.poll_once(id).await? {
        PollResult::Suppressed => println!("{id}: poll suppressed, try again shortly"),
        PollResult::Unchanged(status) | PollResult::Updated(status) => {
            println!("{id}: {status}");
            println!("  {}", status.progress_message());
        }
    }
    Ok(())
}

/// Poll an order until it reaches a terminal status, printing transitions.
pub async fn watch_order(
    client: Arc<AggregatorClient>,
    store: Arc<OrderStore>,
    config: &AppConfig,
    id: &str,
) -> Result<()> {
    let interval = Duration::from_secs(config.poller.interval_secs);
    let poller = StatusPoller::new(client, store, config.poller.clone());
    let mut last = None;

    println!("Watching order {id} (Ctrl+C to stop)");
    loop {
        match poller.poll_once(id).await {
            Ok(PollResult::Unchanged(status) | PollResult::Updated(status)) => {
                if last.as_ref() != Some(&status) {
                    println!(
                        "[{}] {} - {}",
                        chrono::Utc::now().format("%H:%M:%S"),
                        status,
                        status.progress_message()
                    );
                    last = Some(status.clone());
                }
                if status.is_terminal() {
                    return Ok(());
                }
            }
            Ok(PollResult::Suppressed) => {}
            Err(e) => eprintln!("poll failed: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("stopped");
                return Ok(());
            }
        }
    }
}

pub async fn show_history(store: Arc<OrderStore>, hours: Option<u64>, json: bool) -> Result<()> {
    let orders = match hours {
        Some(hours) => {
            store
                .list_recent(chrono::Duration::hours(hours as i64))
                .await?
        }
        None => store.list_all().await?,
    };

    let rows: Vec<OrderRow> = orders.iter().map(OrderRow::from_order).collect();
    print_items(&rows, OutputMode::from_json_flag(json))
}

/// Look up orders upstream by their payout address and merge them into the
/// local store.
pub async fn search_orders(
    client: Arc<AggregatorClient>,
    store: Arc<OrderStore>,
    payout_address: &str,
    json: bool,
) -> Result<()> {
    let orders = client.search_orders(payout_address).await?;
    for order in &orders {
        store.append(order).await?;
    }

    let rows: Vec<OrderRow> = orders.iter().map(OrderRow::from_order).collect();
    print_items(&rows, OutputMode::from_json_flag(json))
}

pub async fn accept_terms(store: Arc<OrderStore>) -> Result<()> {
    store.set_terms_accepted(true).await?;
    println!("Terms of service accepted");
    Ok(())
}
