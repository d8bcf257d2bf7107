// In app/src/main.rs

use anyhow::{Context, Result};
use analytics::{LeaderboardPeriod, TradeFilter};
use app_config::Settings;
use backtester::{BacktestError, BacktestRequest, BacktestResult, BacktestWindow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use core_types::{Instrument, Leverage, Order, Side};
use events::SessionEvent;
use execution::Placement;
use num_traits::ToPrimitive;
use risk::MarginLevel;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::prelude::*;

use self::tracing_layer::EventLogLayer;
mod tracing_layer;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A paper-trading simulator over a synthetic price feed.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drives a live session and prints every tick with the portfolio.
    Session {
        /// Number of ticks to run.
        #[arg(short, long, default_value_t = 10)]
        ticks: usize,

        /// The instrument to select (defaults to the first in the catalog).
        #[arg(short, long)]
        symbol: Option<String>,

        /// Opens a market buy of this quantity before the first tick.
        #[arg(long)]
        buy: Option<Decimal>,

        /// Opens a market sell of this quantity before the first tick.
        #[arg(long, conflicts_with = "buy")]
        sell: Option<Decimal>,

        /// Leverage ratio for the opening order.
        #[arg(long, default_value_t = 10)]
        leverage: u32,

        /// Ticks as fast as possible instead of at the configured interval.
        #[arg(long)]
        fast: bool,
    },

    /// Replays a strategy over a seeded synthetic series.
    Backtest {
        /// Strategy id, e.g. "ma_crossover" or "mean_reversion".
        #[arg(long)]
        strategy: String,

        #[arg(short, long)]
        symbol: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        ticks: Option<usize>,

        /// Prints the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Shows the leaderboard for a period (day, week, month, all_time).
    Leaderboard {
        #[arg(short, long, default_value = "all_time")]
        period: LeaderboardPeriod,

        #[arg(long)]
        json: bool,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings().context("Failed to load configuration")?;

    // --- Event and Tracing Setup ---
    let (events_tx, _) = broadcast::channel::<SessionEvent>(1024);
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_filter(tracing_subscriber::filter::Targets::new().with_default(level));
    let event_layer = EventLogLayer::new(events_tx.clone())
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::registry().with(fmt_layer).with(event_layer).init();

    // Parse command-line arguments.
    let cli = Cli::parse();

    tracing::info!(environment = %settings.app.environment, "Starting paper trading simulator");

    match cli.command {
        Commands::Session {
            ticks,
            symbol,
            buy,
            sell,
            leverage,
            fast,
        } => {
            let opening = buy.map(|q| (Side::Buy, q)).or(sell.map(|q| (Side::Sell, q)));
            handle_session(&settings, events_tx, ticks, symbol, opening, leverage, fast).await?;
        }
        Commands::Backtest {
            strategy,
            symbol,
            seed,
            ticks,
            json,
        } => {
            handle_backtest(&settings, strategy, symbol, seed, ticks, json).await?;
        }
        Commands::Leaderboard { period, json } => {
            handle_leaderboard(&settings, events_tx, period, json)?;
        }
    }

    Ok(())
}

fn find_instrument(settings: &Settings, symbol: Option<&str>) -> Result<Instrument> {
    let catalog = settings.instrument_catalog();
    let found = match symbol {
        Some(symbol) => catalog.into_iter().find(|i| i.symbol.as_str().eq_ignore_ascii_case(symbol)),
        None => catalog.into_iter().next(),
    };
    found.with_context(|| format!("Unknown instrument {:?}", symbol.unwrap_or_default()))
}

// --- "Session" Subcommand Logic ---

async fn handle_session(
    settings: &Settings,
    events_tx: broadcast::Sender<SessionEvent>,
    ticks: usize,
    symbol: Option<String>,
    opening: Option<(Side, Decimal)>,
    leverage: u32,
    fast: bool,
) -> Result<()> {
    let instrument = find_instrument(settings, symbol.as_deref())?;
    let session = engine::Session::with_event_sender(
        settings.instrument_catalog(),
        engine::SessionConfig::from_settings(settings),
        events_tx,
    );
    // Ticks are driven from here so the run stops after exactly `ticks`.
    let (task, handle) = engine::SessionTask::new(session, None);
    let join = task.spawn();

    let (quote, history) = handle.select_instrument(instrument.symbol.clone()).await?;
    println!(
        "{} ({}) {} bid {} ask {} [{} look-back quotes]",
        instrument.name, instrument.symbol, quote.price, quote.bid, quote.ask, history.len()
    );

    if let Some((side, quantity)) = opening {
        let order = Order::market(instrument.symbol.clone(), side, quantity, Leverage(leverage));
        match handle.place_order(order).await {
            Ok(Placement::Filled(position)) => println!(
                "Opened {} {} {} @ {} (id {})",
                position.side, position.quantity, position.symbol, position.open_price, position.id
            ),
            Ok(Placement::Pending(pending)) => println!("Pending order {}", pending.id),
            Err(e) => println!("Order rejected: {}", e),
        }
    }

    let mut pacing = tokio::time::interval(
        settings
            .simulation
            .tick_interval()
            .unwrap_or(Duration::from_secs(1)),
    );
    for n in 1..=ticks {
        if !fast {
            pacing.tick().await;
        }
        let summary = handle.advance(Utc::now()).await?;
        let snapshot = handle.portfolio_snapshot().await?;
        for quote in summary.quotes.iter().filter(|q| q.symbol == instrument.symbol) {
            println!(
                "#{:<4} {} {:>12} | equity {:>12} | free {:>12} | margin {}",
                n,
                quote.timestamp.format("%H:%M:%S"),
                quote.price,
                snapshot.equity.round_dp(2),
                snapshot.free_margin.round_dp(2),
                format_margin_level(snapshot.margin_level),
            );
        }
        for position in &summary.closed {
            println!(
                "      {} closed by {:?} @ {:?}: {:?}",
                position.id, position.close_reason, position.close_price, position.realized_pnl
            );
        }
    }

    for position in handle.open_positions().await? {
        if let Some(closed) = handle.close_position(position.id).await? {
            println!("Closed {} @ {:?}: {:?}", closed.id, closed.close_price, closed.realized_pnl);
        }
    }

    let report = handle.performance(TradeFilter::all()).await?;
    let snapshot = handle.portfolio_snapshot().await?;
    println!(
        "Balance {} | trades {} | win rate {:.1}% | net {}",
        snapshot.balance.round_dp(2),
        report.total_trades,
        report.win_rate,
        report.net_profit.round_dp(2)
    );

    drop(handle);
    join.await.context("Session task panicked")?;
    Ok(())
}

fn format_margin_level(level: MarginLevel) -> String {
    match level {
        MarginLevel::Unbounded => "-".to_string(),
        MarginLevel::Percent(p) => format!("{:.1}% ({:?})", p.to_f64().unwrap_or(0.0), level.band()),
    }
}

// --- "Backtest" Subcommand Logic ---

async fn handle_backtest(
    settings: &Settings,
    strategy: String,
    symbol: Option<String>,
    seed: Option<u64>,
    ticks: Option<usize>,
    json: bool,
) -> Result<()> {
    let instrument = find_instrument(settings, symbol.as_deref())?;
    let defaults = &settings.backtest;

    let mut request = BacktestRequest::new(defaults.strategy_config(&strategy), instrument)
        .with_params(defaults.params.clone())
        .with_window(BacktestWindow::new(ticks.unwrap_or(defaults.ticks), defaults.interval_secs))
        .with_seed(seed.unwrap_or(defaults.seed))
        .with_initial_balance(settings.account.initial_balance)
        .with_simulation(settings.simulation.engine_settings());
    if let Some(budget) = defaults.budget() {
        request = request.with_budget(budget);
    }

    let job = match backtester::spawn(request) {
        Ok(job) => job,
        Err(BacktestError::UnknownStrategy(id)) => {
            anyhow::bail!("Unknown strategy '{}'. Available: {}", id, strategies::STRATEGY_IDS.join(", "))
        }
        Err(e) => return Err(e.into()),
    };

    let cancel = job.cancel_handle();
    let result = tokio::select! {
        result = job.join() => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            anyhow::bail!("Backtest interrupted.");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_backtest(&result);
    }
    Ok(())
}

fn print_backtest(result: &BacktestResult) {
    let report = &result.report;
    println!("--- Backtest: {} on {} (seed {}) ---", result.strategy.id, result.symbol, result.seed);
    println!("Ticks:          {}", result.ticks_processed);
    println!("Trades:         {} ({} won, {} lost)", report.total_trades, report.winning_trades, report.losing_trades);
    println!("Win rate:       {:.2}%", report.win_rate);
    match report.profit_factor {
        Some(pf) => println!("Profit factor:  {:.2}", pf),
        None => println!("Profit factor:  n/a (no losing trades)"),
    }
    println!("Net profit:     {} ({:.2}%)", report.net_profit.round_dp(2), report.net_profit_pct);
    println!("Max drawdown:   {} ({:.2}%)", report.max_drawdown.round_dp(2), report.max_drawdown_pct);
    println!("Sharpe-like:    {:.3}", report.sharpe_ratio);
    println!("Final balance:  {}", result.final_balance.round_dp(2));
}

// --- "Leaderboard" Subcommand Logic ---

fn handle_leaderboard(
    settings: &Settings,
    events_tx: broadcast::Sender<SessionEvent>,
    period: LeaderboardPeriod,
    json: bool,
) -> Result<()> {
    let session = engine::Session::with_event_sender(
        settings.instrument_catalog(),
        engine::SessionConfig::from_settings(settings),
        events_tx,
    );
    let entries = session.leaderboard(period);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("--- Leaderboard ({}) ---", period);
    println!("{:<5} {:<20} {:>10} {:>10} {:>8}", "Rank", "Trader", "Profit %", "Win %", "Trades");
    for entry in entries {
        let marker = if entry.is_self { "*" } else { "" };
        println!(
            "{:<5} {:<20} {:>10.2} {:>10.1} {:>8}",
            entry.rank,
            format!("{}{}", entry.name, marker),
            entry.profit_pct,
            entry.win_rate,
            entry.trades
        );
    }
    Ok(())
}
