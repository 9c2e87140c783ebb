use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use clap::Parser;
use tracing::{info, warn};

use trap_buster::execution::{StaticAccount, StrategyConfig, TradingWindow};
use trap_buster::trading_core::{is_strictly_increasing, Bar, ShortTrapStrategy, SymbolContext, SymbolStates};
use trap_buster::Decision;

/// Replay a day (or several) of minute bars through the short-trap strategy
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV of minute bars: timestamp,open,high,low,close,volume,average[,vwap]
    #[arg(short, long, env = "TRAP_BARS")]
    bars: PathBuf,

    /// Symbol the bars belong to
    #[arg(short, long, env = "TRAP_SYMBOL", default_value = "SPY")]
    symbol: String,

    /// Portfolio value used for sizing
    #[arg(short, long, env = "TRAP_PORTFOLIO_VALUE", default_value = "100000")]
    portfolio_value: f64,

    /// Strategy config (JSON); missing fields take defaults
    #[arg(short, long, env = "TRAP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the fraction of portfolio risked per entry
    #[arg(long, env = "TRAP_RISK_FRACTION")]
    risk_fraction: Option<f64>,

    /// Override the resample bucket width in minutes
    #[arg(long, env = "TRAP_BUCKET_MINUTES")]
    bucket_minutes: Option<i64>,

    /// Treat the symbol as not shortable
    #[arg(long, env = "TRAP_NOT_SHORTABLE")]
    not_shortable: bool,
}

/// Simulated fill state for the replayed symbol
#[derive(Debug, Default)]
struct Book {
    position: i64,
    entry_price: f64,
    trades: u32,
    wins: u32,
    losses: u32,
    pnl: f64,
}

impl Book {
    fn apply(&mut self, decision: &Decision, close: f64) {
        match decision {
            Decision::Buy { order, .. } => {
                self.position += order.quantity as i64;
                self.entry_price = order.limit_price.unwrap_or(close);
            }
            Decision::Sell { order, .. } => {
                let pnl = (close - self.entry_price) * order.quantity as f64;
                self.trades += 1;
                if pnl > 0.0 {
                    self.wins += 1;
                } else {
                    self.losses += 1;
                }
                self.pnl += pnl;
                self.position = 0;
            }
            Decision::NoSignal => {}
        }
    }
}

fn load_config(args: &Args) -> Result<StrategyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => StrategyConfig::default(),
    };
    if let Some(fraction) = args.risk_fraction {
        config.risk_fraction = fraction;
    }
    if let Some(minutes) = args.bucket_minutes {
        if minutes <= 0 {
            bail!("bucket minutes must be positive, got {}", minutes);
        }
        config.bucket_minutes = minutes;
    }
    Ok(config)
}

fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<Bar>().enumerate() {
        let bar = row.with_context(|| format!("Bad bar on row {}", i + 1))?;
        bars.push(bar);
    }
    if !is_strictly_increasing(&bars) {
        bail!("bar timestamps in {} are not strictly increasing", path.display());
    }
    Ok(bars)
}

/// Session open on `day`, in UTC
fn session_open(session: &TradingWindow, day: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = day
        .and_hms_opt(session.start_hour, session.start_minute, 0)
        .with_context(|| format!("Invalid session start {}", session))?;
    let local = New_York
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Ambiguous session open on {}", day))?;
    Ok(local.with_timezone(&Utc))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("trap_buster=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let bars = load_bars(&args.bars)?;

    info!("Replaying {} bars for {} from {}", bars.len(), args.symbol, args.bars.display());
    info!(
        "Strategy: {} | buy {} | sell {} | risk {:.2}%",
        config.name,
        config.buy_window,
        config.sell_window,
        config.risk_fraction * 100.0
    );

    let strategy = ShortTrapStrategy::new(config);
    let account = StaticAccount(args.portfolio_value);
    let mut states = SymbolStates::new();
    let mut book = Book::default();
    let mut current_day: Option<NaiveDate> = None;
    let mut signals = 0u32;

    for (i, bar) in bars.iter().enumerate() {
        let day = bar.timestamp.with_timezone(&New_York).date_naive();
        if current_day != Some(day) {
            if current_day.is_some() {
                states.roll_session();
            }
            current_day = Some(day);
        }

        let open = session_open(&strategy.config().session, day)?;
        let ctx = SymbolContext {
            symbol: &args.symbol,
            shortable: !args.not_shortable,
            position: book.position,
            has_open_order: false,
            opened_by: (book.position != 0).then(|| strategy.name()),
            now: bar.timestamp,
            session_open: open,
            portfolio_value: None,
        };

        let state = states.entry(&args.symbol);
        let decision = strategy.run(state, &ctx, &bars[..=i], Some(&account)).await?;

        if decision.is_signal() {
            signals += 1;
            info!("{}", serde_json::to_string(&decision)?);
            book.apply(&decision, bar.close);
        }
    }

    if book.position != 0 {
        warn!("Replay ended with {} shares still open", book.position);
    }

    println!(
        "{}: {} bars, {} signals, {} round trips ({} wins / {} losses), P&L {:+.2}",
        args.symbol,
        bars.len(),
        signals,
        book.trades,
        book.wins,
        book.losses,
        book.pnl
    );

    Ok(())
}
