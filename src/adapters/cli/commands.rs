//! CLI command definitions and handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::adapters::ai::{GeminiJudge, OpenAiJudge};
use crate::adapters::dexscreener::DexScreenerClient;
use crate::adapters::pump_fun::PumpFunRunners;
use crate::adapters::solana::SolanaHolderEstimator;
use crate::adapters::storage::{MemoryStore, SqliteStore};
use crate::application::{
    active_token_rows, analyze_on_demand, run_cleanup_loop, run_maintenance, signal_history, token_analysis,
    top_market_cap, ActiveTokenRow, PipelineContext, Scheduler, Supervisor, TickEvent,
};
use crate::config::{Config, SettingsHandle};
use crate::domain::pnl::SignalRange;
use crate::ports::{AnalysisStore, Clock, SystemClock};

/// Pulse Oracle - token analysis and signal engine
#[derive(Parser, Debug)]
#[command(
    name = "pulse-oracle",
    version = env!("CARGO_PKG_VERSION"),
    about = "Token analysis and signal orchestration engine",
    long_about = "Discovers Solana tokens, folds market snapshots into candles, derives \
                  support/resistance and an indicator chain, asks two AI judges for a \
                  verdict and tracks the resulting signals through TP/SL exits."
)]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug mode
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the supervised scheduler and the cleanup loop until Ctrl-C
    Run(RunCmd),

    /// Run a single tick and print its report
    Tick(TickCmd),

    /// Ask both AI judges about one token now
    Analyze(AnalyzeCmd),

    /// List active tokens with the latest AI verdicts
    Tokens(TokensCmd),

    /// Top tokens by market cap with recent 15m closes
    Top(TopCmd),

    /// Full analysis bundle for one token
    Token(TokenCmd),

    /// Signal history with KPIs and equity curve
    Signals(SignalsCmd),

    /// Run one maintenance pass
    Cleanup(CleanupCmd),
}

impl Command {
    pub fn config_path(&self) -> &Path {
        let args = match self {
            Command::Run(cmd) => &cmd.config,
            Command::Tick(cmd) => &cmd.config,
            Command::Analyze(cmd) => &cmd.config,
            Command::Tokens(cmd) => &cmd.config,
            Command::Top(cmd) => &cmd.config,
            Command::Token(cmd) => &cmd.config,
            Command::Signals(cmd) => &cmd.config,
            Command::Cleanup(cmd) => &cmd.config,
        };
        &args.config
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/oracle.toml")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Keep everything in memory instead of the SQLite database
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct TickCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Keep everything in memory instead of the SQLite database
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Token mint address
    pub token: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Parser, Debug)]
pub struct TokensCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format: table, json
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Parser, Debug)]
pub struct TopCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(short, long, default_value = "12")]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct TokenCmd {
    /// Token mint address
    pub address: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Parser, Debug)]
pub struct SignalsCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Reporting window: day, week, month, all
    #[arg(short, long, default_value = "all")]
    pub range: SignalRange,
}

#[derive(Parser, Debug)]
pub struct CleanupCmd {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Tick(cmd) => tick_command(cmd).await,
        Command::Analyze(cmd) => analyze_command(cmd).await,
        Command::Tokens(cmd) => tokens_command(cmd).await,
        Command::Top(cmd) => top_command(cmd).await,
        Command::Token(cmd) => token_command(cmd).await,
        Command::Signals(cmd) => signals_command(cmd).await,
        Command::Cleanup(cmd) => cleanup_command(cmd).await,
    }
}

fn load_settings(args: &ConfigArgs) -> Result<Arc<SettingsHandle>> {
    let settings = SettingsHandle::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    Ok(Arc::new(settings))
}

fn open_store(config: &Config, dry_run: bool) -> Result<Arc<dyn AnalysisStore>> {
    if dry_run {
        tracing::warn!("DRY RUN - state is kept in memory and discarded on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config.storage.resolved_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let store = SqliteStore::open(&path).with_context(|| format!("Failed to open database {}", path.display()))?;
    tracing::info!("[STORE] Using {}", path.display());
    Ok(Arc::new(store))
}

/// Wire the live adapters around a store
fn build_context(settings: Arc<SettingsHandle>, store: Arc<dyn AnalysisStore>) -> Result<PipelineContext> {
    let config = settings.current();
    let timeout = config.updater.http_timeout();

    let dexscreener = Arc::new(DexScreenerClient::new(timeout).context("Failed to create DexScreener client")?);
    let runners = Arc::new(PumpFunRunners::new(timeout).context("Failed to create pump.fun client")?);
    let holders = Arc::new(SolanaHolderEstimator::new(config.rpc.get_rpc_url(), &config.rpc.commitment));
    let openai = Arc::new(OpenAiJudge::new(Arc::clone(&settings)).context("Failed to create OpenAI judge")?);
    let gemini = Arc::new(GeminiJudge::new(Arc::clone(&settings)).context("Failed to create Gemini judge")?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ctx = PipelineContext::new(store, dexscreener.clone(), holders, clock, settings)
        .with_scanner(dexscreener)
        .with_scanner(runners);
    let openai_limiter = Arc::clone(&ctx.pacing.openai);
    let gemini_limiter = Arc::clone(&ctx.pacing.gemini);

    Ok(ctx.with_judge(openai, openai_limiter).with_judge(gemini, gemini_limiter))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle run command
async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting Pulse Oracle...");
    tracing::info!("Config: {}", cmd.config.config.display());

    let settings = load_settings(&cmd.config)?;
    let config = settings.current();
    let store = open_store(&config, cmd.dry_run)?;
    let ctx = build_context(Arc::clone(&settings), Arc::clone(&store))?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(Scheduler::new(Arc::new(ctx)).with_events(events_tx));
    let supervisor = Supervisor::new(Arc::clone(&scheduler), config.scheduler.restart_backoff());

    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                TickEvent::Succeeded(report) => tracing::debug!(
                    "[SCHEDULER] Tick {}: {} discovered, {} refreshed, {} signals closed",
                    report.started_at,
                    report.discovery.candidates,
                    report.update.refreshed,
                    report.update.signals_closed
                ),
                TickEvent::Failed { started_at, error } => {
                    tracing::warn!("[SCHEDULER] Tick {} failed: {}", started_at, error)
                }
            }
        }
    });

    let cleanup = tokio::spawn(run_cleanup_loop(store, settings, scheduler.running_flag()));

    // Setup Ctrl+C handler
    let sched = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        sched.stop().await;
    });

    supervisor.run().await;
    cleanup.abort();

    let status = scheduler.status().await;
    tracing::info!(
        "Pulse Oracle stopped ({} ticks ok, {} failed, {} refused)",
        status.ticks_succeeded,
        status.ticks_failed,
        status.ticks_refused
    );
    Ok(())
}

/// Handle tick command
async fn tick_command(cmd: TickCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let store = open_store(&settings.current(), cmd.dry_run)?;
    let scheduler = Scheduler::new(Arc::new(build_context(settings, store)?));

    match scheduler.tick().await.context("Tick failed")? {
        Some(report) => print_json(&report),
        None => {
            println!("Tick refused: another tick is in flight");
            Ok(())
        }
    }
}

/// Handle analyze command
async fn analyze_command(cmd: AnalyzeCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let store = open_store(&settings.current(), false)?;
    let ctx = build_context(settings, store)?;

    let outcome = analyze_on_demand(&ctx, &cmd.token)
        .await
        .with_context(|| format!("Analysis failed for {}", cmd.token))?;
    print_json(&outcome)
}

fn verdict(row: &ActiveTokenRow, openai: bool) -> String {
    let decision = if openai { &row.openai } else { &row.gemini };
    decision.as_ref().map(|d| d.decision.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Handle tokens command
async fn tokens_command(cmd: TokensCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let config = settings.current();
    let store = open_store(&config, false)?;
    let rows = active_token_rows(store.as_ref(), &config)?;

    match cmd.format.as_str() {
        "json" => print_json(&rows),
        _ => {
            println!(
                "{:<46} {:<10} {:>4} {:>14} {:>14} {:>8} {:<9} {:<9}",
                "ADDRESS", "SYMBOL", "TIER", "MARKET CAP", "VOLUME 24H", "HOLDERS", "OPENAI", "GEMINI"
            );
            for row in &rows {
                let token = &row.token;
                println!(
                    "{:<46} {:<10} {:>4} {:>14.0} {:>14.0} {:>8} {:<9} {:<9}",
                    token.address,
                    token.symbol.as_deref().unwrap_or("?"),
                    token.tier,
                    token.market_cap.unwrap_or(0.0),
                    token.volume_24h.unwrap_or(0.0),
                    token.holders.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string()),
                    verdict(row, true),
                    verdict(row, false),
                );
            }
            println!("\n{} active tokens", rows.len());
            Ok(())
        }
    }
}

/// Handle top command
async fn top_command(cmd: TopCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let store = open_store(&settings.current(), false)?;
    print_json(&top_market_cap(store.as_ref(), cmd.limit)?)
}

/// Handle token command
async fn token_command(cmd: TokenCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let store = open_store(&settings.current(), false)?;
    print_json(&token_analysis(store.as_ref(), &cmd.address)?)
}

/// Handle signals command
async fn signals_command(cmd: SignalsCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let store = open_store(&settings.current(), false)?;
    let history = signal_history(store.as_ref(), cmd.range, SystemClock.now_ms())?;
    print_json(&history)
}

/// Handle cleanup command
async fn cleanup_command(cmd: CleanupCmd) -> Result<()> {
    let settings = load_settings(&cmd.config)?;
    let config = settings.current();
    let store = open_store(&config, false)?;
    let report = run_maintenance(store.as_ref(), &config.retention_policy())?;
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_signals_range() {
        let app = CliApp::try_parse_from(["pulse-oracle", "signals", "--range", "week"]).unwrap();
        match app.command {
            Command::Signals(cmd) => {
                assert_eq!(cmd.range, SignalRange::Week);
                assert_eq!(cmd.config.config, PathBuf::from("config/oracle.toml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_range() {
        assert!(CliApp::try_parse_from(["pulse-oracle", "signals", "--range", "year"]).is_err());
    }

    #[test]
    fn test_top_default_limit_and_global_flags() {
        let app = CliApp::try_parse_from(["pulse-oracle", "top", "--verbose"]).unwrap();
        assert!(app.verbose);
        match app.command {
            Command::Top(cmd) => assert_eq!(cmd.limit, 12),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_path_for_every_command() {
        let app = CliApp::try_parse_from(["pulse-oracle", "analyze", "Mint111", "-c", "alt.toml"]).unwrap();
        assert_eq!(app.command.config_path(), Path::new("alt.toml"));
    }

    #[test]
    fn test_dry_run_store_is_in_memory() {
        let store = open_store(&Config::default(), true).unwrap();
        assert!(store.active_tokens().unwrap().is_empty());
    }
}
