mod config;
mod controller;
mod data;
mod execution;
mod monitoring;
mod state;
mod view;
mod wallet;

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use config::{Config, EnvConfig};
use controller::commands::{Command, HELP};
use controller::{ControllerSettings, PageController, Reply};
use data::market_api::MarketApiClient;
use data::MarketSource;
use execution::bet_flow::BetPlacer;
use execution::journal::{audit_unconfirmed, reconcile_unconfirmed, BetJournal};
use monitoring::logger::CsvLogger;
use wallet::paper::{PaperChain, PaperWallet};
use wallet::rpc::SolanaRpc;
use wallet::{ChainRpc, WalletProvider};

const USAGE: &str = "Usage: market-view <market-id> [--config <path>]";

struct Args {
    market_id: Option<String>,
    config_path: String,
}

fn parse_args() -> Result<Args> {
    let mut market_id = None;
    let mut config_path = "config.toml".to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path\n{}", USAGE))?;
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ if market_id.is_none() && !arg.is_empty() => market_id = Some(arg),
            _ => anyhow::bail!("Unexpected argument: {}\n{}", arg, USAGE),
        }
    }

    Ok(Args { market_id, config_path })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the page
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let Some(market_id) = args.market_id else {
        println!("No market selected.");
        return Ok(());
    };

    tracing::info!("Market view starting for market {}", market_id);

    // Load configuration
    let mut config = Config::load(&args.config_path)?;
    let env_config = EnvConfig::load()?;
    config.apply_env(&env_config);
    config.validate()?;

    tracing::info!("Dry run mode: {}", config.system.dry_run);
    tracing::info!("Paper trading: {}", config.paper_trading.enabled);

    // Local bet journal
    tracing::info!("Opening bet journal: {}", config.system.journal_path);
    let journal = BetJournal::new(&config.system.journal_path)?;
    audit_unconfirmed(&journal)?;
    tracing::info!(
        "Journaled bets: {} ({} on this market)",
        journal.count_bets()?,
        journal.get_for_market(&market_id)?.len()
    );

    let api = MarketApiClient::new(
        config.api.base_url.clone(),
        std::time::Duration::from_secs(config.api.request_timeout_secs),
    )?;
    let source: Arc<dyn MarketSource> = Arc::new(api);

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let mut page = PageController::new(
        market_id,
        source.clone(),
        ControllerSettings::from_config(&config),
        notice_tx,
    );

    // Wallet and chain
    let wallet_stack: Option<(Arc<dyn WalletProvider>, Arc<dyn ChainRpc>, bool)> =
        if config.paper_trading.enabled {
            tracing::info!("Using paper wallet {}", config.paper_trading.address);
            let chain = PaperChain::new(&config.paper_trading);
            let rpc_fallback = match chain.probe().await {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!("{:#}; balances will not be shown", e);
                    true
                }
            };
            Some((
                Arc::new(PaperWallet::new(&config.paper_trading)),
                Arc::new(chain),
                rpc_fallback,
            ))
        } else {
            tracing::warn!("No wallet provider configured; enable paper_trading to place bets");
            None
        };

    if let Some((wallet, chain, rpc_fallback)) = wallet_stack {
        let mut placer = BetPlacer::new(
            wallet.clone(),
            chain.clone(),
            source.clone(),
            config.chain.treasury_wallet.clone(),
            config.system.dry_run,
        )
        .with_journal(journal);
        if config.monitoring.csv_logging {
            placer = placer.with_csv_logger(CsvLogger::new(config.monitoring.csv_log_path.clone())?);
        }
        page = page.with_wallet(wallet, chain, placer, rpc_fallback);
    } else {
        // Without a signer the chain is only used to settle the journal
        let (rpc, fallback) = SolanaRpc::connect(&config.chain).await?;
        if fallback {
            tracing::warn!("Solana RPC unreachable; skipping journal reconciliation");
        } else {
            let confirmed = reconcile_unconfirmed(&journal, &rpc).await?;
            tracing::info!("Reconciled {} previously unconfirmed bets", confirmed);
        }
    }

    #[cfg(feature = "metrics")]
    let metrics = {
        let registry = prometheus::Registry::new();
        let metrics = monitoring::metrics::Metrics::new(&registry);
        page = page.with_metrics(metrics.clone());
        metrics
    };

    let page = Arc::new(page);

    // Notices print above the next prompt
    let printer = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            println!("{}", notice);
        }
    });

    page.initialize().await;
    println!("{}", page.render().await);
    println!("{}", HELP);

    let poller = page.start_polling().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match page.handle(command).await {
            Reply::Page(text) | Reply::Text(text) => println!("{}", text),
            Reply::Quit => break,
        }
    }

    tracing::info!("Shutting down...");
    poller.stop().await;
    drop(page);
    let _ = printer.await;

    #[cfg(feature = "metrics")]
    tracing::info!("Session metrics: {}", metrics.summary());

    Ok(())
}
