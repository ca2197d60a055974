pub mod commands;
pub mod poller;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use crate::config::Config;
use crate::data::MarketSource;
use crate::execution::bet_flow::BetPlacer;
use crate::execution::validation::validate_bet;
use crate::state::{AppState, Capabilities, Phase, WalletState};
use crate::view::model::{build_page, RenderOptions};
use crate::view::text::render_page;
use crate::wallet::{ChainRpc, WalletError, WalletProvider};
use commands::{Command, HELP};
use poller::{spawn_polling, wait_for, PollHandle, RefreshGate, RefreshPermit};

#[cfg(feature = "metrics")]
use crate::monitoring::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed,
    /// Another refresh was already in flight.
    Skipped,
    /// Another refresh was in flight and will run once more afterwards.
    Queued,
    Failed,
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Page(String),
    Text(String),
    Quit,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub refresh_interval: Duration,
    pub wallet_wait_attempts: u32,
    pub wallet_wait_interval: Duration,
    pub charts: bool,
    pub render: RenderOptions,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            refresh_interval: Duration::from_secs(config.polling.refresh_interval_secs),
            wallet_wait_attempts: config.polling.wallet_wait_attempts,
            wallet_wait_interval: Duration::from_millis(config.polling.wallet_wait_interval_ms),
            charts: config.display.charts,
            render: RenderOptions {
                history_limit: config.display.history_limit,
                explorer_url: config.chain.explorer_url.clone(),
            },
        }
    }
}

/// Wallet-side collaborators; absent when no wallet is configured.
struct WalletStack {
    wallet: Arc<dyn WalletProvider>,
    chain: Arc<dyn ChainRpc>,
    placer: BetPlacer,
    rpc_fallback: bool,
}

/// Owns the page state and runs every user action and refresh against it.
pub struct PageController {
    state: Arc<RwLock<AppState>>,
    source: Arc<dyn MarketSource>,
    wallet: Option<WalletStack>,
    settings: ControllerSettings,
    notices: mpsc::UnboundedSender<Notice>,
    gate: RefreshGate,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<Metrics>>,
}

impl PageController {
    pub fn new(
        market_id: String,
        source: Arc<dyn MarketSource>,
        settings: ControllerSettings,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(AppState::new(market_id))),
            source,
            wallet: None,
            settings,
            notices,
            gate: RefreshGate::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// `rpc_fallback` means no endpoint answered, so balances are unknown.
    pub fn with_wallet(
        mut self,
        wallet: Arc<dyn WalletProvider>,
        chain: Arc<dyn ChainRpc>,
        placer: BetPlacer,
        rpc_fallback: bool,
    ) -> Self {
        self.wallet = Some(WalletStack { wallet, chain, placer, rpc_fallback });
        self
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> Arc<RwLock<AppState>> {
        self.state.clone()
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice { level, message: message.into() };
        debug!("Notice: {}", notice);
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }

    async fn set_phase(&self, phase: Phase) {
        self.state.write().await.phase = phase;
        info!("Phase: {:?}", phase);
    }

    /// Detect capabilities, restore any wallet session, then load the market.
    pub async fn initialize(&self) {
        self.set_phase(Phase::LoadingLibraries).await;

        let wallet_ready = match &self.wallet {
            Some(stack) => {
                wait_for(
                    self.settings.wallet_wait_attempts,
                    self.settings.wallet_wait_interval,
                    || stack.wallet.is_available(),
                )
                .await
            }
            None => false,
        };
        if !wallet_ready {
            warn!("No wallet provider available; betting disabled");
        }
        if !self.settings.charts {
            info!("Charts disabled");
        }

        {
            let mut state = self.state.write().await;
            state.capabilities = Capabilities {
                charts: self.settings.charts,
                wallet: wallet_ready,
            };
            state.rpc_fallback = self.wallet.as_ref().is_some_and(|s| s.rpc_fallback);
        }

        self.set_phase(Phase::InitializingWallet).await;
        if wallet_ready {
            if let Some(stack) = &self.wallet {
                if let Some(address) = stack.wallet.public_key().await {
                    info!("Restoring wallet session: {}", address);
                    self.state.write().await.wallet = WalletState::Connected { address };
                    self.refresh_balance().await;
                }
            }
        }

        self.refresh().await;
        self.set_phase(Phase::Ready).await;
    }

    /// Start periodic refreshes. Stop them with [`PollHandle::stop`].
    pub async fn start_polling(self: &Arc<Self>) -> PollHandle {
        self.set_phase(Phase::Polling).await;
        let controller = Arc::clone(self);
        spawn_polling(self.settings.refresh_interval, move || {
            let controller = controller.clone();
            async move {
                controller.refresh().await;
            }
        })
    }

    /// Fetch market and order book, then replace the snapshot. Skipped
    /// while another refresh is in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(mut permit) = self.gate.try_acquire() else {
            debug!("Refresh already in flight, skipping");
            self.record_refresh(RefreshOutcome::Skipped);
            return RefreshOutcome::Skipped;
        };
        self.refresh_holding(&mut permit).await
    }

    /// Like [`refresh`](Self::refresh), but a refresh already in flight is
    /// made to run once more, so it cannot miss a change made just now.
    pub async fn reload(&self) -> RefreshOutcome {
        loop {
            if let Some(mut permit) = self.gate.try_acquire() {
                return self.refresh_holding(&mut permit).await;
            }
            if self.gate.request_rerun() {
                debug!("Reload queued behind refresh in flight");
                self.record_refresh(RefreshOutcome::Queued);
                return RefreshOutcome::Queued;
            }
        }
    }

    async fn refresh_holding(&self, permit: &mut RefreshPermit<'_>) -> RefreshOutcome {
        loop {
            let outcome = self.fetch_snapshot().await;
            if !permit.finish() {
                return outcome;
            }
            debug!("Refreshing again for a queued reload");
        }
    }

    async fn fetch_snapshot(&self) -> RefreshOutcome {
        let market_id = self.state.read().await.market_id.clone();
        let market = match self.source.fetch_market(&market_id).await {
            Ok(market) => market,
            Err(e) => {
                error!("Failed to load market {}: {:#}", market_id, e);
                self.notify(NoticeLevel::Error, format!("Failed to load market data: {:#}", e));
                self.record_refresh(RefreshOutcome::Failed);
                return RefreshOutcome::Failed;
            }
        };
        let orders = self.source.fetch_order_book(&market_id).await;

        {
            let mut state = self.state.write().await;
            debug!(
                "Market {} refreshed: {} options, {} bets, {} orders",
                market.id,
                market.options.len(),
                market.bets.len(),
                orders.len()
            );
            state.apply_market(market);
            state.apply_order_book(orders);
        }

        self.record_refresh(RefreshOutcome::Completed);
        RefreshOutcome::Completed
    }

    pub async fn connect_wallet(&self) {
        let available = self.state.read().await.capabilities.wallet;
        let stack = match &self.wallet {
            Some(stack) if available => stack,
            _ => {
                self.notify(NoticeLevel::Error, WalletError::NotInstalled.to_string());
                return;
            }
        };

        match stack.wallet.connect().await {
            Ok(address) => {
                info!("Wallet connected: {}", address);
                self.state.write().await.wallet = WalletState::Connected { address };
                self.refresh_balance().await;
                self.notify(NoticeLevel::Success, "Wallet connected successfully!");
            }
            Err(WalletError::UserRejected) => {
                self.notify(NoticeLevel::Warning, "Wallet connection rejected by user");
            }
            Err(e) => {
                error!("Wallet connection failed: {}", e);
                self.notify(NoticeLevel::Error, "Failed to connect wallet. Please try again.");
            }
        }
    }

    pub async fn disconnect_wallet(&self) {
        if let Some(stack) = &self.wallet {
            if let Err(e) = stack.wallet.disconnect().await {
                warn!("Wallet disconnect failed: {}", e);
            }
        }
        self.state.write().await.disconnect_wallet();
        self.notify(NoticeLevel::Info, "Wallet disconnected");
    }

    /// Best effort; a failing RPC leaves the balance unknown.
    async fn refresh_balance(&self) {
        let Some(stack) = &self.wallet else { return };

        let (address, fallback) = {
            let state = self.state.read().await;
            (state.wallet.address().map(str::to_string), state.rpc_fallback)
        };
        let Some(address) = address else { return };
        if fallback {
            debug!("RPC fallback mode, balance not fetched");
            return;
        }

        match stack.chain.get_balance(&address).await {
            Ok(lamports) => {
                self.state.write().await.balance_lamports = lamports;
            }
            Err(e) => {
                warn!("Failed to fetch balance for {}: {:#}", address, e);
                let mut state = self.state.write().await;
                state.balance_lamports = 0;
                state.rpc_fallback = true;
            }
        }
    }

    pub async fn select_option(&self, index: usize) {
        if !self.state.write().await.select_option(index) {
            self.notify(NoticeLevel::Warning, format!("Unknown option: {}", index));
        }
    }

    pub async fn set_bet_amount(&self, amount: Option<f64>) {
        self.state.write().await.set_bet_amount(amount);
    }

    pub async fn select_order_book_outcome(&self, index: usize) {
        if !self.state.write().await.select_order_book_outcome(index) {
            self.notify(NoticeLevel::Warning, format!("Unknown outcome: {}", index));
        }
    }

    /// Validate, sign, submit and record a bet, then reload everything.
    pub async fn place_bet(&self) {
        let validated = {
            let state = self.state.read().await;
            validate_bet(&state.bet_context())
        };
        let bet = match validated {
            Ok(bet) => bet,
            Err(e) => {
                self.notify(NoticeLevel::Warning, e.to_string());
                return;
            }
        };

        let (stack, bettor) = match (&self.wallet, self.state.read().await.wallet.address()) {
            (Some(stack), Some(address)) => (stack, address.to_string()),
            _ => {
                self.notify(NoticeLevel::Warning, "Please connect your wallet first");
                return;
            }
        };

        self.notify(NoticeLevel::Info, "Processing bet on Solana mainnet...");
        match stack.placer.place(&bettor, &bet).await {
            Ok(outcome) => {
                self.record_bet(true);
                for warning in outcome.warnings {
                    self.notify(NoticeLevel::Warning, warning);
                }
                info!("Bet placed: {}", outcome.receipt.signature);
                self.refresh_balance().await;
                self.notify(NoticeLevel::Success, "Bet placed successfully!");
                self.reload().await;
            }
            Err(e) => {
                self.record_bet(false);
                error!("Bet failed: {}", e);
                self.notify(NoticeLevel::Error, e.to_string());
            }
        }

        self.state.write().await.reset_bet_form();
    }

    /// Current page as text.
    pub async fn render(&self) -> String {
        let state = self.state.read().await;
        match build_page(&state, &self.settings.render) {
            Some(page) => render_page(&page),
            None => "Loading market...".to_string(),
        }
    }

    pub async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::Connect => self.connect_wallet().await,
            Command::Disconnect => self.disconnect_wallet().await,
            Command::Select(index) => self.select_option(index).await,
            Command::Amount(amount) => self.set_bet_amount(amount).await,
            Command::Book(index) => self.select_order_book_outcome(index).await,
            Command::Bet => self.place_bet().await,
            Command::Refresh => {
                self.reload().await;
            }
            Command::Show => {}
            Command::Help => return Reply::Text(HELP.to_string()),
            Command::Quit => return Reply::Quit,
        }
        Reply::Page(self.render().await)
    }

    fn record_refresh(&self, outcome: RefreshOutcome) {
        #[cfg(feature = "metrics")]
        {
            if let Some(metrics) = &self.metrics {
                match outcome {
                    RefreshOutcome::Completed => metrics.refreshes.inc(),
                    RefreshOutcome::Skipped => metrics.refreshes_skipped.inc(),
                    RefreshOutcome::Queued | RefreshOutcome::Failed => {}
                }
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = outcome;
    }

    fn record_bet(&self, submitted: bool) {
        #[cfg(feature = "metrics")]
        {
            if let Some(metrics) = &self.metrics {
                if submitted {
                    metrics.bets_submitted.inc();
                } else {
                    metrics.bets_failed.inc();
                }
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = submitted;
    }
}
