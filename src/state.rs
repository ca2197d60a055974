use chrono::{DateTime, Utc};
use crate::data::types::{Market, Order};
use crate::execution::validation::BetContext;
use crate::wallet::lamports_to_sol;

/// Page lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadingLibraries,
    InitializingWallet,
    Ready,
    Polling,
}

/// Optional features that degrade independently when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub charts: bool,
    pub wallet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletState {
    Disconnected,
    Connected { address: String },
}

impl WalletState {
    pub fn address(&self) -> Option<&str> {
        match self {
            WalletState::Connected { address } => Some(address),
            WalletState::Disconnected => None,
        }
    }
}

/// Everything the view renders from; mutated only by the controller.
#[derive(Debug, Clone)]
pub struct AppState {
    pub market_id: String,
    pub phase: Phase,
    pub capabilities: Capabilities,
    pub market: Option<Market>,
    pub order_book: Vec<Order>,
    pub order_book_outcome: Option<usize>,
    pub selected_option: Option<usize>,
    pub bet_amount: Option<f64>,
    pub wallet: WalletState,
    pub balance_lamports: u64,
    /// Balance unknown: hide it and skip balance checks.
    pub rpc_fallback: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl AppState {
    pub fn new(market_id: String) -> Self {
        Self {
            market_id,
            phase: Phase::LoadingLibraries,
            capabilities: Capabilities { charts: false, wallet: false },
            market: None,
            order_book: Vec::new(),
            order_book_outcome: None,
            selected_option: None,
            bet_amount: None,
            wallet: WalletState::Disconnected,
            balance_lamports: 0,
            rpc_fallback: false,
            last_refresh: None,
        }
    }

    pub fn option_count(&self) -> usize {
        self.market.as_ref().map(|m| m.options.len()).unwrap_or(0)
    }

    pub fn balance_sol(&self) -> f64 {
        lamports_to_sol(self.balance_lamports)
    }

    /// Balance usable for pre-submission checks.
    pub fn known_balance(&self) -> Option<f64> {
        (!self.rpc_fallback).then(|| self.balance_sol())
    }

    /// Replace the market snapshot wholesale.
    pub fn apply_market(&mut self, market: Market) {
        let options = market.options.len();
        if self.selected_option.is_some_and(|i| i >= options) {
            self.selected_option = None;
        }
        match self.order_book_outcome {
            Some(i) if i < options => {}
            _ => self.order_book_outcome = (options > 0).then_some(0),
        }
        self.market = Some(market);
        self.last_refresh = Some(Utc::now());
    }

    pub fn apply_order_book(&mut self, orders: Vec<Order>) {
        self.order_book = orders;
    }

    pub fn select_option(&mut self, index: usize) -> bool {
        if index < self.option_count() {
            self.selected_option = Some(index);
            true
        } else {
            false
        }
    }

    pub fn select_order_book_outcome(&mut self, index: usize) -> bool {
        if index < self.option_count() {
            self.order_book_outcome = Some(index);
            true
        } else {
            false
        }
    }

    pub fn set_bet_amount(&mut self, amount: Option<f64>) {
        self.bet_amount = amount;
    }

    /// Clear the bet form after a submission.
    pub fn reset_bet_form(&mut self) {
        self.bet_amount = None;
        self.selected_option = None;
    }

    pub fn disconnect_wallet(&mut self) {
        self.wallet = WalletState::Disconnected;
        self.balance_lamports = 0;
    }

    pub fn bet_context(&self) -> BetContext<'_> {
        BetContext {
            wallet_connected: matches!(self.wallet, WalletState::Connected { .. }),
            market: self.market.as_ref(),
            selected_option: self.selected_option,
            amount: self.bet_amount,
            balance: self.known_balance(),
        }
    }
}
