use crate::data::aggregator::{self, equal_split, Aggregate};
use crate::data::order_book::OrderBookView;
use crate::data::types::{Bet, Market};
use crate::state::{AppState, WalletState};
use crate::wallet::shorten_address;

pub const CHART_COLORS: [&str; 8] = [
    "#10b981", "#ef4444", "#3b82f6", "#f59e0b", "#8b5cf6", "#06b6d4", "#84cc16", "#f97316",
];

pub const NO_HISTORY: &str = "No betting history available yet";
pub const ODDS_MISSING: &str = "Set odds in admin panel";

pub fn option_color(index: usize) -> &'static str {
    CHART_COLORS[index % CHART_COLORS.len()]
}

/// Render settings that are not part of the application state.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub history_limit: usize,
    pub explorer_url: String,
}

/// Full description of the market page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub header: MarketHeader,
    pub wallet: WalletHeader,
    pub headline: Headline,
    pub outcomes: Vec<OutcomeCard>,
    pub options: Vec<OptionRow>,
    pub history: Option<HistoryView>,
    pub price_chart: ChartView,
    pub volume_chart: ChartView,
    pub order_book: OrderBookPanel,
    pub betting: BettingInterface,
    pub potential_return: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketHeader {
    pub title: String,
    pub category: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletHeader {
    pub button: String,
    pub balance: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub chance: String,
    pub change: Option<PriceChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceChange {
    Up(String),
    Down(String),
    Flat,
}

impl std::fmt::Display for PriceChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceChange::Up(text) | PriceChange::Down(text) => write!(f, "{}", text),
            PriceChange::Flat => write!(f, "No change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeCard {
    pub percentage: String,
    pub name: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionRow {
    pub index: usize,
    pub name: String,
    pub image: Option<String>,
    pub percentage: String,
    /// `x1.85` or the "set odds" placeholder.
    pub odds: String,
    pub odds_set: bool,
    pub volume: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    pub title: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub option_name: String,
    pub time: String,
    pub amount: String,
    pub bettor: String,
    pub explorer_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub color: &'static str,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub y_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
    /// Charting unavailable; nothing is drawn.
    Disabled,
    Placeholder(String),
    Chart(ChartSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookTab {
    pub index: usize,
    pub name: String,
    pub color: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookPanel {
    pub tabs: Vec<OrderBookTab>,
    pub book: Option<OrderBookView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BettingInterface {
    pub warning: Option<String>,
    pub submit_enabled: bool,
    pub amount_enabled: bool,
}

/// Build the whole page from the current state. Total: nothing is reused
/// from a previous render.
pub fn build_page(state: &AppState, options: &RenderOptions) -> Option<PageView> {
    let market = state.market.as_ref()?;
    let agg = aggregator::aggregate(&market.bets, market.options.len());

    Some(PageView {
        header: market_header(market, &agg),
        wallet: wallet_header(state),
        headline: headline(&agg, market.options.len()),
        outcomes: outcome_cards(market, &agg),
        options: option_rows(market, &agg, state.selected_option),
        history: history(market, options),
        price_chart: price_chart(market, &agg, state.capabilities.charts),
        volume_chart: volume_chart(&agg, state.capabilities.charts),
        order_book: order_book_panel(state),
        betting: betting_interface(state),
        potential_return: potential_return(state),
    })
}

fn market_header(market: &Market, agg: &Aggregate) -> MarketHeader {
    MarketHeader {
        title: market.title.clone(),
        category: market.category.clone(),
        volume: format!("{:.3} SOL", agg.total_volume),
    }
}

pub fn wallet_header(state: &AppState) -> WalletHeader {
    match &state.wallet {
        WalletState::Disconnected => WalletHeader {
            button: "Connect Wallet".to_string(),
            balance: None,
        },
        WalletState::Connected { address } => WalletHeader {
            button: shorten_address(address, 4, 4),
            balance: state.known_balance().map(|b| format!("{:.3}", b)),
        },
    }
}

pub fn headline(agg: &Aggregate, option_count: usize) -> Headline {
    let leader = match aggregator::leading_option(agg) {
        Some(leader) => leader,
        None => {
            return Headline {
                chance: "50% chance".to_string(),
                change: None,
            }
        }
    };

    let change = leader.share - equal_split(option_count);
    let change = if change > 0.0 {
        PriceChange::Up(format!("+{:.1}% from start", change))
    } else if change < 0.0 {
        PriceChange::Down(format!("{:.1}% from start", change))
    } else {
        PriceChange::Flat
    };

    Headline {
        chance: format!("{:.0}% chance", leader.share),
        change: Some(change),
    }
}

pub fn outcome_cards(market: &Market, agg: &Aggregate) -> Vec<OutcomeCard> {
    market
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let volume = agg.option_volumes.get(i).copied().unwrap_or(0.0);
            let percentage = if agg.total_volume > 0.0 {
                format!("{:.1}%", volume / agg.total_volume * 100.0)
            } else {
                "0%".to_string()
            };
            OutcomeCard {
                percentage,
                name: option.name.clone(),
                volume: format!("{:.3} SOL", volume),
            }
        })
        .collect()
}

pub fn option_rows(market: &Market, agg: &Aggregate, selected: Option<usize>) -> Vec<OptionRow> {
    let shares = agg.final_shares();

    market
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let odds = market.admin_odds(i);
            OptionRow {
                index: i,
                name: option.name.clone(),
                image: option.image.clone().filter(|url| !url.trim().is_empty()),
                percentage: format!("{:.1}%", shares.get(i).copied().unwrap_or(0.0)),
                odds: odds
                    .map(|o| format!("x{:.2}", o))
                    .unwrap_or_else(|| ODDS_MISSING.to_string()),
                odds_set: odds.is_some(),
                volume: format!("{:.3} SOL", agg.option_volumes.get(i).copied().unwrap_or(0.0)),
                selected: selected == Some(i),
            }
        })
        .collect()
}

/// Most recent bets in arrival order, newest first.
pub fn history(market: &Market, options: &RenderOptions) -> Option<HistoryView> {
    if market.bets.is_empty() {
        return None;
    }

    let start = market.bets.len().saturating_sub(options.history_limit);
    let entries = market.bets[start..]
        .iter()
        .rev()
        .map(|bet| history_entry(market, bet, &options.explorer_url))
        .collect();

    Some(HistoryView {
        title: format!("Recent Bets ({} total)", market.bets.len()),
        entries,
    })
}

fn history_entry(market: &Market, bet: &Bet, explorer_url: &str) -> HistoryEntry {
    HistoryEntry {
        option_name: market
            .options
            .get(bet.option_id)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "Unknown Option".to_string()),
        time: bet.created_at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
        amount: format!("{:.3} SOL", bet.amount),
        bettor: shorten_address(&bet.bettor_address, 6, 4),
        explorer_link: bet
            .transaction_signature
            .as_deref()
            .filter(|sig| !sig.is_empty())
            .map(|sig| {
                format!(
                    "{}/tx/{}?cluster=mainnet-beta",
                    explorer_url.trim_end_matches('/'),
                    sig
                )
            }),
    }
}

pub fn price_chart(market: &Market, agg: &Aggregate, charts_enabled: bool) -> ChartView {
    if !charts_enabled {
        return ChartView::Disabled;
    }
    if !agg.has_history() {
        return ChartView::Placeholder(NO_HISTORY.to_string());
    }

    ChartView::Chart(ChartSpec {
        kind: ChartKind::Line,
        labels: agg.labels.clone(),
        datasets: market
            .options
            .iter()
            .zip(agg.probabilities.iter())
            .enumerate()
            .map(|(i, (option, series))| Dataset {
                label: option.name.clone(),
                color: option_color(i),
                data: series.clone(),
            })
            .collect(),
        y_range: Some((0.0, 100.0)),
    })
}

pub fn volume_chart(agg: &Aggregate, charts_enabled: bool) -> ChartView {
    if !charts_enabled {
        return ChartView::Disabled;
    }
    if !agg.has_history() {
        return ChartView::Placeholder(NO_HISTORY.to_string());
    }

    ChartView::Chart(ChartSpec {
        kind: ChartKind::Bar,
        labels: agg.labels.clone(),
        datasets: vec![Dataset {
            label: "Volume (SOL)".to_string(),
            color: option_color(0),
            data: agg.step_volumes.clone(),
        }],
        y_range: None,
    })
}

pub fn order_book_panel(state: &AppState) -> OrderBookPanel {
    let names = state
        .market
        .as_ref()
        .map(|m| m.options.iter().map(|o| o.name.clone()).collect::<Vec<_>>())
        .unwrap_or_default();
    let selected = state.order_book_outcome.or(if names.is_empty() { None } else { Some(0) });

    OrderBookPanel {
        tabs: names
            .into_iter()
            .enumerate()
            .map(|(index, name)| OrderBookTab {
                index,
                name,
                color: option_color(index),
                active: selected == Some(index),
            })
            .collect(),
        book: selected.map(|outcome| OrderBookView::build(&state.order_book, outcome)),
    }
}

pub fn betting_interface(state: &AppState) -> BettingInterface {
    let blocked = |warning: &str| BettingInterface {
        warning: Some(warning.to_string()),
        submit_enabled: false,
        amount_enabled: false,
    };

    if !matches!(state.wallet, WalletState::Connected { .. }) {
        return blocked("Connect your wallet to place bets on this market");
    }

    let market = match &state.market {
        Some(market) if market.is_active() => market,
        _ => return blocked("This market is not available for betting"),
    };

    let odds_set = state
        .selected_option
        .and_then(|i| market.admin_odds(i))
        .is_some();
    if !odds_set {
        return blocked("Odds not set for this option. Please wait for admin.");
    }

    BettingInterface {
        warning: None,
        submit_enabled: state.selected_option.is_some(),
        amount_enabled: true,
    }
}

pub fn potential_return(state: &AppState) -> String {
    let (amount, option, market) = match (state.bet_amount, state.selected_option, &state.market) {
        (Some(amount), Some(option), Some(market)) if amount.is_finite() && amount != 0.0 => {
            (amount, option, market)
        }
        _ => return "0.00 SOL".to_string(),
    };

    match market.admin_odds(option) {
        Some(odds) => format!("{:.3} SOL", amount * odds),
        None => format!("{} to calculate", ODDS_MISSING),
    }
}
