use tracing::info;
use crate::data::types::Market;

/// Snapshot of what the user has entered and what we know about the wallet.
#[derive(Debug, Clone, Copy)]
pub struct BetContext<'a> {
    pub wallet_connected: bool,
    pub market: Option<&'a Market>,
    pub selected_option: Option<usize>,
    pub amount: Option<f64>,
    /// `None` in fallback mode, where the balance check is skipped.
    pub balance: Option<f64>,
}

/// Validate a bet locally before the wallet is ever touched.
pub fn validate_bet(ctx: &BetContext<'_>) -> Result<ValidatedBet, ValidationError> {
    // 1. Wallet, selection and market present
    let (market, option) = match (ctx.wallet_connected, ctx.market, ctx.selected_option) {
        (true, Some(market), Some(option)) => (market, option),
        _ => return Err(ValidationError::NotReady),
    };

    // 2. Positive amount
    let amount = match ctx.amount {
        Some(amount) if amount > 0.0 && amount.is_finite() => amount,
        _ => return Err(ValidationError::InvalidAmount),
    };

    // 3. Capital check (only when the balance is known)
    if let Some(balance) = ctx.balance {
        if amount > balance {
            return Err(ValidationError::InsufficientBalance(amount, balance));
        }
    }

    // 4. Market open
    if !market.is_active() {
        return Err(ValidationError::MarketInactive);
    }

    // 5. Option exists and has odds
    if option >= market.options.len() {
        return Err(ValidationError::UnknownOption(option));
    }
    if market.admin_odds(option).is_none() {
        return Err(ValidationError::OddsNotSet);
    }

    info!("Bet validation passed: market={} option={} amount={}", market.id, option, amount);
    Ok(ValidatedBet {
        market_id: market.id.clone(),
        option_id: option,
        amount,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBet {
    pub market_id: String,
    pub option_id: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please connect wallet and select an option")]
    NotReady,

    #[error("Please enter a valid bet amount")]
    InvalidAmount,

    #[error("Insufficient balance: need {0:.3} SOL, have {1:.3} SOL")]
    InsufficientBalance(f64, f64),

    #[error("This market is not available for betting")]
    MarketInactive,

    #[error("Unknown option: {0}")]
    UnknownOption(usize),

    #[error("Odds not set for this option. Please wait for admin.")]
    OddsNotSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{MarketMetadata, MarketOption, MarketStatus};

    fn market(status: MarketStatus, odds: Vec<Option<f64>>) -> Market {
        Market {
            id: "m1".to_string(),
            title: "Test".to_string(),
            category: "Test".to_string(),
            status,
            options: vec![
                MarketOption { name: "Yes".to_string(), image: None },
                MarketOption { name: "No".to_string(), image: None },
            ],
            bets: Vec::new(),
            metadata: MarketMetadata { admin_odds: odds },
        }
    }

    fn ctx(market: &Market) -> BetContext<'_> {
        BetContext {
            wallet_connected: true,
            market: Some(market),
            selected_option: Some(0),
            amount: Some(0.5),
            balance: Some(1.0),
        }
    }

    #[test]
    fn test_valid_bet() {
        let m = market(MarketStatus::Active, vec![Some(1.9), Some(2.1)]);
        let bet = validate_bet(&ctx(&m)).unwrap();

        assert_eq!(bet.option_id, 0);
        assert_eq!(bet.amount, 0.5);
    }

    #[test]
    fn test_insufficient_balance_blocks() {
        let m = market(MarketStatus::Active, vec![Some(1.9)]);
        let mut c = ctx(&m);
        c.amount = Some(1.5);

        assert_eq!(validate_bet(&c), Err(ValidationError::InsufficientBalance(1.5, 1.0)));
    }

    #[test]
    fn test_fallback_mode_skips_balance_check() {
        let m = market(MarketStatus::Active, vec![Some(1.9)]);
        let mut c = ctx(&m);
        c.amount = Some(50.0);
        c.balance = None;

        assert!(validate_bet(&c).is_ok());
    }

    #[test]
    fn test_non_positive_amounts() {
        let m = market(MarketStatus::Active, vec![Some(1.9)]);
        for amount in [None, Some(0.0), Some(-1.0), Some(f64::NAN)] {
            let mut c = ctx(&m);
            c.amount = amount;
            assert_eq!(validate_bet(&c), Err(ValidationError::InvalidAmount));
        }
    }

    #[test]
    fn test_missing_prerequisites() {
        let m = market(MarketStatus::Active, vec![Some(1.9)]);

        let mut c = ctx(&m);
        c.wallet_connected = false;
        assert_eq!(validate_bet(&c), Err(ValidationError::NotReady));

        let mut c = ctx(&m);
        c.selected_option = None;
        assert_eq!(validate_bet(&c), Err(ValidationError::NotReady));
    }

    #[test]
    fn test_inactive_market() {
        let m = market(MarketStatus::Inactive, vec![Some(1.9)]);
        assert_eq!(validate_bet(&ctx(&m)), Err(ValidationError::MarketInactive));
    }

    #[test]
    fn test_odds_not_set() {
        let m = market(MarketStatus::Active, vec![None, Some(2.0)]);
        assert_eq!(validate_bet(&ctx(&m)), Err(ValidationError::OddsNotSet));

        let mut c = ctx(&m);
        c.selected_option = Some(1);
        assert!(validate_bet(&c).is_ok());
    }
}
