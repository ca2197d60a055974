use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use crate::data::types::BetRecord;
use crate::data::MarketSource;
use crate::execution::journal::BetJournal;
use crate::execution::types::{BetReceipt, RecordStatus};
use crate::execution::validation::ValidatedBet;
use crate::monitoring::logger::CsvLogger;
use crate::wallet::{sol_to_lamports, ChainRpc, TransferRequest, WalletError, WalletProvider};

/// Signs and submits a treasury transfer for a bet, then records it.
///
/// Only signing and submission can abort a bet. Blockhash lookup,
/// confirmation, backend recording and local journaling degrade to warnings.
pub struct BetPlacer {
    wallet: Arc<dyn WalletProvider>,
    chain: Arc<dyn ChainRpc>,
    source: Arc<dyn MarketSource>,
    treasury: String,
    dry_run: bool,
    journal: Option<Mutex<BetJournal>>,
    csv: Option<CsvLogger>,
}

#[derive(Debug)]
pub struct BetOutcome {
    pub receipt: BetReceipt,
    /// Non-fatal problems worth telling the user about.
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BetError {
    #[error("Transaction cancelled by user")]
    Cancelled,

    #[error("Failed to place bet: {0}")]
    Wallet(WalletError),

    #[error("Failed to place bet: {0:#}")]
    Submit(anyhow::Error),
}

impl BetPlacer {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        chain: Arc<dyn ChainRpc>,
        source: Arc<dyn MarketSource>,
        treasury: String,
        dry_run: bool,
    ) -> Self {
        Self {
            wallet,
            chain,
            source,
            treasury,
            dry_run,
            journal: None,
            csv: None,
        }
    }

    pub fn with_journal(mut self, journal: BetJournal) -> Self {
        self.journal = Some(Mutex::new(journal));
        self
    }

    pub fn with_csv_logger(mut self, csv: CsvLogger) -> Self {
        self.csv = Some(csv);
        self
    }

    pub async fn place(&self, bettor: &str, bet: &ValidatedBet) -> Result<BetOutcome, BetError> {
        let mut warnings = Vec::new();
        let lamports = sol_to_lamports(bet.amount);

        info!(
            "Placing bet: market={} option={} amount={} SOL ({} lamports)",
            bet.market_id, bet.option_id, bet.amount, lamports
        );

        // 1. Recent blockhash (best effort)
        let recent_blockhash = match self.chain.get_latest_blockhash().await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Could not get recent blockhash: {:#}", e);
                None
            }
        };

        let transfer = TransferRequest {
            from: bettor.to_string(),
            to: self.treasury.clone(),
            lamports,
            fee_payer: bettor.to_string(),
            recent_blockhash,
        };

        // 2. Sign
        let signed = match self.wallet.sign_transfer(&transfer).await {
            Ok(signed) => signed,
            Err(WalletError::UserRejected) => {
                self.log_event("bet cancelled by user");
                return Err(BetError::Cancelled);
            }
            Err(e) => {
                error!("Bet signing failed: {}", e);
                self.log_event(&format!("bet signing failed: {}", e));
                return Err(BetError::Wallet(e));
            }
        };

        // 3. Submit
        let signature = match self.chain.send_raw_transaction(&signed).await {
            Ok(signature) => signature,
            Err(e) => {
                error!("Bet submission failed: {:#}", e);
                self.log_event(&format!("bet submission failed: {:#}", e));
                return Err(BetError::Submit(e));
            }
        };

        // 4. Confirm (best effort; the bet is recorded either way)
        let confirmed = match self.chain.confirm_transaction(&signature).await {
            Ok(()) => {
                info!("Bet transaction confirmed: {}", signature);
                true
            }
            Err(e) => {
                warn!("Could not confirm transaction {}: {:#}", signature, e);
                false
            }
        };

        // 5. Record with the backend
        let record_status = if self.dry_run {
            info!("Dry run: not recording bet {} with backend", signature);
            RecordStatus::Skipped
        } else {
            let record = BetRecord {
                market_id: bet.market_id.clone(),
                bettor_address: bettor.to_string(),
                option_id: bet.option_id,
                amount: bet.amount,
                transaction_signature: signature.clone(),
            };
            match self.source.record_bet(&record).await {
                Ok(()) => RecordStatus::Recorded,
                Err(e) => {
                    warn!("Failed to record bet {}: {:#}", signature, e);
                    warnings.push(format!("Bet submitted but not recorded: {:#}", e));
                    RecordStatus::Failed(format!("{:#}", e))
                }
            }
        };

        let mut receipt = BetReceipt {
            id: None,
            market_id: bet.market_id.clone(),
            option_id: bet.option_id,
            amount: bet.amount,
            lamports,
            bettor_address: bettor.to_string(),
            signature,
            confirmed,
            record_status,
            submitted_at: Utc::now(),
        };

        // 6. Local audit trail
        if let Some(journal) = &self.journal {
            let inserted = journal
                .lock()
                .map_err(|_| anyhow::anyhow!("Bet journal lock poisoned"))
                .and_then(|j| j.insert_receipt(&receipt));
            match inserted {
                Ok(id) => receipt.id = Some(id),
                Err(e) => warn!("Failed to journal bet {}: {:#}", receipt.signature, e),
            }
        }
        if let Some(csv) = &self.csv {
            if let Err(e) = csv.log_bet(&receipt) {
                warn!("Failed to write bet CSV: {:#}", e);
            }
        }

        if !confirmed {
            warnings.push(format!(
                "Transaction {} not confirmed yet; recorded optimistically",
                receipt.signature
            ));
        }

        Ok(BetOutcome { receipt, warnings })
    }

    fn log_event(&self, event: &str) {
        if let Some(csv) = &self.csv {
            if let Err(e) = csv.log_event(event) {
                warn!("Failed to write bet CSV: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PaperTradingConfig;
    use crate::data::types::{Market, Order};
    use crate::wallet::SignedTransfer;
    use crate::wallet::paper::{PaperChain, PaperWallet};
    use anyhow::Result;
    use async_trait::async_trait;

    pub(crate) const TREASURY: &str = "3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6evm";

    /// In-memory backend that remembers recorded bets.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub market: Mutex<Option<Market>>,
        pub orders: Mutex<Vec<Order>>,
        pub recorded: Mutex<Vec<BetRecord>>,
        pub fail_records: bool,
        pub market_fetches: std::sync::atomic::AtomicUsize,
        pub fetch_delay_ms: u64,
    }

    #[async_trait]
    impl MarketSource for FakeSource {
        async fn fetch_market(&self, _id: &str) -> Result<Market> {
            self.market_fetches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fetch_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.fetch_delay_ms)).await;
            }
            let market = self.market.lock().unwrap().clone();
            market.ok_or_else(|| anyhow::anyhow!("API error: 404 - Not Found"))
        }

        async fn fetch_order_book(&self, _market_id: &str) -> Vec<Order> {
            self.orders.lock().unwrap().clone()
        }

        async fn record_bet(&self, record: &BetRecord) -> Result<()> {
            if self.fail_records {
                anyhow::bail!("API error: 500 - Internal Server Error");
            }
            self.recorded.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    pub(crate) fn paper_config(reject_rate: f64, confirm_rate: f64) -> PaperTradingConfig {
        PaperTradingConfig {
            enabled: true,
            initial_balance_sol: 2.0,
            confirm_rate,
            reject_rate,
            address: "PaperWa11et1111111111111111111111111111111".to_string(),
            rpc_reachable: true,
        }
    }

    fn bet(amount: f64) -> ValidatedBet {
        ValidatedBet {
            market_id: "m1".to_string(),
            option_id: 1,
            amount,
        }
    }

    async fn placer(
        config: &PaperTradingConfig,
        source: Arc<FakeSource>,
        dry_run: bool,
    ) -> (BetPlacer, String) {
        let wallet = Arc::new(PaperWallet::new(config));
        let address = wallet.connect().await.unwrap();
        let placer = BetPlacer::new(
            wallet,
            Arc::new(PaperChain::new(config)),
            source,
            TREASURY.to_string(),
            dry_run,
        )
        .with_journal(BetJournal::new(":memory:").unwrap());
        (placer, address)
    }

    #[tokio::test]
    async fn test_successful_bet_is_recorded() {
        let source = Arc::new(FakeSource::default());
        let (placer, address) = placer(&paper_config(0.0, 1.0), source.clone(), false).await;

        let outcome = placer.place(&address, &bet(0.25)).await.unwrap();

        assert!(outcome.receipt.confirmed);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.receipt.lamports, 250_000_000);
        assert_eq!(outcome.receipt.record_status, RecordStatus::Recorded);
        assert!(outcome.receipt.id.is_some());

        let recorded = source.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].option_id, 1);
        assert_eq!(recorded[0].transaction_signature, outcome.receipt.signature);
    }

    #[tokio::test]
    async fn test_unconfirmed_bet_still_recorded() {
        let source = Arc::new(FakeSource::default());
        let (placer, address) = placer(&paper_config(0.0, 0.0), source.clone(), false).await;

        let outcome = placer.place(&address, &bet(0.1)).await.unwrap();

        assert!(!outcome.receipt.confirmed);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(source.recorded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_failure_is_not_fatal() {
        let source = Arc::new(FakeSource {
            fail_records: true,
            ..Default::default()
        });
        let (placer, address) = placer(&paper_config(0.0, 1.0), source, false).await;

        let outcome = placer.place(&address, &bet(0.1)).await.unwrap();

        assert!(matches!(outcome.receipt.record_status, RecordStatus::Failed(_)));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_skips_backend() {
        let source = Arc::new(FakeSource::default());
        let (placer, address) = placer(&paper_config(0.0, 1.0), source.clone(), true).await;

        let outcome = placer.place(&address, &bet(0.1)).await.unwrap();

        assert_eq!(outcome.receipt.record_status, RecordStatus::Skipped);
        assert!(source.recorded.lock().unwrap().is_empty());
    }

    /// Connects normally, then turns down every signing request.
    struct SignDecliningWallet {
        address: String,
    }

    #[async_trait]
    impl WalletProvider for SignDecliningWallet {
        async fn is_available(&self) -> bool {
            true
        }

        async fn connect(&self) -> Result<String, WalletError> {
            Ok(self.address.clone())
        }

        async fn disconnect(&self) -> Result<(), WalletError> {
            Ok(())
        }

        async fn public_key(&self) -> Option<String> {
            Some(self.address.clone())
        }

        async fn sign_transfer(&self, _transfer: &TransferRequest) -> Result<SignedTransfer, WalletError> {
            Err(WalletError::UserRejected)
        }
    }

    #[tokio::test]
    async fn test_declined_signature_cancels_bet() {
        let config = paper_config(0.0, 1.0);
        let source = Arc::new(FakeSource::default());
        let wallet = Arc::new(SignDecliningWallet { address: config.address.clone() });
        let address = wallet.connect().await.unwrap();
        let chain = Arc::new(PaperChain::new(&config));
        let placer = BetPlacer::new(wallet, chain.clone(), source.clone(), TREASURY.to_string(), false)
            .with_journal(BetJournal::new(":memory:").unwrap());

        let err = placer.place(&address, &bet(0.1)).await.unwrap_err();

        assert!(matches!(err, BetError::Cancelled));
        assert_eq!(err.to_string(), "Transaction cancelled by user");
        assert!(source.recorded.lock().unwrap().is_empty());
        assert_eq!(chain.get_balance(&address).await.unwrap(), 2_000_000_000);
    }

    #[tokio::test]
    async fn test_disconnected_wallet_fails_bet() {
        let config = paper_config(0.0, 1.0);
        let source = Arc::new(FakeSource::default());
        let placer = BetPlacer::new(
            Arc::new(PaperWallet::new(&config)),
            Arc::new(PaperChain::new(&config)),
            source.clone(),
            TREASURY.to_string(),
            false,
        );

        let err = placer.place(&config.address, &bet(0.1)).await.unwrap_err();

        assert!(matches!(err, BetError::Wallet(WalletError::Other(_))));
        assert_eq!(err.to_string(), "Failed to place bet: Wallet error: Wallet not connected");
        assert!(source.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_aborts() {
        let source = Arc::new(FakeSource::default());
        let (placer, address) = placer(&paper_config(0.0, 1.0), source.clone(), false).await;

        // More than the 2 SOL paper balance
        let err = placer.place(&address, &bet(5.0)).await.unwrap_err();

        assert!(matches!(err, BetError::Submit(_)));
        assert!(err.to_string().starts_with("Failed to place bet: Insufficient funds"));
        assert!(source.recorded.lock().unwrap().is_empty());
    }
}
