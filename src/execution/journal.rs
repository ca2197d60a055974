use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{info, warn};
use crate::execution::types::{BetReceipt, RecordStatus};
use crate::wallet::ChainRpc;

/// Local audit trail of every transfer this client submitted.
pub struct BetJournal {
    conn: Connection,
}

impl BetJournal {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market_id TEXT NOT NULL,
                option_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                lamports INTEGER NOT NULL,
                bettor_address TEXT NOT NULL,
                signature TEXT NOT NULL UNIQUE,
                confirmed INTEGER NOT NULL DEFAULT 0,
                record_status TEXT NOT NULL,
                record_error TEXT,
                submitted_at TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_bets_market_id ON bets(market_id);
            CREATE INDEX IF NOT EXISTS idx_bets_confirmed ON bets(confirmed);
            "#
        )?;

        Ok(Self { conn })
    }

    /// Insert a submitted bet
    pub fn insert_receipt(&self, receipt: &BetReceipt) -> Result<i64> {
        let record_error = match &receipt.record_status {
            RecordStatus::Failed(reason) => Some(reason.as_str()),
            _ => None,
        };

        self.conn.execute(
            "INSERT INTO bets (market_id, option_id, amount, lamports, bettor_address, signature,
                               confirmed, record_status, record_error, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                receipt.market_id,
                receipt.option_id as i64,
                receipt.amount,
                receipt.lamports as i64,
                receipt.bettor_address,
                receipt.signature,
                receipt.confirmed,
                receipt.record_status.as_str(),
                record_error,
                receipt.submitted_at.to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Bets whose transfer never confirmed
    pub fn get_unconfirmed(&self) -> Result<Vec<BetReceipt>> {
        self.query_receipts("WHERE confirmed = 0 ORDER BY submitted_at", [])
    }

    /// Bets for one market, newest first
    pub fn get_for_market(&self, market_id: &str) -> Result<Vec<BetReceipt>> {
        self.query_receipts(
            "WHERE market_id = ?1 ORDER BY submitted_at DESC",
            params![market_id],
        )
    }

    pub fn count_bets(&self) -> Result<usize> {
        let count: usize = self.conn.query_row("SELECT COUNT(*) FROM bets", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Mark a transfer confirmed after a later check
    pub fn mark_confirmed(&self, signature: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE bets SET confirmed = 1 WHERE signature = ?1",
            params![signature],
        )?;
        Ok(updated > 0)
    }

    fn query_receipts<P: rusqlite::Params>(&self, filter: &str, params: P) -> Result<Vec<BetReceipt>> {
        let sql = format!(
            "SELECT id, market_id, option_id, amount, lamports, bettor_address, signature,
                    confirmed, record_status, record_error, submitted_at
             FROM bets {}",
            filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let receipts = stmt.query_map(params, receipt_from_row)?;

        receipts.collect::<Result<Vec<_>, _>>().map_err(|e| e.into())
    }
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<BetReceipt> {
    let option_id: i64 = row.get(2)?;
    let lamports: i64 = row.get(4)?;
    let record_status: String = row.get(8)?;
    let record_error: Option<String> = row.get(9)?;

    let submitted_at_str: String = row.get(10)?;
    let submitted_at = DateTime::parse_from_rfc3339(&submitted_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(BetReceipt {
        id: Some(row.get(0)?),
        market_id: row.get(1)?,
        option_id: option_id as usize,
        amount: row.get(3)?,
        lamports: lamports as u64,
        bettor_address: row.get(5)?,
        signature: row.get(6)?,
        confirmed: row.get(7)?,
        record_status: RecordStatus::parse(&record_status, record_error),
        submitted_at,
    })
}

/// Report transfers that were recorded without on-chain confirmation.
pub fn audit_unconfirmed(journal: &BetJournal) -> Result<usize> {
    let unconfirmed = journal.get_unconfirmed()?;
    info!(
        "Bet journal: {} bets, {} unconfirmed",
        journal.count_bets()?,
        unconfirmed.len()
    );

    for bet in &unconfirmed {
        warn!(
            "Unconfirmed bet: market={}, option={}, amount={:.3} SOL, signature={}, record={}",
            bet.market_id,
            bet.option_id,
            bet.amount,
            bet.signature,
            bet.record_status.as_str()
        );
    }

    Ok(unconfirmed.len())
}

/// Re-check unconfirmed transfers against the chain and mark the ones
/// that have since landed. Returns how many were confirmed.
pub async fn reconcile_unconfirmed(journal: &BetJournal, chain: &dyn ChainRpc) -> Result<usize> {
    let mut confirmed = 0;

    for bet in journal.get_unconfirmed()? {
        match chain.confirm_transaction(&bet.signature).await {
            Ok(()) => {
                if journal.mark_confirmed(&bet.signature)? {
                    info!("Bet {} confirmed on chain", bet.signature);
                    confirmed += 1;
                }
            }
            Err(e) => warn!("Bet {} still unconfirmed: {:#}", bet.signature, e),
        }
    }

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaperTradingConfig;
    use crate::wallet::paper::PaperChain;
    use crate::wallet::{SignedTransfer, TransferRequest};
    use chrono::{Duration, TimeZone};

    fn receipt(signature: &str, confirmed: bool, record_status: RecordStatus, minutes: i64) -> BetReceipt {
        BetReceipt {
            id: None,
            market_id: "m1".to_string(),
            option_id: 1,
            amount: 0.25,
            lamports: 250_000_000,
            bettor_address: "Bettor1111111111111111111111111111".to_string(),
            signature: signature.to_string(),
            confirmed,
            record_status,
            submitted_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_insert_and_query_roundtrip() {
        let journal = BetJournal::new(":memory:").unwrap();
        journal.insert_receipt(&receipt("sig-a", true, RecordStatus::Recorded, 0)).unwrap();
        journal
            .insert_receipt(&receipt("sig-b", false, RecordStatus::Failed("API error: 500".into()), 5))
            .unwrap();

        let bets = journal.get_for_market("m1").unwrap();
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].signature, "sig-b");
        assert_eq!(bets[0].record_status, RecordStatus::Failed("API error: 500".into()));
        assert_eq!(bets[1].lamports, 250_000_000);
        assert!(bets[1].confirmed);
    }

    #[test]
    fn test_unconfirmed_audit() {
        let journal = BetJournal::new(":memory:").unwrap();
        journal.insert_receipt(&receipt("sig-a", false, RecordStatus::Skipped, 0)).unwrap();
        journal.insert_receipt(&receipt("sig-b", true, RecordStatus::Recorded, 1)).unwrap();

        assert_eq!(audit_unconfirmed(&journal).unwrap(), 1);

        assert!(journal.mark_confirmed("sig-a").unwrap());
        assert!(!journal.mark_confirmed("missing").unwrap());
        assert_eq!(audit_unconfirmed(&journal).unwrap(), 0);
        assert_eq!(journal.count_bets().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let journal = BetJournal::new(":memory:").unwrap();
        journal.insert_receipt(&receipt("sig-a", true, RecordStatus::Recorded, 0)).unwrap();

        assert!(journal.insert_receipt(&receipt("sig-a", true, RecordStatus::Recorded, 1)).is_err());
    }

    #[tokio::test]
    async fn test_reconcile_marks_landed_transfers() {
        let config = PaperTradingConfig {
            confirm_rate: 1.0,
            ..Default::default()
        };
        let chain = PaperChain::new(&config);
        let transfer = TransferRequest {
            from: config.address.clone(),
            to: "3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6evm".to_string(),
            lamports: 1_000,
            fee_payer: config.address.clone(),
            recent_blockhash: None,
        };
        let signed = SignedTransfer { bytes: serde_json::to_vec(&transfer).unwrap() };
        let landed = chain.send_raw_transaction(&signed).await.unwrap();

        let journal = BetJournal::new(":memory:").unwrap();
        journal.insert_receipt(&receipt(&landed, false, RecordStatus::Recorded, 0)).unwrap();
        journal.insert_receipt(&receipt("never-sent", false, RecordStatus::Recorded, 1)).unwrap();

        assert_eq!(reconcile_unconfirmed(&journal, &chain).await.unwrap(), 1);

        let pending = journal.get_unconfirmed().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].signature, "never-sent");
    }
}
