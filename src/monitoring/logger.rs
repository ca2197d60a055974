use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use crate::execution::types::BetReceipt;

pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;

            writeln!(
                file,
                "timestamp,market_id,option_id,amount,bettor,signature,confirmed,record_status"
            )?;
        }

        Ok(Self { log_path })
    }

    /// Append a bet receipt
    pub fn log_bet(&self, receipt: &BetReceipt) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        writeln!(
            file,
            "{},{},{},{:.9},{},{},{},{}",
            receipt.submitted_at.to_rfc3339(),
            receipt.market_id,
            receipt.option_id,
            receipt.amount,
            receipt.bettor_address,
            receipt.signature,
            receipt.confirmed,
            receipt.record_status.as_str()
        )?;

        Ok(())
    }

    /// Log a free-form event
    pub fn log_event(&self, event: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        writeln!(
            file,
            "{},EVENT,{},,,,,",
            Utc::now().to_rfc3339(),
            event.replace(',', ";")
        )?;

        Ok(())
    }
}
