use chrono::{DateTime, Utc};

/// Outcome of the backend `POST /bets` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Recorded,
    /// Dry run: the bet was only journaled locally.
    Skipped,
    Failed(String),
}

impl RecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RecordStatus::Recorded => "recorded",
            RecordStatus::Skipped => "skipped",
            RecordStatus::Failed(_) => "failed",
        }
    }

    pub fn parse(raw: &str, detail: Option<String>) -> Self {
        match raw {
            "recorded" => RecordStatus::Recorded,
            "skipped" => RecordStatus::Skipped,
            _ => RecordStatus::Failed(detail.unwrap_or_default()),
        }
    }
}

/// Everything known about a bet once its transfer has been submitted.
#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub id: Option<i64>,
    pub market_id: String,
    pub option_id: usize,
    pub amount: f64,
    pub lamports: u64,
    pub bettor_address: String,
    pub signature: String,
    /// Recorded regardless; unconfirmed transfers stay flagged for audit.
    pub confirmed: bool,
    pub record_status: RecordStatus,
    pub submitted_at: DateTime<Utc>,
}
