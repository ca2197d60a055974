use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: MarketStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<MarketOption>,
    /// Entries that fail to parse are dropped.
    #[serde(default, deserialize_with = "deserialize_bets")]
    pub bets: Vec<Bet>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: MarketMetadata,
}

impl Market {
    pub fn is_active(&self) -> bool {
        self.status == MarketStatus::Active
    }

    /// Admin-set payout multiplier for an option, if one is set.
    pub fn admin_odds(&self, option: usize) -> Option<f64> {
        self.metadata.admin_odds.get(option).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MarketStatus {
    Active,
    #[default]
    Inactive,
    Other(String),
}

impl Serialize for MarketStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MarketStatus::Active => serializer.serialize_str("active"),
            MarketStatus::Inactive => serializer.serialize_str("inactive"),
            MarketStatus::Other(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for MarketStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "active" => MarketStatus::Active,
            "inactive" => MarketStatus::Inactive,
            _ => MarketStatus::Other(raw),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketMetadata {
    /// Sparse: entries may be absent, null or non-numeric.
    #[serde(default, deserialize_with = "deserialize_sparse_odds")]
    pub admin_odds: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOption {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    #[serde(deserialize_with = "deserialize_index")]
    pub option_id: usize,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub bettor_address: String,
    #[serde(default)]
    pub transaction_signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Ask,
    Bid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Index of the option this order trades.
    #[serde(deserialize_with = "deserialize_index")]
    pub outcome_id: usize,
    pub side: OrderSide,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub price: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct MarketResponse {
    pub market: Market,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookResponse {
    #[serde(default)]
    pub order_book: Vec<Order>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRecord {
    pub market_id: String,
    pub bettor_address: String,
    pub option_id: usize,
    pub amount: f64,
    pub transaction_signature: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn parse_decimal(raw: NumberOrString) -> Option<f64> {
    match raw {
        NumberOrString::Number(n) => Some(n),
        NumberOrString::Text(s) => s.trim().parse::<f64>().ok(),
    }
    .filter(|v| v.is_finite())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid market id: {}", other))),
    }
}

fn deserialize_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = NumberOrString::deserialize(deserializer)?;
    parse_decimal(raw).ok_or_else(|| serde::de::Error::custom("expected a decimal number"))
}

fn deserialize_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = deserialize_decimal(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!("invalid outcome index: {}", value)));
    }
    Ok(value as usize)
}

fn deserialize_bets<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Bet>, D::Error> {
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Bet>(value) {
            Ok(bet) => Some(bet),
            Err(e) => {
                warn!("Skipping malformed bet: {}", e);
                None
            }
        })
        .collect())
}

fn deserialize_sparse_odds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Option<f64>>, D::Error> {
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .map(|v| v.filter(|o| o.is_finite()))
        .collect())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp: {}", raw)))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
