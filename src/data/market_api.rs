use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::{debug, warn};
use crate::data::types::{BetRecord, Market, MarketResponse, Order, OrderBookResponse};

/// REST client for the market backend.
pub struct MarketApiClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API error: {0} - {1}")]
    Status(u16, String),
}

impl MarketApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(&base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot take a path: {}", base_url);
        }

        Ok(Self { client, base_url })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch a market with its options, bets and metadata.
    pub async fn fetch_market(&self, id: &str) -> Result<Market> {
        let response = self.client
            .get(self.url(&["markets", id])?)
            .send()
            .await
            .context("Failed to fetch market")?;

        let body: MarketResponse = ensure_ok(response)?
            .json()
            .await
            .context("Failed to parse market response")?;

        debug!(
            "Market {} loaded: {} options, {} bets",
            body.market.id,
            body.market.options.len(),
            body.market.bets.len()
        );
        Ok(body.market)
    }

    /// Fetch the order book; any failure yields an empty book.
    pub async fn fetch_order_book(&self, market_id: &str) -> Vec<Order> {
        match self.try_fetch_order_book(market_id).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!("Order book unavailable for market {}: {:#}", market_id, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_order_book(&self, market_id: &str) -> Result<Vec<Order>> {
        let response = self.client
            .get(self.url(&["orderbook", market_id])?)
            .send()
            .await
            .context("Failed to fetch order book")?;

        let body: OrderBookResponse = ensure_ok(response)?
            .json()
            .await
            .context("Failed to parse order book response")?;

        Ok(body.order_book)
    }

    /// Record a submitted bet with the backend.
    pub async fn record_bet(&self, record: &BetRecord) -> Result<()> {
        let response = self.client
            .post(self.url(&["bets"])?)
            .json(record)
            .send()
            .await
            .context("Failed to record bet")?;

        ensure_ok(response)?;
        Ok(())
    }
}

fn ensure_ok(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown").to_string(),
        )
        .into());
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = MarketApiClient::new(
            "https://api.example.com/api/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.url(&["markets", "7"]).unwrap().as_str(),
            "https://api.example.com/api/markets/7"
        );
    }

    #[test]
    fn test_market_id_is_escaped_in_path() {
        let client = MarketApiClient::new(
            "https://api.example.com/api".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.url(&["markets", "a/b?c"]).unwrap().as_str(),
            "https://api.example.com/api/markets/a%2Fb%3Fc"
        );
        assert_eq!(
            client.url(&["orderbook", "../admin"]).unwrap().as_str(),
            "https://api.example.com/api/orderbook/..%2Fadmin"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(MarketApiClient::new("not a url".to_string(), Duration::from_secs(5)).is_err());
        assert!(MarketApiClient::new("mailto:ops@example.com".to_string(), Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status(404, "Not Found".to_string());
        assert_eq!(err.to_string(), "API error: 404 - Not Found");
    }

    #[tokio::test]
    async fn test_unreachable_order_book_is_empty() {
        let client = MarketApiClient::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(client.fetch_order_book("1").await.is_empty());
    }
}
