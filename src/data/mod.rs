pub mod aggregator;
pub mod market_api;
pub mod order_book;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use crate::data::market_api::MarketApiClient;
use crate::data::types::{BetRecord, Market, Order};

/// Backend operations the controller depends on.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_market(&self, id: &str) -> Result<Market>;
    /// Never fails; an unavailable book is empty.
    async fn fetch_order_book(&self, market_id: &str) -> Vec<Order>;
    async fn record_bet(&self, record: &BetRecord) -> Result<()>;
}

#[async_trait]
impl MarketSource for MarketApiClient {
    async fn fetch_market(&self, id: &str) -> Result<Market> {
        MarketApiClient::fetch_market(self, id).await
    }

    async fn fetch_order_book(&self, market_id: &str) -> Vec<Order> {
        MarketApiClient::fetch_order_book(self, market_id).await
    }

    async fn record_bet(&self, record: &BetRecord) -> Result<()> {
        MarketApiClient::record_bet(self, record).await
    }
}
