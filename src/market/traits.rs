use crate::model::{MarketError, PriceHistogram};

/// Read-only access to the market endpoints the watcher needs.
#[async_trait::async_trait]
pub trait MarketApi: Send + Sync {
    /// Raw listing page containing the embedded price history.
    async fn fetch_price_history(&self, market_hash_name: &str) -> Result<String, MarketError>;

    async fn fetch_price_histogram(&self, item_name_id: u64) -> Result<PriceHistogram, MarketError>;

    /// Currency the histogram prices are quoted in.
    fn currency(&self) -> u32;
}
