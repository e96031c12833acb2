use crate::config::{Credentials, MarketConfig};
use crate::market::traits::MarketApi;
use crate::model::{MarketError, PriceHistogram};
use crate::utils::encode_market_hash_name;

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct SteamMarketClient {
    client: Client,
    config: MarketConfig,
    credentials: Credentials,
}

impl SteamMarketClient {
    pub fn new(config: MarketConfig, credentials: Credentials) -> Result<Self, MarketError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) MarketWatch/0.1")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| MarketError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Account the client acts for. Session handling lives outside this service.
    pub fn account(&self) -> &str {
        &self.credentials.username
    }

    fn listing_url(&self, market_hash_name: &str) -> String {
        format!(
            "{}/market/listings/{}/{}",
            self.config.base_url,
            self.config.app_id,
            encode_market_hash_name(market_hash_name)
        )
    }

    fn histogram_url(&self) -> String {
        format!("{}/market/itemordershistogram/", self.config.base_url)
    }
}

fn map_send_error(e: reqwest::Error) -> MarketError {
    if e.is_timeout() {
        MarketError::Timeout
    } else {
        MarketError::HttpError(e.to_string())
    }
}

#[async_trait::async_trait]
impl MarketApi for SteamMarketClient {
    async fn fetch_price_history(&self, market_hash_name: &str) -> Result<String, MarketError> {
        let url = self.listing_url(market_hash_name);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(map_send_error)?;
        if !response.status().is_success() {
            return Err(MarketError::InvalidResponse(response.status().as_u16()));
        }

        response.text().await.map_err(map_send_error)
    }

    async fn fetch_price_histogram(&self, item_name_id: u64) -> Result<PriceHistogram, MarketError> {
        let url = self.histogram_url();
        debug!("GET {} item_nameid={}", url, item_name_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("country", self.config.country.clone()),
                ("language", self.config.language.clone()),
                ("currency", self.config.currency.to_string()),
                ("item_nameid", item_name_id.to_string()),
                ("two_factor", "0".to_string()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(MarketError::InvalidResponse(response.status().as_u16()));
        }

        let body = response.text().await.map_err(map_send_error)?;
        serde_json::from_str(&body).map_err(|e| MarketError::MalformedJson(e.to_string()))
    }

    fn currency(&self) -> u32 {
        self.config.currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardSecrets;

    fn client() -> SteamMarketClient {
        let credentials = Credentials {
            api_key: String::new(),
            username: String::new(),
            password: String::new(),
            guard_secrets: GuardSecrets {
                steamid: String::new(),
                shared_secret: String::new(),
                identity_secret: String::new(),
            },
        };
        SteamMarketClient::new(MarketConfig::default(), credentials).unwrap()
    }

    #[test]
    fn builds_listing_url_with_encoded_name() {
        assert_eq!(
            client().listing_url("Raider Crate (Gold)"),
            "https://steamcommunity.com/market/listings/578080/Raider%20Crate%20%28Gold%29"
        );
    }

    #[test]
    fn histogram_goes_to_orders_endpoint() {
        assert_eq!(
            client().histogram_url(),
            "https://steamcommunity.com/market/itemordershistogram/"
        );
        assert_eq!(client().currency(), 1);
    }
}
