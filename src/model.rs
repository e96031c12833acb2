// Core structs: signals, market DTOs and error types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a column over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendSignal {
    Down = -1,
    None = 0,
    Up = 1,
}

/// Which kind of extremum was seen last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtremaSignal {
    Min = -1,
    None = 0,
    Max = 1,
}

/// Result an executed item action reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSignal {
    Ok = 0,
    Next = 1,
    Delete = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIdentity {
    pub item_name_id: u64,
    pub market_hash_name: String,
}

impl std::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} (\"{}\")", self.item_name_id, self.market_hash_name)
    }
}

/// Order book summary returned by the market's histogram endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceHistogram {
    #[serde(default)]
    pub highest_buy_order: Option<String>,
    #[serde(default)]
    pub lowest_sell_order: Option<String>,
    pub graph_max_x: f64,
    pub graph_min_x: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub item_name_id: u64,
    pub lowest_sell_order: Option<f64>,
    pub highest_sell_order: f64,
    pub lowest_buy_order: f64,
    pub highest_buy_order: Option<f64>,
    pub currency_id: u32,
    pub created_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Builds a snapshot from a histogram. Order prices arrive as integer cents.
    pub fn from_histogram(
        item_name_id: u64,
        histogram: &PriceHistogram,
        currency_id: u32,
    ) -> Result<Self, ParserError> {
        Ok(Self {
            item_name_id,
            lowest_sell_order: cents_to_price(histogram.lowest_sell_order.as_deref())?,
            highest_sell_order: histogram.graph_max_x,
            lowest_buy_order: histogram.graph_min_x,
            highest_buy_order: cents_to_price(histogram.highest_buy_order.as_deref())?,
            currency_id,
            created_at: Utc::now(),
        })
    }
}

fn cents_to_price(raw: Option<&str>) -> Result<Option<f64>, ParserError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<u64>()
            .map(|cents| Some(cents as f64 / 100.0))
            .map_err(|_| ParserError::InvalidNumber(text.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
    #[error("request timed out")]
    Timeout,
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("marker pair `{prefix}`..`{suffix}` not found")]
    MissingMarkers { prefix: String, suffix: String },
    #[error("malformed history literal: {0}")]
    MalformedLiteral(#[from] serde_json::Error),
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("history is empty")]
    Empty,
    #[error("timestamps not strictly ascending at row {0}")]
    Unordered(usize),
    #[error("HTML parse error: {0}")]
    HtmlParseError(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("column `{column}` needs at least {needed} points, got {got}")]
    TooFewPoints {
        column: String,
        needed: usize,
        got: usize,
    },
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error("column `{0}` contains non-finite values")]
    NonFinite(String),
    #[error("`{name}` must be positive, got {value}")]
    InvalidWindow { name: String, value: i64 },
    #[error("unknown extrema method `{0}`")]
    UnknownMethod(String),
    #[error("extrema side needs at least one minimum and one maximum")]
    EmptyExtrema,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Everything that can go wrong while an item runs one of its actions.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_converts_cents_and_keeps_graph_bounds() {
        let histogram: PriceHistogram = serde_json::from_str(
            r#"{"highest_buy_order":"1234","lowest_sell_order":"1300","graph_max_x":14.5,"graph_min_x":11.0}"#,
        )
        .unwrap();
        let snapshot = PriceSnapshot::from_histogram(42, &histogram, 1).unwrap();
        assert_eq!(snapshot.highest_buy_order, Some(12.34));
        assert_eq!(snapshot.lowest_sell_order, Some(13.0));
        assert_eq!(snapshot.highest_sell_order, 14.5);
        assert_eq!(snapshot.lowest_buy_order, 11.0);
    }

    #[test]
    fn snapshot_maps_missing_orders_to_none() {
        let histogram: PriceHistogram =
            serde_json::from_str(r#"{"highest_buy_order":null,"graph_max_x":2.0,"graph_min_x":1.0}"#)
                .unwrap();
        let snapshot = PriceSnapshot::from_histogram(1, &histogram, 3).unwrap();
        assert_eq!(snapshot.highest_buy_order, None);
        assert_eq!(snapshot.lowest_sell_order, None);
    }

    #[test]
    fn snapshot_rejects_garbage_cents() {
        let histogram = PriceHistogram {
            highest_buy_order: Some("12a".into()),
            lowest_sell_order: None,
            graph_max_x: 0.0,
            graph_min_x: 0.0,
        };
        assert!(matches!(
            PriceSnapshot::from_histogram(1, &histogram, 1),
            Err(ParserError::InvalidNumber(_))
        ));
    }
}
