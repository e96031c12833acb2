use super::series::{Frame, TimeSeries};
use super::stats::{Shortcuts, StatisticsBag, Window};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One fetched price history of an item, with whatever the last successful
/// analysis derived from it.
#[derive(Debug, Clone)]
pub struct History {
    pub original: TimeSeries,
    pub frames: BTreeMap<Window, Frame>,
    pub statistics: StatisticsBag,
    pub shortcuts: Option<Shortcuts>,
    pub created_at: DateTime<Utc>,
}

impl History {
    pub fn new(original: TimeSeries) -> Self {
        Self {
            original,
            frames: BTreeMap::new(),
            statistics: StatisticsBag::new(),
            shortcuts: None,
            created_at: Utc::now(),
        }
    }

    pub fn statistics_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.statistics)
    }
}
