use super::extrema::Extrema;
use crate::model::{ExtremaSignal, TrendSignal};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Original,
    Daily,
    #[serde(rename = "week")]
    Weekly,
    #[serde(rename = "month")]
    Monthly,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Original => "original",
            Window::Daily => "daily",
            Window::Weekly => "week",
            Window::Monthly => "month",
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Scalar(f64),
    Trend(TrendSignal),
    Extrema(Extrema),
}

/// Named metrics of one analysis pass, per window.
pub type StatisticsBag = BTreeMap<Window, BTreeMap<String, Metric>>;

/// The values the item lifecycle reads; everything else in the bag is detail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shortcuts {
    pub daily_trend: TrendSignal,
    pub week_trend: TrendSignal,
    pub month_trend: TrendSignal,
    pub days_count: usize,
    pub month_last_extremum: Option<ExtremaSignal>,
}
