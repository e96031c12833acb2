use super::deviation::analyze_deviation;
use super::extrema::{analyze_extrema, detector_by_name, Extrema, ExtremaDetector};
use super::history::History;
use super::series::{Frame, PRICE};
use super::stats::{Metric, Shortcuts, StatisticsBag, Window};
use super::trend::analyze_trend;
use crate::config::AnalysisConfig;
use crate::model::{AnalysisError, TrendSignal};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

type Recipe = (Frame, BTreeMap<String, Metric>, TrendSignal);

/// Runs the per-window recipes over a history.
pub struct AnalysisEngine {
    config: AnalysisConfig,
    detector: Box<dyn ExtremaDetector>,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let windows = [
            ("trend_mean_hours", config.trend_mean_hours),
            ("extrema_mean_hours", config.extrema_mean_hours),
            ("deviation_hours", config.deviation_hours),
            ("week_days", config.week_days),
            ("month_days", config.month_days),
        ];
        if let Some((name, value)) = windows.into_iter().find(|(_, value)| *value <= 0) {
            return Err(AnalysisError::InvalidWindow {
                name: name.to_string(),
                value,
            });
        }

        let detector = detector_by_name(&config.extrema_method, config.extrema_order)?;
        Ok(Self { config, detector })
    }

    pub fn analyze(&self, history: &mut History) -> Result<Shortcuts, AnalysisError> {
        self.analyze_at(history, Utc::now())
    }

    /// Derives the daily, weekly and monthly windows from the original series
    /// as of `now`, analyses each of them and, only if all of them succeed,
    /// replaces the frames, statistics and shortcuts stored on `history`.
    pub fn analyze_at(
        &self,
        history: &mut History,
        now: DateTime<Utc>,
    ) -> Result<Shortcuts, AnalysisError> {
        let original = &history.original;
        let daily = Frame::new(original.resample(Duration::days(1)));
        let week = Frame::new(original.crop(self.config.week_days, now));
        let month = Frame::new(original.crop(self.config.month_days, now));
        debug!(
            "Analyzing windows: daily={} week={} month={} rows",
            daily.len(),
            week.len(),
            month.len()
        );

        let (daily, daily_stats, daily_trend) = self.trend_recipe(daily)?;
        let (month, month_stats, month_trend, extrema) = self.month_recipe(month)?;
        let (week, week_stats, week_trend) = self.trend_recipe(week)?;

        let month_last_extremum = match extrema.last_side() {
            Ok(side) => Some(side),
            Err(e) => {
                debug!("No last extremum for month window: {}", e);
                None
            }
        };

        let shortcuts = Shortcuts {
            daily_trend,
            week_trend,
            month_trend,
            days_count: daily.len(),
            month_last_extremum,
        };

        let mut statistics = StatisticsBag::new();
        statistics.insert(Window::Daily, daily_stats);
        statistics.insert(Window::Weekly, week_stats);
        statistics.insert(Window::Monthly, month_stats);

        let mut frames = BTreeMap::new();
        frames.insert(Window::Original, Frame::new(history.original.clone()));
        frames.insert(Window::Daily, daily);
        frames.insert(Window::Weekly, week);
        frames.insert(Window::Monthly, month);

        history.frames = frames;
        history.statistics = statistics;
        history.shortcuts = Some(shortcuts);
        Ok(shortcuts)
    }

    /// Trailing mean of the price, then the trend of that mean.
    fn trend_recipe(&self, mut frame: Frame) -> Result<Recipe, AnalysisError> {
        let mut stats = BTreeMap::new();
        let mean = frame.add_rolling_mean(PRICE, self.config.trend_mean_hours)?;
        let trend = analyze_trend(&mut frame, &mean, &mut stats)?;
        Ok((frame, stats, trend))
    }

    fn month_recipe(
        &self,
        frame: Frame,
    ) -> Result<(Frame, BTreeMap<String, Metric>, TrendSignal, Extrema), AnalysisError> {
        let (mut frame, mut stats, trend) = self.trend_recipe(frame)?;

        let short_mean = frame.add_rolling_mean(PRICE, self.config.extrema_mean_hours)?;
        let extrema = analyze_extrema(&frame, &short_mean, self.detector.as_ref(), &mut stats)?;

        analyze_deviation(&mut frame, PRICE, self.config.deviation_hours, &mut stats)?;

        Ok((frame, stats, trend, extrema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::series::{Sample, TimeSeries};
    use crate::model::ExtremaSignal;
    use chrono::TimeZone;
    use std::f64::consts::PI;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 3, 31, 0, 0, 0).unwrap()
    }

    /// Hourly samples over the last `days`, priced by `f(hour_index)`.
    fn hourly(days: i64, f: impl Fn(usize) -> f64) -> TimeSeries {
        let start = now() - Duration::days(days);
        let samples = (0..(days * 24) as usize)
            .map(|i| Sample {
                timestamp: start + Duration::hours(i as i64),
                price: f(i),
                count: 3,
            })
            .collect();
        TimeSeries::new(samples).unwrap()
    }

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn rising_prices_trend_up_everywhere() {
        let mut history = History::new(hourly(40, |i| 1.0 + i as f64 * 0.01));

        let shortcuts = engine().analyze_at(&mut history, now()).unwrap();

        assert_eq!(shortcuts.daily_trend, TrendSignal::Up);
        assert_eq!(shortcuts.week_trend, TrendSignal::Up);
        assert_eq!(shortcuts.month_trend, TrendSignal::Up);
        assert_eq!(shortcuts.days_count, 40);
        assert_eq!(
            history.statistics[&Window::Daily]["price_mean_168h_trend"],
            Metric::Trend(TrendSignal::Up)
        );
    }

    #[test]
    fn month_window_carries_extrema_and_deviation() {
        let mut history = History::new(hourly(35, |i| 10.0 + (2.0 * PI * i as f64 / 250.0).sin()));

        let shortcuts = engine().analyze_at(&mut history, now()).unwrap();

        let month = &history.statistics[&Window::Monthly];
        assert!(month.contains_key("price_mean_168h_trend"));
        assert!(month.contains_key("price_std_24h"));
        let Metric::Extrema(extrema) = &month["price_mean_4h_argrelextrema_extrema"] else {
            panic!("extrema metric missing");
        };
        assert!(!extrema.minima.is_empty());
        assert!(!extrema.maxima.is_empty());
        assert!(matches!(
            shortcuts.month_last_extremum,
            Some(ExtremaSignal::Min | ExtremaSignal::Max)
        ));
        assert!(history.frames[&Window::Monthly].columns.contains_key("price_mean_4h"));
        assert_eq!(history.frames[&Window::Monthly].len(), 31 * 24);
        assert_eq!(history.frames[&Window::Weekly].len(), 7 * 24);
    }

    #[test]
    fn analysis_is_idempotent() {
        let mut history = History::new(hourly(33, |i| 5.0 + ((i * 7) % 13) as f64));
        let engine = engine();

        engine.analyze_at(&mut history, now()).unwrap();
        let first = history.statistics_json().unwrap();
        engine.analyze_at(&mut history, now()).unwrap();
        let second = history.statistics_json().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn failure_keeps_previous_statistics() {
        let mut history = History::new(hourly(33, |i| i as f64));
        let engine = engine();
        engine.analyze_at(&mut history, now()).unwrap();
        let before = history.statistics_json().unwrap();

        // a year later the weekly and monthly windows are empty
        let later = now() + Duration::days(365);
        let result = engine.analyze_at(&mut history, later);

        assert!(matches!(result, Err(AnalysisError::TooFewPoints { .. })));
        assert_eq!(history.statistics_json().unwrap(), before);
    }

    #[test]
    fn short_history_is_rejected() {
        let mut history = History::new(hourly(1, |i| i as f64));
        let result = engine().analyze_at(&mut history, now());
        assert!(matches!(result, Err(AnalysisError::TooFewPoints { .. })));
        assert!(history.shortcuts.is_none());
    }

    #[test]
    fn non_positive_windows_fail_construction() {
        let zero_mean = AnalysisConfig {
            trend_mean_hours: 0,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            AnalysisEngine::new(zero_mean).err(),
            Some(AnalysisError::InvalidWindow {
                name: "trend_mean_hours".into(),
                value: 0,
            })
        );

        let negative_deviation = AnalysisConfig {
            deviation_hours: -24,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            AnalysisEngine::new(negative_deviation),
            Err(AnalysisError::InvalidWindow { value: -24, .. })
        ));

        let no_month = AnalysisConfig {
            month_days: 0,
            ..AnalysisConfig::default()
        };
        assert!(AnalysisEngine::new(no_month).is_err());
    }

    #[test]
    fn unknown_extrema_method_fails_construction() {
        let config = AnalysisConfig {
            extrema_method: "cwt".into(),
            ..AnalysisConfig::default()
        };
        assert!(AnalysisEngine::new(config).is_err());
    }
}
