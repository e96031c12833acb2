//! Time series container, windowing and time-based rolling aggregates.

use crate::model::{AnalysisError, ParserError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PRICE: &str = "price";
pub const COUNT: &str = "count";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub count: u64,
}

/// Samples ordered by strictly ascending timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(samples: Vec<Sample>) -> Result<Self, ParserError> {
        if let Some(pos) = samples
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(ParserError::Unordered(pos + 1));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.price).collect()
    }

    /// Groups samples into epoch-aligned buckets of `bucket` width.
    ///
    /// Each non-empty bucket yields one sample stamped with the bucket start,
    /// carrying the mean price and the summed count. Empty buckets are skipped.
    pub fn resample(&self, bucket: Duration) -> TimeSeries {
        let width = bucket.num_seconds().max(1);
        let mut out: Vec<Sample> = Vec::new();
        let mut current: Option<(i64, f64, u64, usize)> = None;

        for sample in &self.samples {
            let start = sample.timestamp.timestamp().div_euclid(width) * width;
            match current.as_mut() {
                Some((key, sum, count, n)) if *key == start => {
                    *sum += sample.price;
                    *count += sample.count;
                    *n += 1;
                }
                _ => {
                    if let Some(done) = current.take() {
                        out.push(bucket_sample(done));
                    }
                    current = Some((start, sample.price, sample.count, 1));
                }
            }
        }
        if let Some(done) = current {
            out.push(bucket_sample(done));
        }

        TimeSeries { samples: out }
    }

    /// Keeps the samples not older than `days` before `now`.
    pub fn crop(&self, days: i64, now: DateTime<Utc>) -> TimeSeries {
        let border = now - Duration::days(days);
        let start = self.samples.partition_point(|s| s.timestamp < border);
        TimeSeries {
            samples: self.samples[start..].to_vec(),
        }
    }
}

fn bucket_sample((start, sum, count, n): (i64, f64, u64, usize)) -> Sample {
    Sample {
        timestamp: Utc.timestamp_opt(start, 0).single().unwrap_or_default(),
        price: sum / n as f64,
        count,
    }
}

/// A window's samples together with the per-point columns derived from them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Frame {
    pub series: TimeSeries,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl Frame {
    pub fn new(series: TimeSeries) -> Self {
        Self {
            series,
            columns: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>, AnalysisError> {
        match name {
            PRICE => Ok(self.series.prices()),
            COUNT => Ok(self.series.samples().iter().map(|s| s.count as f64).collect()),
            other => self
                .columns
                .get(other)
                .cloned()
                .ok_or_else(|| AnalysisError::MissingColumn(other.to_string())),
        }
    }

    pub fn insert_column(&mut self, name: String, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len());
        self.columns.insert(name, values);
    }

    /// Adds `{column}_mean_{hours}h`, a trailing time-window mean.
    pub fn add_rolling_mean(&mut self, column: &str, hours: i64) -> Result<String, AnalysisError> {
        let values = self.column(column)?;
        let label = format!("{column}_mean_{hours}h");
        let rolled = rolling(&self.series.timestamps(), &values, Duration::hours(hours), mean);
        self.insert_column(label.clone(), rolled);
        Ok(label)
    }
}

/// Applies `aggregate` to every trailing window `(t_i - window, t_i]`.
pub fn rolling(
    timestamps: &[DateTime<Utc>],
    values: &[f64],
    window: Duration,
    aggregate: fn(&[f64]) -> f64,
) -> Vec<f64> {
    let mut start = 0;
    let mut out = Vec::with_capacity(values.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let border = *ts - window;
        while start < i && timestamps[start] <= border {
            start += 1;
        }
        out.push(aggregate(&values[start..=i]));
    }
    out
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; `NaN` for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 3, day, hour, 0, 0).unwrap()
    }

    pub(crate) fn sample(ts: DateTime<Utc>, price: f64) -> Sample {
        Sample {
            timestamp: ts,
            price,
            count: 1,
        }
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let result = TimeSeries::new(vec![sample(at(1, 1), 1.0), sample(at(1, 1), 2.0)]);
        assert!(matches!(result, Err(ParserError::Unordered(1))));
    }

    #[test]
    fn resample_averages_each_day() {
        let series = TimeSeries::new(vec![
            sample(at(1, 3), 10.0),
            sample(at(1, 15), 20.0),
            sample(at(2, 8), 30.0),
        ])
        .unwrap();

        let daily = series.resample(Duration::days(1));

        assert_eq!(daily.len(), 2);
        assert_eq!(daily.samples()[0].timestamp, at(1, 0));
        assert_eq!(daily.samples()[0].price, 15.0);
        assert_eq!(daily.samples()[0].count, 2);
        assert_eq!(daily.samples()[1].timestamp, at(2, 0));
        assert_eq!(daily.samples()[1].price, 30.0);
        // the input is left alone
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn resample_skips_empty_buckets() {
        let series =
            TimeSeries::new(vec![sample(at(1, 0), 1.0), sample(at(4, 0), 4.0)]).unwrap();
        let daily = series.resample(Duration::days(1));
        assert_eq!(daily.prices(), vec![1.0, 4.0]);
    }

    #[test]
    fn crop_keeps_samples_from_cutoff_on() {
        let series = TimeSeries::new(
            (1..=20).map(|d| sample(at(d, 12), d as f64)).collect(),
        )
        .unwrap();
        let now = at(20, 12);

        let week = series.crop(7, now);

        assert_eq!(week.samples()[0].timestamp, at(13, 12));
        assert_eq!(week.len(), 8);
        assert!(week.samples().iter().all(|s| s.timestamp >= now - Duration::days(7)));
    }

    #[test]
    fn rolling_mean_uses_trailing_time_window() {
        let ts = vec![at(1, 0), at(1, 1), at(1, 2), at(1, 6)];
        let values = vec![1.0, 2.0, 3.0, 10.0];
        let rolled = rolling(&ts, &values, Duration::hours(4), mean);
        assert_eq!(rolled, vec![1.0, 1.5, 2.0, 10.0]);
    }

    #[test]
    fn empty_window_keeps_only_the_current_point() {
        let ts = vec![at(1, 0), at(1, 1), at(1, 2)];
        let values = vec![1.0, 2.0, 3.0];
        assert_eq!(rolling(&ts, &values, Duration::zero(), mean), values);
        assert_eq!(rolling(&ts, &values, Duration::hours(-2), mean), values);
    }

    #[test]
    fn std_dev_needs_two_values() {
        assert!(std_dev(&[1.0]).is_nan());
        assert!((std_dev(&[2.0, 4.0]) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn frame_reports_missing_columns() {
        let frame = Frame::new(TimeSeries::default());
        assert_eq!(
            frame.column("price_mean_4h"),
            Err(AnalysisError::MissingColumn("price_mean_4h".into()))
        );
    }
}
