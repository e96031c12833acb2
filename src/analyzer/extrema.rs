//! Local minima/maxima detection with interchangeable methods.

use super::series::Frame;
use super::stats::Metric;
use super::trend::MIN_POINTS;
use crate::model::{AnalysisError, ExtremaSignal};
use serde::Serialize;
use std::collections::BTreeMap;

/// A way of locating extrema in a numeric column.
///
/// Implementations return ordered index lists `(minima, maxima)`.
pub trait ExtremaDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, y: &[f64]) -> (Vec<usize>, Vec<usize>);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extrema {
    pub minima: Vec<Extremum>,
    pub maxima: Vec<Extremum>,
}

impl Extrema {
    /// `Max` when the last maximum comes after the last minimum, `Min` when
    /// before.
    pub fn last_side(&self) -> Result<ExtremaSignal, AnalysisError> {
        let (Some(min), Some(max)) = (self.minima.last(), self.maxima.last()) else {
            return Err(AnalysisError::EmptyExtrema);
        };
        Ok(match max.index.cmp(&min.index) {
            std::cmp::Ordering::Greater => ExtremaSignal::Max,
            std::cmp::Ordering::Less => ExtremaSignal::Min,
            std::cmp::Ordering::Equal => ExtremaSignal::None,
        })
    }
}

/// Strict local extrema by order: a point must beat every neighbour within
/// `order` positions on both sides. The first and last point never qualify.
#[derive(Debug, Clone)]
pub struct ArgRelExtrema {
    pub order: usize,
}

impl Default for ArgRelExtrema {
    fn default() -> Self {
        Self { order: 3 }
    }
}

impl ArgRelExtrema {
    fn select(&self, y: &[f64], better: fn(f64, f64) -> bool) -> Vec<usize> {
        let n = y.len();
        if n < 3 {
            return Vec::new();
        }
        (1..n - 1)
            .filter(|&i| {
                (1..=self.order.max(1)).all(|shift| {
                    let left = i.saturating_sub(shift);
                    let right = (i + shift).min(n - 1);
                    better(y[i], y[left]) && better(y[i], y[right])
                })
            })
            .collect()
    }
}

impl ExtremaDetector for ArgRelExtrema {
    fn name(&self) -> &'static str {
        "argrelextrema"
    }

    fn detect(&self, y: &[f64]) -> (Vec<usize>, Vec<usize>) {
        (
            self.select(y, |a, b| a < b),
            self.select(y, |a, b| a > b),
        )
    }
}

/// Peak picking with a height threshold (fraction of the value range) and a
/// minimum distance between peaks; higher peaks win.
#[derive(Debug, Clone)]
pub struct ThresholdPeaks {
    pub threshold: f64,
    pub min_distance: usize,
}

impl Default for ThresholdPeaks {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            min_distance: 4,
        }
    }
}

impl ThresholdPeaks {
    fn peaks(&self, y: &[f64]) -> Vec<usize> {
        let n = y.len();
        if n < 3 {
            return Vec::new();
        }
        let lo = y.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if hi <= lo {
            return Vec::new();
        }
        let floor = self.threshold * (hi - lo) + lo;

        let mut peaks: Vec<usize> = (1..n - 1)
            .filter(|&i| y[i] - y[i - 1] > 0.0 && y[i + 1] - y[i] < 0.0 && y[i] > floor)
            .collect();

        if peaks.len() > 1 && self.min_distance > 1 {
            let mut by_height = peaks.clone();
            by_height.sort_by(|&a, &b| y[b].total_cmp(&y[a]));
            let mut keep = vec![false; n];
            for &p in &peaks {
                keep[p] = true;
            }
            for p in by_height {
                if !keep[p] {
                    continue;
                }
                let from = p.saturating_sub(self.min_distance);
                let to = (p + self.min_distance + 1).min(n);
                keep[from..to].iter_mut().for_each(|k| *k = false);
                keep[p] = true;
            }
            peaks = (0..n).filter(|&i| keep[i]).collect();
        }
        peaks
    }
}

impl ExtremaDetector for ThresholdPeaks {
    fn name(&self) -> &'static str {
        "peakutils"
    }

    fn detect(&self, y: &[f64]) -> (Vec<usize>, Vec<usize>) {
        let negated: Vec<f64> = y.iter().map(|v| -v).collect();
        (self.peaks(&negated), self.peaks(y))
    }
}

/// Lookahead-and-delta peak picking: a running max (min) is confirmed once the
/// signal has dropped (risen) by `delta` and stays there for `lookahead`
/// points.
#[derive(Debug, Clone)]
pub struct LookaheadPeaks {
    pub lookahead: usize,
    pub delta: f64,
}

impl Default for LookaheadPeaks {
    fn default() -> Self {
        Self {
            lookahead: 2,
            delta: 2.0,
        }
    }
}

impl ExtremaDetector for LookaheadPeaks {
    fn name(&self) -> &'static str {
        "peakdetect"
    }

    fn detect(&self, y: &[f64]) -> (Vec<usize>, Vec<usize>) {
        let n = y.len();
        let lookahead = self.lookahead.max(1);
        let mut minima = Vec::new();
        let mut maxima = Vec::new();
        let mut first_is_max = None;

        let (mut mn, mut mx) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut mn_pos, mut mx_pos) = (0, 0);

        for index in 0..n.saturating_sub(lookahead) {
            let v = y[index];
            if v > mx {
                mx = v;
                mx_pos = index;
            }
            if v < mn {
                mn = v;
                mn_pos = index;
            }
            let ahead = &y[index..index + lookahead];

            if v < mx - self.delta && mx != f64::INFINITY {
                if ahead.iter().copied().fold(f64::NEG_INFINITY, f64::max) < mx {
                    maxima.push(mx_pos);
                    first_is_max.get_or_insert(true);
                    mx = f64::INFINITY;
                    mn = f64::INFINITY;
                    continue;
                }
            }
            if v > mn + self.delta && mn != f64::NEG_INFINITY {
                if ahead.iter().copied().fold(f64::INFINITY, f64::min) > mn {
                    minima.push(mn_pos);
                    first_is_max.get_or_insert(false);
                    mn = f64::NEG_INFINITY;
                    mx = f64::NEG_INFINITY;
                }
            }
        }

        // the first confirmed peak is measured from the series start, not a turn
        match first_is_max {
            Some(true) => {
                maxima.remove(0);
            }
            Some(false) => {
                minima.remove(0);
            }
            None => {}
        }
        (minima, maxima)
    }
}

/// Resolves a detector by its method name.
pub fn detector_by_name(
    name: &str,
    order: usize,
) -> Result<Box<dyn ExtremaDetector>, AnalysisError> {
    match name {
        "argrelextrema" => Ok(Box::new(ArgRelExtrema { order })),
        "peakutils" => Ok(Box::new(ThresholdPeaks::default())),
        "peakdetect" => Ok(Box::new(LookaheadPeaks::default())),
        other => Err(AnalysisError::UnknownMethod(other.to_string())),
    }
}

pub fn find_extrema(
    detector: &dyn ExtremaDetector,
    column: &str,
    y: &[f64],
) -> Result<Extrema, AnalysisError> {
    if y.len() < MIN_POINTS {
        return Err(AnalysisError::TooFewPoints {
            column: column.to_string(),
            needed: MIN_POINTS,
            got: y.len(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite(column.to_string()));
    }

    let (minima, maxima) = detector.detect(y);
    let pick = |indexes: Vec<usize>| {
        indexes
            .into_iter()
            .map(|index| Extremum { index, value: y[index] })
            .collect()
    };
    Ok(Extrema {
        minima: pick(minima),
        maxima: pick(maxima),
    })
}

/// Stores the extrema of `column` under `{column}_{method}_extrema`.
pub fn analyze_extrema(
    frame: &Frame,
    column: &str,
    detector: &dyn ExtremaDetector,
    stats: &mut BTreeMap<String, Metric>,
) -> Result<Extrema, AnalysisError> {
    let extrema = find_extrema(detector, column, &frame.column(column)?)?;
    let label = format!("{column}_{}_extrema", detector.name());
    stats.insert(label, Metric::Extrema(extrema.clone()));
    Ok(extrema)
}
