//! Derivative-area trend classification.
//!
//! The column is read as a piecewise-linear function of the sample index. Its
//! derivative is split into positive and negative parts, and the direction is
//! decided by which part covers the larger area over the whole window.

use super::series::Frame;
use super::stats::Metric;
use crate::model::{AnalysisError, TrendSignal};
use std::collections::BTreeMap;

pub const MIN_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub dfdx: Vec<f64>,
    pub dfdx_pos: Vec<f64>,
    pub dfdx_neg: Vec<f64>,
    pub area_pos: f64,
    pub area_neg: f64,
    pub signal: TrendSignal,
    /// `|area_pos - area_neg|`
    pub magnitude: f64,
}

pub fn classify(column: &str, y: &[f64]) -> Result<Trend, AnalysisError> {
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

    let dfdx = derivative(y);
    let dfdx_pos: Vec<f64> = dfdx.iter().map(|&d| if d > 0.0 { d } else { 0.0 }).collect();
    let dfdx_neg: Vec<f64> = dfdx.iter().map(|&d| if d < 0.0 { -d } else { 0.0 }).collect();
    let area_pos = area(&dfdx_pos);
    let area_neg = area(&dfdx_neg);

    let signal = if area_pos > area_neg {
        TrendSignal::Up
    } else if area_pos < area_neg {
        TrendSignal::Down
    } else {
        TrendSignal::None
    };

    Ok(Trend {
        dfdx,
        dfdx_pos,
        dfdx_neg,
        area_pos,
        area_neg,
        signal,
        magnitude: (area_pos - area_neg).abs(),
    })
}

/// Central difference at every knot. On a piecewise-linear interpolant this is
/// the mean of the two adjacent slopes. The end points copy their neighbour.
fn derivative(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let mut d = vec![0.0; n];
    for i in 1..n - 1 {
        d[i] = (y[i + 1] - y[i - 1]) / 2.0;
    }
    d[0] = d[1];
    d[n - 1] = d[n - 2];
    d
}

/// Exact integral of the linear interpolant over `[0, n-1]`.
fn area(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[0] + w[1]) / 2.0).sum()
}

/// Runs the classification on `column` of `frame`, storing the per-point
/// derivative columns on the frame and the scalar results in `stats`.
pub fn analyze_trend(
    frame: &mut Frame,
    column: &str,
    stats: &mut BTreeMap<String, Metric>,
) -> Result<TrendSignal, AnalysisError> {
    let trend = classify(column, &frame.column(column)?)?;

    frame.insert_column(format!("{column}_dfdx"), trend.dfdx);
    frame.insert_column(format!("{column}_dfdx_pos"), trend.dfdx_pos);
    frame.insert_column(format!("{column}_dfdx_neg"), trend.dfdx_neg);

    stats.insert(format!("{column}_s_dfdx_pos"), Metric::Scalar(trend.area_pos));
    stats.insert(format!("{column}_s_dfdx_neg"), Metric::Scalar(trend.area_neg));
    stats.insert(format!("{column}_s_dfdx_diff"), Metric::Scalar(trend.magnitude));
    stats.insert(format!("{column}_trend"), Metric::Trend(trend.signal));

    Ok(trend.signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_series_is_up() {
        let trend = classify("price", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(trend.signal, TrendSignal::Up);
        assert!((trend.area_pos - 6.0).abs() < 1e-12);
        assert_eq!(trend.area_neg, 0.0);
    }

    #[test]
    fn decreasing_series_is_down() {
        let trend = classify("price", &[7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
        assert_eq!(trend.signal, TrendSignal::Down);
        assert!((trend.magnitude - 6.0).abs() < 1e-12);
    }

    #[test]
    fn flat_series_has_no_trend() {
        let trend = classify("price", &[4.0; 10]).unwrap();
        assert_eq!(trend.signal, TrendSignal::None);
        assert_eq!(trend.magnitude, 0.0);
        assert!(trend.dfdx.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn end_points_copy_neighbour_derivative() {
        let trend = classify("price", &[0.0, 1.0, 4.0, 9.0]).unwrap();
        assert_eq!(trend.dfdx, vec![2.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn small_oscillations_cancel_out() {
        let y = [5.0, 6.0, 5.0, 6.0, 5.0, 6.0, 5.0, 10.0, 11.0];
        let trend = classify("price", &y).unwrap();
        assert_eq!(trend.signal, TrendSignal::Up);
    }

    #[test]
    fn too_few_points_is_an_error() {
        assert_eq!(
            classify("price", &[1.0, 2.0]),
            Err(AnalysisError::TooFewPoints {
                column: "price".into(),
                needed: 3,
                got: 2
            })
        );
    }

    #[test]
    fn nan_values_are_rejected() {
        assert_eq!(
            classify("price", &[1.0, f64::NAN, 2.0]),
            Err(AnalysisError::NonFinite("price".into()))
        );
    }
}
