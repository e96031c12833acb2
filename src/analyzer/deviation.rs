use super::series::{rolling, std_dev, Frame};
use super::stats::Metric;
use crate::model::AnalysisError;
use chrono::Duration;
use std::collections::BTreeMap;

/// Rolling standard deviation of `column` over the trailing `hours`.
///
/// Adds the `{column}_std_{hours}h` column and stores its mean (over the points
/// where it is defined) as a volatility figure under the same name.
pub fn analyze_deviation(
    frame: &mut Frame,
    column: &str,
    hours: i64,
    stats: &mut BTreeMap<String, Metric>,
) -> Result<f64, AnalysisError> {
    let values = frame.column(column)?;
    let label = format!("{column}_std_{hours}h");
    let rolled = rolling(
        &frame.series.timestamps(),
        &values,
        Duration::hours(hours),
        std_dev,
    );

    let defined: Vec<f64> = rolled.iter().copied().filter(|v| v.is_finite()).collect();
    let volatility = if defined.is_empty() {
        f64::NAN
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    };

    frame.insert_column(label.clone(), rolled);
    stats.insert(label, Metric::Scalar(volatility));
    Ok(volatility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::series::tests::{at, sample};
    use crate::analyzer::series::TimeSeries;

    #[test]
    fn rolls_over_elapsed_time_not_sample_count() {
        let series = TimeSeries::new(vec![
            sample(at(1, 0), 10.0),
            sample(at(1, 1), 12.0),
            sample(at(3, 0), 100.0),
            sample(at(3, 2), 104.0),
        ])
        .unwrap();
        let mut frame = Frame::new(series);
        let mut stats = BTreeMap::new();

        let volatility = analyze_deviation(&mut frame, "price", 24, &mut stats).unwrap();

        let column = &frame.columns["price_std_24h"];
        assert!(column[0].is_nan());
        assert!((column[1] - 2f64.sqrt()).abs() < 1e-12);
        assert!(column[2].is_nan());
        assert!((column[3] - 8f64.sqrt()).abs() < 1e-12);
        assert!((volatility - (2f64.sqrt() + 8f64.sqrt()) / 2.0).abs() < 1e-12);
        assert!(matches!(stats["price_std_24h"], Metric::Scalar(v) if v == volatility));
    }
}
