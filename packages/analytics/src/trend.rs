//! Yearly danger series and trend statistics.

use std::collections::BTreeMap;

use junction_danger_analytics_models::YearlyDangerMetric;

/// Number of years in the trailing rolling mean.
pub const ROLLING_WINDOW: usize = 3;

/// Every year from `min` to `max` present in any of the yearly maps.
///
/// Years inside the span without data are included; the span is empty when
/// no map has any year.
#[must_use]
pub fn year_span<'a>(yearly: impl IntoIterator<Item = &'a BTreeMap<i32, f64>>) -> Vec<i32> {
    let (min, max) = yearly
        .into_iter()
        .flat_map(BTreeMap::keys)
        .fold((None, None), |(min, max): (Option<i32>, Option<i32>), year| {
            (
                Some(min.map_or(*year, |m| m.min(*year))),
                Some(max.map_or(*year, |m| m.max(*year))),
            )
        });

    match (min, max) {
        (Some(min), Some(max)) => (min..=max).collect(),
        _ => Vec::new(),
    }
}

/// Builds one cluster's series over `years`, filling missing years with 0.
#[must_use]
pub fn yearly_series(yearly: &BTreeMap<i32, f64>, years: &[i32]) -> Vec<YearlyDangerMetric> {
    let values: Vec<f64> = years
        .iter()
        .map(|year| yearly.get(year).copied().unwrap_or(0.0))
        .collect();
    let means = rolling_mean(&values, ROLLING_WINDOW);

    years
        .iter()
        .zip(values)
        .zip(means)
        .map(|((year, danger_metric), rolling_mean)| YearlyDangerMetric {
            year: *year,
            danger_metric,
            rolling_mean,
        })
        .collect()
}

/// Trailing mean over `window` values; `None` until `window` values have
/// been seen.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            (i + 1 >= window)
                .then(|| values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Least-squares slope of the danger metric against year.
///
/// Positive means worsening, negative improving. `None` with fewer than two
/// points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trajectory_slope(series: &[YearlyDangerMetric]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }

    let n = series.len() as f64;
    let mean_x = series.iter().map(|p| f64::from(p.year)).sum::<f64>() / n;
    let mean_y = series.iter().map(|p| p.danger_metric).sum::<f64>() / n;

    let (covariance, variance) = series.iter().fold((0.0, 0.0), |(cov, var), p| {
        let dx = f64::from(p.year) - mean_x;
        (dx.mul_add(p.danger_metric - mean_y, cov), dx.mul_add(dx, var))
    });

    if variance <= 0.0 {
        return None;
    }
    Some(covariance / variance)
}
