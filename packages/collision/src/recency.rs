//! Recency weighting.
//!
//! Older collisions are down-weighted with `log10(year - min_year + C)`.
//! `C` must exceed 1 so the oldest year still carries a strictly positive
//! weight.

/// Default recency constant `C`.
pub const DEFAULT_RECENCY_CONSTANT: f64 = 2.0;

/// Recency weight for a collision in `year`, relative to the oldest year in
/// the dataset.
///
/// Monotonically non-decreasing in `year` for a fixed `min_year`.
#[must_use]
pub fn recency_weight(year: i32, min_year: i32, constant: f64) -> f64 {
    (f64::from(year - min_year) + constant).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_year_is_log_of_constant() {
        let w = recency_weight(2015, 2015, DEFAULT_RECENCY_CONSTANT);
        assert!((w - 2.0f64.log10()).abs() < 1e-12);
        assert!(w > 0.0);
    }

    #[test]
    fn weight_is_monotonic_in_year() {
        for constant in [1.5, 2.0, 5.0, 6.0] {
            let weights: Vec<f64> = (2010..=2024)
                .map(|year| recency_weight(year, 2010, constant))
                .collect();
            assert!(weights.windows(2).all(|w| w[1] >= w[0]));
            assert!(weights.iter().all(|w| *w > 0.0));
        }
    }

    #[test]
    fn larger_constant_flattens_the_curve() {
        let steep = recency_weight(2020, 2010, 2.0) / recency_weight(2010, 2010, 2.0);
        let flat = recency_weight(2020, 2010, 6.0) / recency_weight(2010, 2010, 6.0);
        assert!(flat < steep);
    }
}
