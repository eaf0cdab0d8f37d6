//! Flow normalization against market value.

use serde::Serialize;

use crate::snapshot::SnapshotRow;

/// `num / den`, or zero when the denominator is not strictly positive or the
/// result is not finite.
#[inline]
fn guarded_ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        let ratio = num / den;
        if ratio.is_finite() {
            return ratio;
        }
    }
    0.0
}

/// Financing and foreign flows relative to float and total market value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlowMetrics {
    /// Net financing buy over float market value, as a fraction.
    pub financing_surge_pct: f64,
    /// Net financing buy, percent of float market value.
    pub fin_mv_pct: f64,
    /// Foreign inflow, percent of float market value.
    pub nb_mv_pct: f64,
    /// Net financing buy, percent of total market value.
    pub fin_tmv_pct: f64,
    /// Foreign inflow, percent of total market value.
    pub nb_tmv_pct: f64,
    /// `financing_surge_pct` scaled for display.
    pub surge_score: f64,
}

impl FlowMetrics {
    /// Compute from raw flows.
    pub fn from_flows(
        net_financing_buy: f64,
        foreign_inflow: f64,
        float_mv: f64,
        total_mv: f64,
        surge_scale: f64,
    ) -> Self {
        let financing_surge_pct = guarded_ratio(net_financing_buy, float_mv);
        Self {
            financing_surge_pct,
            fin_mv_pct: guarded_ratio(net_financing_buy, float_mv) * 100.0,
            nb_mv_pct: guarded_ratio(foreign_inflow, float_mv) * 100.0,
            fin_tmv_pct: guarded_ratio(net_financing_buy, total_mv) * 100.0,
            nb_tmv_pct: guarded_ratio(foreign_inflow, total_mv) * 100.0,
            surge_score: financing_surge_pct * surge_scale,
        }
    }

    /// Compute for a snapshot row.
    pub fn compute(row: &SnapshotRow, float_mv: f64, total_mv: f64, surge_scale: f64) -> Self {
        Self::from_flows(
            row.net_financing_buy(),
            row.foreign_inflow(),
            float_mv,
            total_mv,
            surge_scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_surge_score() {
        let m = FlowMetrics::from_flows(5e6, 1e6, 1e10, 2e10, 1000.0);
        assert_relative_eq!(m.financing_surge_pct, 5e-4, epsilon = 1e-15);
        assert_relative_eq!(m.surge_score, 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.fin_mv_pct, 0.05, epsilon = 1e-12);
        assert_relative_eq!(m.nb_mv_pct, 0.01, epsilon = 1e-12);
        assert_relative_eq!(m.fin_tmv_pct, 0.025, epsilon = 1e-12);
        assert_relative_eq!(m.nb_tmv_pct, 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_float_mv_zeroes_float_ratios() {
        for float_mv in [0.0, -1.0, f64::NAN] {
            let m = FlowMetrics::from_flows(5e6, 1e6, float_mv, 2e10, 1000.0);
            assert_eq!(m.financing_surge_pct, 0.0);
            assert_eq!(m.fin_mv_pct, 0.0);
            assert_eq!(m.nb_mv_pct, 0.0);
            assert_eq!(m.surge_score, 0.0);
            assert!(m.fin_tmv_pct > 0.0);
        }
    }

    #[test]
    fn test_denominators_guarded_independently() {
        let m = FlowMetrics::from_flows(5e6, 1e6, 1e10, 0.0, 1000.0);
        assert!(m.fin_mv_pct > 0.0);
        assert_eq!(m.fin_tmv_pct, 0.0);
        assert_eq!(m.nb_tmv_pct, 0.0);
    }

    #[test]
    fn test_never_non_finite() {
        let m = FlowMetrics::from_flows(f64::INFINITY, f64::NAN, 1e10, 1e10, 1000.0);
        assert_eq!(m, FlowMetrics::default());
    }
}
