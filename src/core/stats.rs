//! Statistics engine: per-SKU descriptive statistics and sigma level
//!
//! Every function here is pure. Missing data never fails: a SKU without
//! enough information for a metric is simply absent from that metric's map.
//! The only error is a measurement that does not parse as a finite number,
//! which aborts the whole computation.
//!
//! Variance is the population variance (divide by n). A SKU with a single
//! observation gets a variance of `0` rather than being omitted, which in
//! turn makes its sigma level undefined.

use std::collections::BTreeMap;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::measurement::MeasurementTable;
use crate::core::metric::{Metric, StatMap};

/// Errors raised by the statistics engine
#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum StatsError {
    #[error("Invalid measurement for SKU '{sku}': '{raw}' is not a number")]
    #[diagnostic(
        code(sigstat::stats::invalid_measurement),
        help("Every measurement cell must hold a finite decimal number")
    )]
    InvalidMeasurement { sku: String, raw: String },
}

/// Lower and upper specification limits keyed by SKU
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecLimits {
    pub lsl: StatMap,
    pub usl: StatMap,
}

impl SpecLimits {
    pub fn new(lsl: StatMap, usl: StatMap) -> Self {
        Self { lsl, usl }
    }

    /// Number of distinct SKUs with at least one limit
    pub fn sku_count(&self) -> usize {
        self.lsl
            .keys()
            .chain(self.usl.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}

/// Count, mean and population variance of one SKU's observations
#[derive(Debug, Clone, Copy, PartialEq)]
struct Moments {
    count: usize,
    mean: f64,
    variance: f64,
}

impl Moments {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        // Identical observations have exactly zero spread; summing squared
        // deviations from a rounded mean would leave a tiny positive residue.
        // Values equal up to float noise (0.1 + 0.2 vs 0.3) count as identical.
        let constant = values.iter().all(|v| *v == values[0]);
        let variance = if values.len() < 2 || constant {
            0.0
        } else {
            let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            if is_float_noise(variance.sqrt(), mean, n) {
                0.0
            } else {
                variance
            }
        };

        Some(Self {
            count: values.len(),
            mean,
            variance,
        })
    }

    fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// A spread no larger than the rounding error of summing `n` values near `mean`
fn is_float_noise(std_dev: f64, mean: f64, n: f64) -> bool {
    std_dev <= n * f64::EPSILON * mean.abs()
}

/// All four statistic maps from a single pass over the table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapabilitySummary {
    pub mean: StatMap,
    pub variance: StatMap,
    pub std_dev: StatMap,
    pub sigma: StatMap,
}

impl CapabilitySummary {
    /// The map that feeds a given table column
    pub fn metric(&self, metric: Metric) -> &StatMap {
        match metric {
            Metric::Mean => &self.mean,
            Metric::Variance => &self.variance,
            Metric::StdDev => &self.std_dev,
            Metric::SigmaLevel => &self.sigma,
        }
    }

    pub fn sku_count(&self) -> usize {
        self.mean.len()
    }
}

/// Group measurement values by SKU, parsing every reading
///
/// Fails on the first value that is not a finite number.
pub fn group_by_sku(
    table: &MeasurementTable,
) -> Result<BTreeMap<String, Vec<f64>>, StatsError> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in table.rows() {
        let value = row
            .value
            .parse()
            .map_err(|raw| StatsError::InvalidMeasurement {
                sku: row.sku.clone(),
                raw,
            })?;
        groups.entry(row.sku.clone()).or_default().push(value);
    }
    Ok(groups)
}

fn moments_by_sku(table: &MeasurementTable) -> Result<BTreeMap<String, Moments>, StatsError> {
    Ok(group_by_sku(table)?
        .into_iter()
        .filter_map(|(sku, values)| Moments::of(&values).map(|m| (sku, m)))
        .collect())
}

/// Arithmetic mean of each SKU's measurements
pub fn compute_mean(table: &MeasurementTable) -> Result<StatMap, StatsError> {
    Ok(moments_by_sku(table)?
        .into_iter()
        .map(|(sku, m)| (sku, m.mean))
        .collect())
}

/// Population variance of each SKU's measurements (0 below two observations)
pub fn compute_variance(table: &MeasurementTable) -> Result<StatMap, StatsError> {
    Ok(moments_by_sku(table)?
        .into_iter()
        .map(|(sku, m)| (sku, m.variance))
        .collect())
}

/// Standard deviation, the square root of [`compute_variance`]'s values
pub fn compute_std_dev(table: &MeasurementTable) -> Result<StatMap, StatsError> {
    Ok(moments_by_sku(table)?
        .into_iter()
        .map(|(sku, m)| (sku, m.std_dev()))
        .collect())
}

/// Sigma level: the smaller of the one-sided capability ratios
///
/// `(usl - mean) / std_dev` and `(mean - lsl) / std_dev`, each only when the
/// limit exists. SKUs with zero spread or without any limit are omitted.
pub fn compute_sigma(
    table: &MeasurementTable,
    lsl: &StatMap,
    usl: &StatMap,
) -> Result<StatMap, StatsError> {
    let moments = moments_by_sku(table)?;
    Ok(sigma_map(&moments, lsl, usl))
}

/// Compute mean, variance, std_dev and sigma together
pub fn summarize(
    table: &MeasurementTable,
    limits: &SpecLimits,
) -> Result<CapabilitySummary, StatsError> {
    let moments = moments_by_sku(table)?;

    let mut summary = CapabilitySummary::default();
    for (sku, m) in &moments {
        summary.mean.insert(sku.clone(), m.mean);
        summary.variance.insert(sku.clone(), m.variance);
        summary.std_dev.insert(sku.clone(), m.std_dev());
    }
    summary.sigma = sigma_map(&moments, &limits.lsl, &limits.usl);

    log::debug!(
        "Summarized {} observations across {} SKUs ({} with a sigma level)",
        moments.values().map(|m| m.count).sum::<usize>(),
        summary.mean.len(),
        summary.sigma.len()
    );
    Ok(summary)
}

fn sigma_map(moments: &BTreeMap<String, Moments>, lsl: &StatMap, usl: &StatMap) -> StatMap {
    let mut sigma = StatMap::new();
    for (sku, m) in moments {
        let lower = lsl.get(sku).copied();
        let upper = usl.get(sku).copied();
        if lower.is_none() && upper.is_none() {
            log::debug!("SKU '{}': no specification limits, sigma level undefined", sku);
            continue;
        }
        match sigma_level(m.mean, m.std_dev(), lower, upper) {
            Some(value) => {
                sigma.insert(sku.clone(), value);
            }
            None => {
                log::debug!("SKU '{}': standard deviation is 0, sigma level undefined", sku);
            }
        }
    }
    sigma
}

/// Sigma level for one SKU, `None` when undefined
pub fn sigma_level(
    mean: f64,
    std_dev: f64,
    lsl: Option<f64>,
    usl: Option<f64>,
) -> Option<f64> {
    if std_dev <= 0.0 || !std_dev.is_finite() || is_float_noise(std_dev, mean, 1.0) {
        return None;
    }

    let upper = usl.map(|u| (u - mean) / std_dev);
    let lower = lsl.map(|l| (mean - l) / std_dev);

    match (upper, lower) {
        (Some(u), Some(l)) => Some(u.min(l)),
        (Some(u), None) => Some(u),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    }
}

/// Shewhart control limits at three standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlLimits {
    pub lcl: f64,
    pub ucl: f64,
}

pub fn control_limits(mean: f64, std_dev: f64) -> ControlLimits {
    ControlLimits {
        lcl: mean - 3.0 * std_dev,
        ucl: mean + 3.0 * std_dev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measurement::MeasurementRow;
    use proptest::prelude::*;

    fn table(rows: &[(&str, f64)]) -> MeasurementTable {
        rows.iter()
            .map(|(sku, v)| MeasurementRow::new(*sku, *v))
            .collect()
    }

    fn limits(lsl: &[(&str, f64)], usl: &[(&str, f64)]) -> SpecLimits {
        let to_map = |pairs: &[(&str, f64)]| -> StatMap {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };
        SpecLimits::new(to_map(lsl), to_map(usl))
    }

    #[test]
    fn test_three_observation_scenario() {
        let t = table(&[("A", 10.0), ("A", 12.0), ("A", 14.0)]);
        let l = limits(&[("A", 5.0)], &[("A", 20.0)]);

        let mean = compute_mean(&t).unwrap();
        let variance = compute_variance(&t).unwrap();
        let std_dev = compute_std_dev(&t).unwrap();
        let sigma = compute_sigma(&t, &l.lsl, &l.usl).unwrap();

        assert!((mean["A"] - 12.0).abs() < 1e-10);
        assert!((variance["A"] - 8.0 / 3.0).abs() < 1e-10);
        assert!((std_dev["A"] - 1.632993).abs() < 1e-6);
        // min((20-12)/1.633, (12-5)/1.633) = min(4.90, 4.29)
        assert!((sigma["A"] - 7.0 / (8.0f64 / 3.0).sqrt()).abs() < 1e-10);
        assert!((sigma["A"] - 4.29).abs() < 0.01);
    }

    #[test]
    fn test_single_observation_scenario() {
        let t = table(&[("B", 5.0)]);
        let l = limits(&[("B", 1.0)], &[("B", 9.0)]);

        let summary = summarize(&t, &l).unwrap();

        assert_eq!(summary.mean["B"], 5.0);
        assert_eq!(summary.variance["B"], 0.0);
        assert_eq!(summary.std_dev["B"], 0.0);
        assert!(!summary.sigma.contains_key("B"));
    }

    #[test]
    fn test_empty_table_gives_empty_maps() {
        let summary = summarize(&MeasurementTable::new(), &SpecLimits::default()).unwrap();
        assert_eq!(summary, CapabilitySummary::default());
    }

    #[test]
    fn test_constant_values_have_exactly_zero_variance() {
        let t = table(&[("C", 0.1), ("C", 0.1), ("C", 0.1)]);
        let variance = compute_variance(&t).unwrap();
        assert_eq!(variance["C"], 0.0);

        let sigma = compute_sigma(&t, &StatMap::new(), &limits(&[], &[("C", 1.0)]).usl).unwrap();
        assert!(sigma.is_empty());
    }

    #[test]
    fn test_values_equal_up_to_float_noise_have_zero_spread() {
        let t = table(&[("A", 0.1 + 0.2), ("A", 0.3)]);
        let l = limits(&[("A", 0.0)], &[("A", 1.0)]);

        let summary = summarize(&t, &l).unwrap();

        assert_eq!(summary.variance["A"], 0.0);
        assert_eq!(summary.std_dev["A"], 0.0);
        assert!(!summary.sigma.contains_key("A"));
        assert_eq!(sigma_level(0.3, 2.8e-17, Some(0.0), Some(1.0)), None);
    }

    #[test]
    fn test_small_real_spread_is_kept() {
        let t = table(&[("A", 0.300), ("A", 0.301)]);
        let summary = summarize(&t, &limits(&[("A", 0.0)], &[("A", 1.0)])).unwrap();

        assert!((summary.std_dev["A"] - 0.0005).abs() < 1e-12);
        assert!(summary.sigma.contains_key("A"));
    }

    #[test]
    fn test_sigma_with_one_sided_limits() {
        let t = table(&[("A", 10.0), ("A", 12.0), ("A", 14.0), ("D", 1.0), ("D", 3.0)]);
        let l = limits(&[("D", 0.0)], &[("A", 20.0)]);

        let sigma = compute_sigma(&t, &l.lsl, &l.usl).unwrap();

        let std_a = (8.0f64 / 3.0).sqrt();
        assert!((sigma["A"] - 8.0 / std_a).abs() < 1e-10);
        // D: mean 2, std 1, lsl 0 -> (2 - 0) / 1
        assert!((sigma["D"] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_limit_is_a_defined_limit() {
        let t = table(&[("Z", -1.0), ("Z", 1.0)]);
        let l = limits(&[("Z", 0.0)], &[]);

        let sigma = compute_sigma(&t, &l.lsl, &l.usl).unwrap();
        assert_eq!(sigma["Z"], 0.0);
    }

    #[test]
    fn test_sigma_omits_sku_without_limits() {
        let t = table(&[("A", 1.0), ("A", 2.0)]);
        let sigma = compute_sigma(&t, &StatMap::new(), &StatMap::new()).unwrap();
        assert!(sigma.is_empty());
    }

    #[test]
    fn test_sigma_ignores_limits_for_unmeasured_skus() {
        let t = table(&[("A", 1.0), ("A", 2.0)]);
        let l = limits(&[("X", 0.0)], &[("X", 10.0)]);
        let sigma = compute_sigma(&t, &l.lsl, &l.usl).unwrap();
        assert!(sigma.is_empty());
    }

    #[test]
    fn test_sigma_can_be_negative_when_mean_is_out_of_spec() {
        let t = table(&[("A", 30.0), ("A", 32.0)]);
        let l = limits(&[("A", 5.0)], &[("A", 20.0)]);
        let sigma = compute_sigma(&t, &l.lsl, &l.usl).unwrap();
        // (20 - 31) / 1
        assert!((sigma["A"] + 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_invalid_measurement_aborts() {
        let mut t = table(&[("A", 1.0)]);
        t.push(MeasurementRow::raw("B", "twelve"));

        let err = compute_mean(&t).unwrap_err();
        assert_eq!(
            err,
            StatsError::InvalidMeasurement {
                sku: "B".to_string(),
                raw: "twelve".to_string()
            }
        );
        assert!(summarize(&t, &SpecLimits::default()).is_err());
    }

    #[test]
    fn test_raw_numeric_values_parse() {
        let t: MeasurementTable = vec![
            MeasurementRow::raw("A", "10"),
            MeasurementRow::raw("A", " 12 "),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_mean(&t).unwrap()["A"], 11.0);
    }

    #[test]
    fn test_summary_metric_selector() {
        let t = table(&[("A", 10.0), ("A", 12.0), ("A", 14.0)]);
        let summary = summarize(&t, &limits(&[("A", 5.0)], &[("A", 20.0)])).unwrap();

        assert_eq!(summary.metric(Metric::Mean), &summary.mean);
        assert_eq!(summary.metric(Metric::SigmaLevel), &summary.sigma);
        assert_eq!(summary.sku_count(), 1);
    }

    #[test]
    fn test_control_limits() {
        let cl = control_limits(12.0, 2.0);
        assert_eq!(cl.lcl, 6.0);
        assert_eq!(cl.ucl, 18.0);
    }

    #[test]
    fn test_spec_limits_sku_count() {
        let l = limits(&[("A", 1.0), ("B", 1.0)], &[("B", 2.0), ("C", 2.0)]);
        assert_eq!(l.sku_count(), 3);
    }

    fn rows_strategy() -> impl Strategy<Value = Vec<(String, f64)>> {
        prop::collection::vec(("[A-E]", -1000.0f64..1000.0), 0..60)
    }

    fn to_table(rows: &[(String, f64)]) -> MeasurementTable {
        rows.iter()
            .map(|(sku, v)| MeasurementRow::new(sku.clone(), *v))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_mean_keys_are_input_skus(rows in rows_strategy()) {
            let t = to_table(&rows);
            let mean = compute_mean(&t).unwrap();
            let skus = t.skus();
            prop_assert_eq!(mean.len(), skus.len());
            for key in mean.keys() {
                prop_assert!(skus.contains(key.as_str()));
            }
        }

        #[test]
        fn prop_variance_is_std_dev_squared(rows in rows_strategy()) {
            let t = to_table(&rows);
            let variance = compute_variance(&t).unwrap();
            let std_dev = compute_std_dev(&t).unwrap();
            prop_assert_eq!(variance.len(), std_dev.len());
            for (sku, var) in &variance {
                let sd = std_dev[sku];
                prop_assert!(sd >= 0.0);
                prop_assert!((var - sd * sd).abs() <= 1e-9 * (1.0 + var.abs()));
            }
        }

        #[test]
        fn prop_sigma_is_min_of_both_ratios(
            rows in rows_strategy(),
            lsl in -2000.0f64..0.0,
            usl in 0.0f64..2000.0,
        ) {
            let t = to_table(&rows);
            let skus: Vec<String> = t.skus().into_iter().map(String::from).collect();
            let lsl_map: StatMap = skus.iter().map(|s| (s.clone(), lsl)).collect();
            let usl_map: StatMap = skus.iter().map(|s| (s.clone(), usl)).collect();

            let mean = compute_mean(&t).unwrap();
            let std_dev = compute_std_dev(&t).unwrap();
            let sigma = compute_sigma(&t, &lsl_map, &usl_map).unwrap();

            for sku in &skus {
                let sd = std_dev[sku];
                if sd == 0.0 {
                    prop_assert!(!sigma.contains_key(sku));
                } else {
                    let m = mean[sku];
                    let expected = ((usl - m) / sd).min((m - lsl) / sd);
                    prop_assert!((sigma[sku] - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
                }
            }
        }
    }
}
