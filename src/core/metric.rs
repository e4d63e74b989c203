//! Metric identifiers and the SKU-keyed maps they are computed into

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A SKU-keyed numeric mapping (mean, variance, limits, ...)
///
/// Presence of a key means the value is defined for that SKU; absence means
/// it is not. A `BTreeMap` keeps output ordered by SKU.
pub type StatMap = BTreeMap<String, f64>;

/// A statistic that has its own column in the specification table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Mean,
    Variance,
    StdDev,
    SigmaLevel,
}

impl Metric {
    /// All metrics, in the order the pipeline writes them
    pub const ALL: [Metric; 4] = [
        Metric::Mean,
        Metric::Variance,
        Metric::StdDev,
        Metric::SigmaLevel,
    ];

    /// Column name in the specification table
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Mean => "mean",
            Metric::Variance => "variance",
            Metric::StdDev => "std_dev",
            Metric::SigmaLevel => "sigma_level",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Metric::Mean),
            "variance" => Ok(Metric::Variance),
            "std_dev" | "stddev" => Ok(Metric::StdDev),
            "sigma_level" | "sigma" => Ok(Metric::SigmaLevel),
            other => Err(format!(
                "Unknown metric: '{}'. Supported: mean, variance, std_dev, sigma_level",
                other
            )),
        }
    }
}
