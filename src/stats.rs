use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Spread metric: radial dispersion of offsets around the nominal position
// ---------------------------------------------------------------------------

pub const DEFAULT_PERCENTILE: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMethod {
    /// Standard deviation of the radius (population, ddof = 0).
    #[default]
    StdRadius,
    /// Root-mean-square radius.
    RmsRadius,
    /// Radius at a given percentile, linear interpolation between ranks.
    PercentileRadius,
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown spread method '{0}' (expected std_radius, rms_radius or percentile_radius)")]
pub struct UnknownSpreadMethod(pub String);

impl SpreadMethod {
    pub fn name(self) -> &'static str {
        match self {
            SpreadMethod::StdRadius => "std_radius",
            SpreadMethod::RmsRadius => "rms_radius",
            SpreadMethod::PercentileRadius => "percentile_radius",
        }
    }

    /// `std radius`, as shown in run averages.
    pub fn label(self) -> String {
        self.name().replace('_', " ")
    }
}

impl FromStr for SpreadMethod {
    type Err = UnknownSpreadMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "std_radius" => Ok(SpreadMethod::StdRadius),
            "rms_radius" => Ok(SpreadMethod::RmsRadius),
            "percentile_radius" => Ok(SpreadMethod::PercentileRadius),
            other => Err(UnknownSpreadMethod(other.to_string())),
        }
    }
}

impl fmt::Display for SpreadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Distance of every sample from the origin.
pub fn radii(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    xs.iter().zip(ys).map(|(x, y)| x.hypot(*y)).collect()
}

/// Measure the spread of `(x, y)` samples around `(0, 0)`.
///
/// Returns NaN for an empty sample set. `percentile` is only read by
/// [`SpreadMethod::PercentileRadius`] and is clamped to `[0, 100]`.
pub fn measure_spread(xs: &[f64], ys: &[f64], method: SpreadMethod, percentile: f64) -> f64 {
    let r = radii(xs, ys);
    if r.is_empty() {
        return f64::NAN;
    }
    let n = r.len() as f64;
    match method {
        SpreadMethod::StdRadius => {
            let mean = r.iter().sum::<f64>() / n;
            let var = r.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        }
        SpreadMethod::RmsRadius => (r.iter().map(|v| v * v).sum::<f64>() / n).sqrt(),
        SpreadMethod::PercentileRadius => percentile_of(r, percentile),
    }
}

fn percentile_of(mut values: Vec<f64>, percentile: f64) -> f64 {
    values.sort_by(f64::total_cmp);
    let rank = percentile.clamp(0.0, 100.0) / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Mean of the defined values; `None` when nothing is defined.
pub fn mean_defined(values: &[f64]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_empty_input_is_undefined_for_every_method() {
        for method in [
            SpreadMethod::StdRadius,
            SpreadMethod::RmsRadius,
            SpreadMethod::PercentileRadius,
        ] {
            assert!(measure_spread(&[], &[], method, DEFAULT_PERCENTILE).is_nan());
        }
    }

    #[test]
    fn test_std_radius_of_equal_radii_is_zero() {
        let v = measure_spread(&[0.1, -0.1], &[0.0, 0.0], SpreadMethod::StdRadius, 95.0);
        assert!(v.abs() < EPS);
    }

    #[test]
    fn test_std_radius_is_population_std() {
        // radii 1 and 3 → mean 2, population std 1
        let v = measure_spread(&[1.0, 0.0], &[0.0, -3.0], SpreadMethod::StdRadius, 95.0);
        assert!((v - 1.0).abs() < EPS);
    }

    #[test]
    fn test_rms_radius() {
        let v = measure_spread(&[3.0], &[4.0], SpreadMethod::RmsRadius, 95.0);
        assert!((v - 5.0).abs() < EPS);
    }

    #[test]
    fn test_percentile_radius() {
        let xs = [3.0, 1.0, 2.0];
        let ys = [0.0, 0.0, 0.0];
        let max = measure_spread(&xs, &ys, SpreadMethod::PercentileRadius, 100.0);
        assert!((max - 3.0).abs() < EPS);
        let median = measure_spread(&xs, &ys, SpreadMethod::PercentileRadius, 50.0);
        assert!((median - 2.0).abs() < EPS);
        let p95 = measure_spread(&xs, &ys, SpreadMethod::PercentileRadius, 95.0);
        assert!((p95 - 2.9).abs() < EPS);
    }

    #[test]
    fn test_parse_method_names() {
        assert_eq!("rms_radius".parse(), Ok(SpreadMethod::RmsRadius));
        assert_eq!(SpreadMethod::default(), SpreadMethod::StdRadius);
        assert!("radius".parse::<SpreadMethod>().is_err());
        assert_eq!(SpreadMethod::PercentileRadius.label(), "percentile radius");
    }

    #[test]
    fn test_mean_defined_skips_nan() {
        assert_eq!(mean_defined(&[1.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(mean_defined(&[f64::NAN]), None);
    }
}
