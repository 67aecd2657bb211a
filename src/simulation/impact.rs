//! Environmental and social impact estimation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{Strategy, unit_for};
use crate::random::RandomSource;

/// Durations beyond the nominal one amplify impact at most this much.
const MAX_DURATION_FACTOR: f64 = 1.5;

/// Unit of every metric except temperature.
const PERCENT: &str = "%";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactMetric {
    /// Expressed in `unit`: percentage points for `%`, degrees for `°C`.
    pub value: f64,
    pub unit: String,
    pub improvement_percent: f64,
}

impl ImpactMetric {
    /// `value` as a multiplier on the affected indicator (0.075 for 7.5%),
    /// or unchanged for absolute units.
    pub fn ratio(&self) -> f64 {
        if self.unit == PERCENT {
            self.value / 100.0
        } else {
            self.value
        }
    }
}

/// Compute the impact bundle of `strategy` at `intensity_percent` over
/// `duration_months`.
///
/// `value` carries a uniform ±10% variance drawn from `rng`;
/// `improvement_percent` is free of variance and duration so it scales
/// linearly with intensity.
pub fn compute_impact(
    strategy: &Strategy,
    intensity_percent: u32,
    duration_months: u32,
    rng: &mut dyn RandomSource,
) -> BTreeMap<String, ImpactMetric> {
    let intensity_factor = f64::from(intensity_percent) / 100.0;
    let duration_factor = (f64::from(duration_months) / f64::from(strategy.duration_months))
        .min(MAX_DURATION_FACTOR);

    strategy
        .base_impact
        .iter()
        .map(|(name, base)| {
            let random_factor = rng.between(0.9, 1.1);
            let unit = unit_for(name);
            let scale = if unit == PERCENT { 100.0 } else { 1.0 };
            let metric = ImpactMetric {
                value: base * intensity_factor * duration_factor * random_factor * scale,
                unit: unit.to_string(),
                improvement_percent: base * intensity_factor * 100.0,
            };
            (name.clone(), metric)
        })
        .collect()
}
