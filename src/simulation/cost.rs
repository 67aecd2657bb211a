//! Cost estimation. Pure and deterministic.

use serde::{Deserialize, Serialize};

use super::catalog::{CityProfile, Strategy};

const INFLATION: f64 = 1.05;
const CONTINGENCY: f64 = 1.15;

const IMPLEMENTATION_SHARE: f64 = 0.60;
const MAINTENANCE_SHARE: f64 = 0.25;
const MONITORING_SHARE: f64 = 0.15;

pub const CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub implementation: f64,
    pub maintenance: f64,
    pub monitoring: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub total: f64,
    pub per_year: f64,
    pub per_person: f64,
    pub breakdown: CostBreakdown,
    pub currency: String,
}

/// Estimate the cost of `strategy` at `intensity_percent` over
/// `duration_months`.
///
/// `duration_months` must be non-zero; callers validate it first.
pub fn compute_costs(
    strategy: &Strategy,
    intensity_percent: u32,
    duration_months: u32,
    city: &CityProfile,
) -> CostEstimate {
    let nominal = f64::from(strategy.duration_months);
    let base_cost = strategy.cost_per_intensity_unit * (f64::from(intensity_percent) / 10.0);
    let duration_multiplier = 1.0 + (f64::from(duration_months) - nominal) / nominal * 0.5;

    let total = (base_cost * duration_multiplier * INFLATION * CONTINGENCY).round();
    let years = f64::from(duration_months) / 12.0;

    CostEstimate {
        total,
        per_year: (total / years).round(),
        per_person: (total / city.population as f64).round(),
        breakdown: CostBreakdown {
            implementation: (total * IMPLEMENTATION_SHARE).round(),
            maintenance: (total * MAINTENANCE_SHARE).round(),
            monitoring: (total * MONITORING_SHARE).round(),
        },
        currency: CURRENCY.to_string(),
    }
}
