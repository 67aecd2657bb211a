//! Climate strategy simulation engine.
//!
//! [`run_simulation`] validates its input, then composes the impact,
//! cost, feasibility and timeline calculators plus the city-metrics
//! projector into one [`SimulationResult`]. Nothing is persisted.
//!
//! # Modules
//!
//! - [`catalog`]: Static strategies and the Santa Cruz city profile
//! - [`impact`]: Impact metrics with bounded variance
//! - [`cost`]: Deterministic cost estimation
//! - [`feasibility`]: Requirement scoring and recommendations
//! - [`timeline`]: Six-month phase plan

pub mod catalog;
pub mod cost;
pub mod feasibility;
pub mod impact;
pub mod timeline;

use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::random::RandomSource;
use catalog::{CityProfile, Strategy, find_strategy, metric};
use cost::CostEstimate;
use feasibility::{Feasibility, FeasibilityLevel};
use impact::ImpactMetric;
use timeline::Phase;

pub const MIN_INTENSITY: u32 = 10;
pub const MAX_INTENSITY: u32 = 100;
pub const MAX_DURATION_MONTHS: u32 = 120;

/// Per-person cost above which a financing note is added.
const FINANCING_NOTE_PER_PERSON: f64 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Estrategia no encontrada: {0}")]
    StrategyNotFound(String),

    #[error("La intensidad debe estar entre 10 y 100 (recibido {0})")]
    IntensityOutOfRange(u32),

    #[error("La intensidad debe ser un número entero entre 10 y 100 (recibido {0})")]
    InvalidIntensity(f64),

    #[error("La duración debe estar entre 1 y 120 meses (recibido {0})")]
    InvalidDuration(u32),
}

impl From<SimulationError> for ApiError {
    fn from(e: SimulationError) -> Self {
        match e {
            SimulationError::StrategyNotFound(_) => ApiError::NotFound(e.to_string()),
            SimulationError::IntensityOutOfRange(_)
            | SimulationError::InvalidIntensity(_)
            | SimulationError::InvalidDuration(_) => {
                ApiError::Validation(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub intensity: u32,
    pub duration: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// One city indicator before and after the projected impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMetric {
    pub current: f64,
    pub projected: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub id: Uuid,
    pub strategy: Strategy,
    pub parameters: SimulationParameters,
    pub impact: BTreeMap<String, ImpactMetric>,
    pub costs: CostEstimate,
    pub feasibility: Feasibility,
    pub timeline: Vec<Phase>,
    pub city_metrics: BTreeMap<String, ProjectedMetric>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Convert a requested intensity into a whole percentage.
///
/// JSON numbers arrive as `f64`; anything fractional, non-finite or
/// outside `MIN_INTENSITY..=MAX_INTENSITY` is rejected.
pub fn parse_intensity(raw: f64) -> Result<u32, SimulationError> {
    let range = f64::from(MIN_INTENSITY)..=f64::from(MAX_INTENSITY);
    if raw.fract() != 0.0 || !range.contains(&raw) {
        return Err(SimulationError::InvalidIntensity(raw));
    }
    Ok(raw as u32)
}

/// Validate the request and resolve the strategy and effective duration.
pub fn validate(
    strategy_id: &str,
    intensity_percent: u32,
    duration_months: Option<u32>,
) -> Result<(&'static Strategy, u32), SimulationError> {
    let strategy = find_strategy(strategy_id)
        .ok_or_else(|| SimulationError::StrategyNotFound(strategy_id.to_string()))?;

    if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&intensity_percent) {
        return Err(SimulationError::IntensityOutOfRange(intensity_percent));
    }

    let duration = duration_months.unwrap_or(strategy.duration_months);
    if !(1..=MAX_DURATION_MONTHS).contains(&duration) {
        return Err(SimulationError::InvalidDuration(duration));
    }

    Ok((strategy, duration))
}

/// Apply impact values onto the city baseline.
///
/// Only indicators touched by at least one metric appear in the output.
pub fn project_city_metrics(
    city: &CityProfile,
    impact: &BTreeMap<String, ImpactMetric>,
) -> BTreeMap<String, ProjectedMetric> {
    let reduction = |key: &str| impact.get(key).map(ImpactMetric::ratio);
    let mut out = BTreeMap::new();

    let mut push = |name: &str, current: f64, projected: f64| {
        let change_percent = if current != 0.0 {
            ((projected - current) / current * 1000.0).round() / 10.0
        } else {
            0.0
        };
        out.insert(
            name.to_string(),
            ProjectedMetric {
                current,
                projected: (projected * 100.0).round() / 100.0,
                change_percent,
            },
        );
    };

    if let Some(r) = reduction(metric::CO2_REDUCTION) {
        push("currentCO2", city.current_co2, city.current_co2 * (1.0 - r));
    }
    if let Some(r) = reduction(metric::AIR_QUALITY) {
        // Lower AQI is better.
        push(
            "airQualityIndex",
            city.air_quality_index,
            city.air_quality_index * (1.0 - r),
        );
    }
    if let Some(delta) = reduction(metric::TEMPERATURE_REDUCTION) {
        push(
            "averageTemperature",
            city.average_temperature,
            city.average_temperature - delta,
        );
    }
    if let Some(r) = reduction(metric::GREEN_COVERAGE) {
        push("greenCoverage", city.green_coverage, city.green_coverage * (1.0 + r));
    }
    if let Some(r) = reduction(metric::ENERGY_EFFICIENCY) {
        push(
            "energyConsumption",
            city.energy_consumption,
            city.energy_consumption * (1.0 - r),
        );
    }
    if let Some(r) = reduction(metric::WASTE_REDUCTION) {
        push(
            "wasteGeneration",
            city.waste_generation,
            city.waste_generation * (1.0 - r),
        );
    }
    if let Some(r) = reduction(metric::WATER_SAVINGS) {
        push(
            "waterConsumption",
            city.water_consumption,
            city.water_consumption * (1.0 - r),
        );
    }

    out
}

fn recommendations(
    intensity_percent: u32,
    costs: &CostEstimate,
    feasibility: &Feasibility,
) -> Vec<String> {
    let mut out = feasibility.recommendations.clone();

    if intensity_percent < 30 {
        out.push(
            "Considere aumentar la intensidad para lograr un impacto medible en la ciudad"
                .to_string(),
        );
    }
    if intensity_percent > 80 {
        out.push("Implemente por etapas para reducir riesgos de ejecución".to_string());
    }
    if costs.per_person > FINANCING_NOTE_PER_PERSON {
        out.push(
            "El costo por habitante es elevado: explore cofinanciamiento nacional e internacional"
                .to_string(),
        );
    }
    if feasibility.level == FeasibilityLevel::Low {
        out.push("Realice un estudio de prefactibilidad antes de comprometer recursos".to_string());
    }

    out
}

/// Run a full simulation for the city.
///
/// Fails with [`SimulationError::StrategyNotFound`] for unknown ids and
/// with a validation variant when intensity or duration are out of range.
pub fn run_simulation(
    strategy_id: &str,
    intensity_percent: u32,
    duration_months: Option<u32>,
    city: &CityProfile,
    rng: &mut dyn RandomSource,
    now: DateTime<Utc>,
) -> Result<SimulationResult, SimulationError> {
    let (strategy, duration) = validate(strategy_id, intensity_percent, duration_months)?;

    let impact = impact::compute_impact(strategy, intensity_percent, duration, rng);
    let costs = cost::compute_costs(strategy, intensity_percent, duration, city);
    let feasibility = feasibility::score(strategy, intensity_percent, city, rng);
    let timeline = timeline::generate_timeline(strategy, intensity_percent, duration);
    let city_metrics = project_city_metrics(city, &impact);
    let recommendations = recommendations(intensity_percent, &costs, &feasibility);

    let end_date = now
        .checked_add_months(Months::new(duration))
        .unwrap_or(now);

    Ok(SimulationResult {
        id: Uuid::new_v4(),
        strategy: strategy.clone(),
        parameters: SimulationParameters {
            intensity: intensity_percent,
            duration,
            start_date: now,
            end_date,
        },
        impact,
        costs,
        feasibility,
        timeline,
        city_metrics,
        recommendations,
        created_at: now,
    })
}
