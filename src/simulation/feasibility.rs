//! Feasibility scoring against the city profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{CityProfile, Strategy, Threshold};
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeasibilityLevel {
    #[serde(rename = "ALTA")]
    High,
    #[serde(rename = "MEDIA")]
    Medium,
    #[serde(rename = "BAJA")]
    Low,
}

impl FeasibilityLevel {
    /// Level for a mean factor on the 0–1 scale.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.8 {
            FeasibilityLevel::High
        } else if ratio > 0.6 {
            FeasibilityLevel::Medium
        } else {
            FeasibilityLevel::Low
        }
    }
}

/// A requirement value, either measured or estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Number(f64),
    Flag(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityFactor {
    pub required: Threshold,
    pub actual: Measure,
    pub factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feasibility {
    pub score: u32,
    pub level: FeasibilityLevel,
    pub factors: BTreeMap<String, FeasibilityFactor>,
    pub recommendations: Vec<String>,
}

/// Resolve the city's value for a requirement.
///
/// Requirements the profile does not measure directly are estimated; the
/// random ones draw from `rng`.
fn resolve_actual(requirement: &str, city: &CityProfile, rng: &mut dyn RandomSource) -> Measure {
    use Measure::{Flag, Number};

    match requirement {
        // Usable hectares: 2% of the urban area.
        "availableLand" => Number(city.area * 100.0 * 0.02),
        // kWh/m²/day, NASA POWER long-term mean for the city.
        "solarIrradiation" => Number(5.8),
        // mm/year.
        "rainfall" => Number(1_300.0),
        "gridCapacity" => Number(0.65),
        "roadInfrastructure" => Number(0.55),
        "collectionCoverage" => Number(0.85),
        "recyclingFacilities" => Flag(false),
        "communitySupport" => Number(0.6 + rng.next_unit() * 0.3),
        "waterAvailability" => Number(0.5 + rng.next_unit() * 0.4),
        "investmentCapacity" => Number(0.4 + rng.next_unit() * 0.4),
        "infrastructureCondition" => Number(0.45 + rng.next_unit() * 0.3),
        _ => Number(0.5 + rng.next_unit() * 0.3),
    }
}

fn factor_for(required: Threshold, actual: Measure) -> f64 {
    match (required, actual) {
        (Threshold::Minimum(min), Measure::Number(value)) => {
            if min <= 0.0 {
                1.0
            } else {
                (value / min).clamp(0.0, 1.0)
            }
        }
        (Threshold::Minimum(min), Measure::Flag(present)) => {
            if present || min <= 0.0 { 1.0 } else { 0.0 }
        }
        (Threshold::Required(wanted), Measure::Flag(present)) => {
            if wanted == present { 1.0 } else { 0.0 }
        }
        (Threshold::Required(wanted), Measure::Number(value)) => {
            if wanted == (value > 0.0) { 1.0 } else { 0.0 }
        }
    }
}

fn recommendation_for(requirement: &str) -> String {
    let text = match requirement {
        "availableLand" => "Identificar terrenos municipales y áreas degradadas aptas para intervención",
        "waterAvailability" => "Asegurar fuentes de agua para riego, priorizando agua reciclada",
        "communitySupport" => "Realizar campañas de sensibilización y procesos de participación vecinal",
        "solarIrradiation" => "Evaluar tecnologías de mayor eficiencia para la irradiación disponible",
        "gridCapacity" => "Coordinar con la distribuidora eléctrica la ampliación de la red",
        "investmentCapacity" => "Buscar financiamiento climático internacional y alianzas público-privadas",
        "roadInfrastructure" => "Priorizar el mantenimiento vial en los corredores troncales",
        "collectionCoverage" => "Ampliar las rutas de recolección a los distritos periféricos",
        "recyclingFacilities" => "Construir o habilitar centros de acopio y plantas de reciclaje",
        "rainfall" => "Complementar la captación de lluvia con reúso de aguas grises",
        "infrastructureCondition" => "Rehabilitar redes de distribución para reducir pérdidas",
        other => return format!("Fortalecer la capacidad local en: {other}"),
    };
    text.to_string()
}

/// Score how viable `strategy` is for `city`.
///
/// Requirements describe the city, not the rollout, so the score does not
/// vary with `_intensity_percent`; it stays in the signature so every
/// calculator takes the same request inputs.
pub fn score(
    strategy: &Strategy,
    _intensity_percent: u32,
    city: &CityProfile,
    rng: &mut dyn RandomSource,
) -> Feasibility {
    let mut factors = BTreeMap::new();
    let mut recommendations = Vec::new();

    for (name, required) in &strategy.requirements {
        let actual = resolve_actual(name, city, rng);
        let factor = factor_for(*required, actual);
        if factor < 0.5 {
            recommendations.push(recommendation_for(name));
        }
        factors.insert(
            name.clone(),
            FeasibilityFactor {
                required: *required,
                actual,
                factor,
            },
        );
    }

    let mean = if factors.is_empty() {
        1.0
    } else {
        factors.values().map(|f| f.factor).sum::<f64>() / factors.len() as f64
    };

    Feasibility {
        score: (mean * 100.0).round() as u32,
        level: FeasibilityLevel::from_ratio(mean),
        factors,
        recommendations,
    }
}
