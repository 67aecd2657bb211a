//! Static strategy catalog and the fixed Santa Cruz city profile.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Metric keys shared by strategies, the timeline and the city projector.
pub mod metric {
    pub const CO2_REDUCTION: &str = "co2Reduction";
    pub const AIR_QUALITY: &str = "airQuality";
    pub const TEMPERATURE_REDUCTION: &str = "temperatureReduction";
    pub const GREEN_COVERAGE: &str = "greenCoverage";
    pub const BIODIVERSITY: &str = "biodiversity";
    pub const ENERGY_EFFICIENCY: &str = "energyEfficiency";
    pub const TRAFFIC_REDUCTION: &str = "trafficReduction";
    pub const WASTE_REDUCTION: &str = "wasteReduction";
    pub const RECYCLING_RATE: &str = "recyclingRate";
    pub const WATER_SAVINGS: &str = "waterSavings";
    pub const FLOOD_RISK_REDUCTION: &str = "floodRiskReduction";
}

/// Unit in which a metric is reported.
pub fn unit_for(metric_name: &str) -> &'static str {
    match metric_name {
        metric::TEMPERATURE_REDUCTION => "°C",
        _ => "%",
    }
}

/// What a strategy needs from the city to be viable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    /// The actual value must reach this minimum.
    Minimum(f64),
    /// The capability must be present (or absent).
    Required(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub base_impact: BTreeMap<String, f64>,
    pub cost_per_intensity_unit: f64,
    pub duration_months: u32,
    pub requirements: BTreeMap<String, Threshold>,
    pub default_intensity: u32,
}

/// Fixed baseline for Santa Cruz de la Sierra.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityProfile {
    pub name: String,
    pub population: u64,
    /// km².
    pub area: f64,
    /// Tonnes of CO2 per year.
    pub current_co2: f64,
    pub air_quality_index: f64,
    /// °C.
    pub average_temperature: f64,
    /// Percent of urban area.
    pub green_coverage: f64,
    /// GWh per year.
    pub energy_consumption: f64,
    /// Tonnes per day.
    pub waste_generation: f64,
    /// Litres per person per day.
    pub water_consumption: f64,
    /// Million USD per year.
    pub economic_activity: f64,
}

pub static SANTA_CRUZ: LazyLock<CityProfile> = LazyLock::new(|| CityProfile {
    name: "Santa Cruz de la Sierra".to_string(),
    population: 1_700_000,
    area: 535.0,
    current_co2: 4_200_000.0,
    air_quality_index: 68.0,
    average_temperature: 24.5,
    green_coverage: 12.0,
    energy_consumption: 2_800.0,
    waste_generation: 1_500.0,
    water_consumption: 180.0,
    economic_activity: 14_500.0,
});

fn impacts(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn requirements(pairs: &[(&str, Threshold)]) -> BTreeMap<String, Threshold> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

static STRATEGIES: LazyLock<Vec<Strategy>> = LazyLock::new(|| {
    use Threshold::{Minimum, Required};

    vec![
        Strategy {
            id: "reforestation".to_string(),
            name: "Reforestación Urbana".to_string(),
            category: "environment".to_string(),
            description: "Plantación de árboles nativos en parques, avenidas y cinturones verdes."
                .to_string(),
            base_impact: impacts(&[
                (metric::CO2_REDUCTION, 0.15),
                (metric::AIR_QUALITY, 0.12),
                (metric::TEMPERATURE_REDUCTION, 1.5),
                (metric::GREEN_COVERAGE, 0.25),
                (metric::BIODIVERSITY, 0.20),
            ]),
            cost_per_intensity_unit: 50_000.0,
            duration_months: 24,
            requirements: requirements(&[
                ("availableLand", Minimum(500.0)),
                ("waterAvailability", Minimum(0.6)),
                ("communitySupport", Minimum(0.5)),
            ]),
            default_intensity: 50,
        },
        Strategy {
            id: "renewable_energy".to_string(),
            name: "Energía Solar Distribuida".to_string(),
            category: "energy".to_string(),
            description: "Paneles solares en edificios públicos, viviendas y comercios.".to_string(),
            base_impact: impacts(&[
                (metric::CO2_REDUCTION, 0.30),
                (metric::ENERGY_EFFICIENCY, 0.25),
                (metric::AIR_QUALITY, 0.10),
            ]),
            cost_per_intensity_unit: 120_000.0,
            duration_months: 36,
            requirements: requirements(&[
                ("solarIrradiation", Minimum(4.5)),
                ("gridCapacity", Minimum(0.7)),
                ("investmentCapacity", Minimum(0.6)),
            ]),
            default_intensity: 60,
        },
        Strategy {
            id: "public_transport".to_string(),
            name: "Transporte Público Eficiente".to_string(),
            category: "mobility".to_string(),
            description: "Corredores de buses eléctricos y reordenamiento de micros.".to_string(),
            base_impact: impacts(&[
                (metric::CO2_REDUCTION, 0.20),
                (metric::AIR_QUALITY, 0.18),
                (metric::TRAFFIC_REDUCTION, 0.30),
            ]),
            cost_per_intensity_unit: 150_000.0,
            duration_months: 30,
            requirements: requirements(&[
                ("roadInfrastructure", Minimum(0.6)),
                ("communitySupport", Minimum(0.6)),
                ("investmentCapacity", Minimum(0.7)),
            ]),
            default_intensity: 50,
        },
        Strategy {
            id: "waste_management".to_string(),
            name: "Gestión Integral de Residuos".to_string(),
            category: "waste".to_string(),
            description: "Separación en origen, reciclaje y compostaje a escala de distrito."
                .to_string(),
            base_impact: impacts(&[
                (metric::WASTE_REDUCTION, 0.35),
                (metric::RECYCLING_RATE, 0.40),
                (metric::CO2_REDUCTION, 0.08),
            ]),
            cost_per_intensity_unit: 40_000.0,
            duration_months: 18,
            requirements: requirements(&[
                ("collectionCoverage", Minimum(0.7)),
                ("communitySupport", Minimum(0.5)),
                ("recyclingFacilities", Required(true)),
            ]),
            default_intensity: 40,
        },
        Strategy {
            id: "water_conservation".to_string(),
            name: "Conservación del Agua".to_string(),
            category: "water".to_string(),
            description: "Captación de lluvia, reducción de pérdidas y drenaje sostenible."
                .to_string(),
            base_impact: impacts(&[
                (metric::WATER_SAVINGS, 0.25),
                (metric::FLOOD_RISK_REDUCTION, 0.20),
                (metric::TEMPERATURE_REDUCTION, 0.3),
            ]),
            cost_per_intensity_unit: 60_000.0,
            duration_months: 24,
            requirements: requirements(&[
                ("rainfall", Minimum(1_000.0)),
                ("infrastructureCondition", Minimum(0.5)),
                ("communitySupport", Minimum(0.5)),
            ]),
            default_intensity: 50,
        },
    ]
});

/// All strategies, in catalog order.
pub fn strategies() -> &'static [Strategy] {
    &STRATEGIES
}

/// Look up a strategy by id.
pub fn find_strategy(id: &str) -> Option<&'static Strategy> {
    STRATEGIES.iter().find(|s| s.id == id)
}
