//! Decomposition of a simulation into six-month phases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::Strategy;

/// Length of one phase in months.
pub const PHASE_MONTHS: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub phase_index: u32,
    /// Inclusive.
    pub start_month: u32,
    /// Exclusive.
    pub end_month: u32,
    pub progress_percent: u32,
    pub milestones: Vec<String>,
    pub expected_impact: BTreeMap<String, f64>,
}

fn strategy_milestone(strategy: &Strategy, intensity_factor: f64, progress: f64) -> Option<String> {
    match strategy.id.as_str() {
        "reforestation" => {
            // 50,000 trees at full intensity.
            let trees = (50_000.0 * intensity_factor * progress).round() as u64;
            Some(format!("Plantación de {trees} árboles"))
        }
        "renewable_energy" => {
            let megawatts = 50.0 * intensity_factor * progress;
            Some(format!("Instalación de {megawatts:.1} MW de capacidad solar"))
        }
        "public_transport" => {
            let routes = (20.0 * intensity_factor * progress).round().max(1.0) as u64;
            Some(format!("{routes} rutas de bus eléctrico en operación"))
        }
        "waste_management" => {
            let coverage = (100.0 * intensity_factor * progress).round() as u64;
            Some(format!("Separación en origen en el {coverage}% de los distritos"))
        }
        _ => None,
    }
}

/// Split `duration_months` into contiguous phases of [`PHASE_MONTHS`]; the
/// last phase is truncated to the duration.
pub fn generate_timeline(
    strategy: &Strategy,
    intensity_percent: u32,
    duration_months: u32,
) -> Vec<Phase> {
    let intensity_factor = f64::from(intensity_percent) / 100.0;
    let phase_count = duration_months.div_ceil(PHASE_MONTHS);

    (0..phase_count)
        .map(|i| {
            let progress = f64::from(i + 1) / f64::from(phase_count);

            let mut milestones = Vec::new();
            if let Some(m) = strategy_milestone(strategy, intensity_factor, progress) {
                milestones.push(m);
            }
            milestones.push(format!("Fase {} completada", i + 1));

            let expected_impact = strategy
                .base_impact
                .iter()
                .map(|(name, base)| {
                    (name.clone(), (base * intensity_factor * progress * 100.0).round())
                })
                .collect();

            Phase {
                phase_index: i,
                start_month: i * PHASE_MONTHS,
                end_month: ((i + 1) * PHASE_MONTHS).min(duration_months),
                progress_percent: (progress * 100.0).round() as u32,
                milestones,
                expected_impact,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::catalog::find_strategy;

    #[test]
    fn test_twenty_four_months_gives_four_contiguous_phases() {
        let strategy = find_strategy("reforestation").unwrap();
        let phases = generate_timeline(strategy, 50, 24);

        assert_eq!(phases.len(), 4);
        let mut cursor = 0;
        for (i, phase) in phases.iter().enumerate() {
            assert_eq!(phase.phase_index as usize, i);
            assert_eq!(phase.start_month, cursor);
            assert_eq!(phase.end_month - phase.start_month, 6);
            cursor = phase.end_month;
        }
        assert_eq!(cursor, 24);
        assert_eq!(phases.last().unwrap().progress_percent, 100);
    }

    #[test]
    fn test_partial_last_phase() {
        let strategy = find_strategy("waste_management").unwrap();
        let phases = generate_timeline(strategy, 40, 20);

        assert_eq!(phases.len(), 4);
        assert_eq!(phases[3].start_month, 18);
        assert_eq!(phases[3].end_month, 20);
        assert_eq!(phases[0].progress_percent, 25);
    }

    #[test]
    fn test_reforestation_milestones_scale_with_progress() {
        let strategy = find_strategy("reforestation").unwrap();
        let phases = generate_timeline(strategy, 50, 24);

        assert_eq!(phases[0].milestones[0], "Plantación de 6250 árboles");
        assert_eq!(phases[3].milestones[0], "Plantación de 25000 árboles");
        assert_eq!(phases[3].milestones[1], "Fase 4 completada");
    }

    #[test]
    fn test_generic_milestone_only_for_water() {
        let strategy = find_strategy("water_conservation").unwrap();
        let phases = generate_timeline(strategy, 50, 12);
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].milestones, vec!["Fase 1 completada".to_string()]);
    }

    #[test]
    fn test_expected_impact_grows_to_full() {
        let strategy = find_strategy("reforestation").unwrap();
        let phases = generate_timeline(strategy, 100, 24);
        // greenCoverage 0.25 at full intensity
        assert_eq!(phases[0].expected_impact["greenCoverage"], 6.0);
        assert_eq!(phases[3].expected_impact["greenCoverage"], 25.0);
    }
}
