//! Environmental alerts derived from the latest NASA data.
//!
//! Alerts are computed on demand from the most recent climate day and the
//! fire detections near the city. Nothing here is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_sources::{ClimateReport, DataOrigin, DailyClimate, FireReport};
use crate::notifications::Priority;

/// T2M_MAX, °C.
pub const HEAT_HIGH: f64 = 35.0;
pub const HEAT_CRITICAL: f64 = 38.0;
/// PRECTOTCORR, mm/day.
pub const HEAVY_RAIN: f64 = 50.0;
/// RH2M, %.
pub const DRY_AIR: f64 = 30.0;
/// Detections within the city box.
pub const FIRES_MEDIUM: usize = 1;
pub const FIRES_HIGH: usize = 10;
pub const FIRES_CRITICAL: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Heat,
    HeavyRain,
    DryAir,
    Fire,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub origin: DataOrigin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAlerts {
    pub generated_at: DateTime<Utc>,
    pub alerts: Vec<Alert>,
    pub summary: AlertSummary,
    pub climate_origin: DataOrigin,
    pub fire_origin: DataOrigin,
}

/// Evaluate every threshold against the reports.
///
/// Alerts are ordered most severe first.
pub fn derive_alerts(climate: &ClimateReport, fires: &FireReport, now: DateTime<Utc>) -> CurrentAlerts {
    let mut alerts = Vec::new();

    if let Some(day) = climate.latest() {
        alerts.extend(climate_alerts(day, climate.origin));
    }
    if let Some(alert) = fire_alert(fires) {
        alerts.push(alert);
    }

    alerts.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut summary = AlertSummary {
        total: alerts.len(),
        ..Default::default()
    };
    for alert in &alerts {
        match alert.priority {
            Priority::Critical => summary.critical += 1,
            Priority::High => summary.high += 1,
            Priority::Medium => summary.medium += 1,
            Priority::Info => {}
        }
    }

    CurrentAlerts {
        generated_at: now,
        alerts,
        summary,
        climate_origin: climate.origin,
        fire_origin: fires.origin,
    }
}

fn climate_alerts(day: &DailyClimate, origin: DataOrigin) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let date = day.date.format("%d/%m/%Y");

    if let Some(max) = day.temperature_max.filter(|t| *t >= HEAT_HIGH) {
        let (priority, threshold) = if max >= HEAT_CRITICAL {
            (Priority::Critical, HEAT_CRITICAL)
        } else {
            (Priority::High, HEAT_HIGH)
        };
        alerts.push(Alert {
            kind: AlertKind::Heat,
            priority,
            title: "Calor extremo".to_string(),
            message: format!(
                "Temperatura máxima de {max:.1} °C el {date}. Evita la exposición al sol y mantente hidratado."
            ),
            value: max,
            threshold,
            origin,
        });
    }

    if let Some(rain) = day.precipitation.filter(|p| *p >= HEAVY_RAIN) {
        alerts.push(Alert {
            kind: AlertKind::HeavyRain,
            priority: Priority::High,
            title: "Lluvia intensa".to_string(),
            message: format!(
                "Se registraron {rain:.1} mm de lluvia el {date}. Riesgo de anegamiento en zonas bajas."
            ),
            value: rain,
            threshold: HEAVY_RAIN,
            origin,
        });
    }

    if let Some(humidity) = day.humidity.filter(|h| *h < DRY_AIR) {
        alerts.push(Alert {
            kind: AlertKind::DryAir,
            priority: Priority::Medium,
            title: "Aire seco".to_string(),
            message: format!(
                "Humedad relativa de {humidity:.0}% el {date}. Mayor riesgo de incendios y molestias respiratorias."
            ),
            value: humidity,
            threshold: DRY_AIR,
            origin,
        });
    }

    alerts
}

fn fire_alert(fires: &FireReport) -> Option<Alert> {
    let (priority, threshold) = match fires.count {
        n if n >= FIRES_CRITICAL => (Priority::Critical, FIRES_CRITICAL),
        n if n >= FIRES_HIGH => (Priority::High, FIRES_HIGH),
        n if n >= FIRES_MEDIUM => (Priority::Medium, FIRES_MEDIUM),
        _ => return None,
    };

    Some(Alert {
        kind: AlertKind::Fire,
        priority,
        title: "Focos de calor".to_string(),
        message: format!(
            "{} focos de calor detectados por satélite cerca de la ciudad en los últimos {} días.",
            fires.count, fires.days
        ),
        value: fires.count as f64,
        threshold: threshold as f64,
        origin: fires.origin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::{FireDetection, Location};
    use chrono::NaiveDate;

    fn location() -> Location {
        Location {
            name: "Santa Cruz de la Sierra".to_string(),
            latitude: -17.7833,
            longitude: -63.1821,
        }
    }

    fn day(max: f64, rain: f64, humidity: f64) -> DailyClimate {
        DailyClimate {
            date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
            temperature: max - 7.0,
            temperature_max: Some(max),
            temperature_min: Some(max - 14.0),
            precipitation: Some(rain),
            humidity: Some(humidity),
            wind_speed: None,
            solar_radiation: None,
        }
    }

    fn climate(days: Vec<DailyClimate>) -> ClimateReport {
        ClimateReport {
            origin: DataOrigin::Nasa,
            location: location(),
            days,
        }
    }

    fn fires(count: usize) -> FireReport {
        let detection = FireDetection {
            latitude: -17.8,
            longitude: -63.2,
            brightness: None,
            acquired_date: None,
            acquired_time: "1800".to_string(),
            confidence: "n".to_string(),
            frp: None,
            daynight: "D".to_string(),
        };
        FireReport {
            origin: DataOrigin::Simulated,
            location: location(),
            days: 2,
            count,
            detections: vec![detection; count],
        }
    }

    #[test]
    fn test_quiet_day_has_no_alerts() {
        let result = derive_alerts(&climate(vec![day(30.0, 2.0, 60.0)]), &fires(0), Utc::now());
        assert!(result.alerts.is_empty());
        assert_eq!(result.summary.total, 0);
    }

    #[test]
    fn test_heat_levels() {
        let high = derive_alerts(&climate(vec![day(35.0, 0.0, 60.0)]), &fires(0), Utc::now());
        assert_eq!(high.alerts.len(), 1);
        assert_eq!(high.alerts[0].kind, AlertKind::Heat);
        assert_eq!(high.alerts[0].priority, Priority::High);

        let critical = derive_alerts(&climate(vec![day(38.2, 0.0, 60.0)]), &fires(0), Utc::now());
        assert_eq!(critical.alerts[0].priority, Priority::Critical);
        assert!(critical.alerts[0].message.contains("38.2"));
    }

    #[test]
    fn test_only_latest_day_counts() {
        let report = climate(vec![day(39.0, 80.0, 10.0), day(29.0, 0.0, 70.0)]);
        let result = derive_alerts(&report, &fires(0), Utc::now());
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_fire_levels() {
        let quiet = climate(vec![day(30.0, 0.0, 60.0)]);
        let level = |n| derive_alerts(&quiet, &fires(n), Utc::now()).alerts.first().map(|a| a.priority);
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Priority::Medium));
        assert_eq!(level(10), Some(Priority::High));
        assert_eq!(level(25), Some(Priority::Critical));
    }

    #[test]
    fn test_sorted_by_severity_with_summary() {
        let report = climate(vec![day(36.0, 55.0, 25.0)]);
        let result = derive_alerts(&report, &fires(30), Utc::now());

        let priorities: Vec<_> = result.alerts.iter().map(|a| a.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::High, Priority::Medium]
        );
        assert_eq!(result.summary.total, 4);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.summary.high, 2);
        assert_eq!(result.summary.medium, 1);
        assert_eq!(result.fire_origin, DataOrigin::Simulated);
    }

    #[test]
    fn test_empty_climate_still_reports_fires() {
        let result = derive_alerts(&climate(vec![]), &fires(12), Utc::now());
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].kind, AlertKind::Fire);
    }
}
