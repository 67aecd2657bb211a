//! NASA environmental data for Santa Cruz de la Sierra.
//!
//! # Data Sources
//!
//! - [`power`]: NASA POWER daily climate parameters
//! - [`firms`]: NASA FIRMS active fire detections
//!
//! [`EnvironmentService`] wraps both clients. Upstream failures (timeout,
//! non-2xx, malformed payload, missing MAP_KEY) never reach the caller:
//! the service logs a warning and returns locally simulated data tagged
//! with [`DataOrigin::Simulated`].

pub mod firms;
pub mod power;

use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::random::{RandomSource, SimRng};

pub use firms::{FireDetection, FirmsClient};
pub use power::{DailyClimate, NasaPowerClient};

pub const CITY_LATITUDE: f64 = -17.7833;
pub const CITY_LONGITUDE: f64 = -63.1821;
pub const COUNTRY_CODE: &str = "BOL";

/// Half-width, in degrees, of the box fires are counted in.
pub const FIRE_RADIUS_DEG: f64 = 1.0;

pub const DEFAULT_CLIMATE_DAYS: u32 = 7;
pub const MAX_CLIMATE_DAYS: u32 = 30;
pub const DEFAULT_FIRE_DAYS: u32 = 2;
pub const MAX_FIRE_DAYS: u32 = 10;

/// Where a report's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Nasa,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

fn city_location() -> Location {
    Location {
        name: "Santa Cruz de la Sierra".to_string(),
        latitude: CITY_LATITUDE,
        longitude: CITY_LONGITUDE,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateReport {
    pub origin: DataOrigin,
    pub location: Location,
    /// Chronological, oldest first.
    pub days: Vec<DailyClimate>,
}

impl ClimateReport {
    pub fn latest(&self) -> Option<&DailyClimate> {
        self.days.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireReport {
    pub origin: DataOrigin,
    pub location: Location,
    pub days: u32,
    pub count: usize,
    pub detections: Vec<FireDetection>,
}

/// Monthly normals for Santa Cruz: (mean °C, mm/day, humidity %).
const MONTHLY_NORMALS: [(f64, f64, f64); 12] = [
    (27.0, 6.2, 78.0),
    (26.8, 5.0, 79.0),
    (26.3, 4.1, 78.0),
    (24.8, 3.2, 76.0),
    (22.4, 2.4, 74.0),
    (20.8, 1.6, 72.0),
    (20.5, 0.9, 64.0),
    (22.5, 0.8, 56.0),
    (24.6, 1.6, 55.0),
    (26.2, 3.1, 62.0),
    (26.9, 4.4, 68.0),
    (27.1, 5.6, 74.0),
];

/// Fetch-or-simulate access to NASA data.
#[derive(Clone)]
pub struct EnvironmentService {
    power: NasaPowerClient,
    firms: Option<FirmsClient>,
    rng: Arc<Mutex<SimRng>>,
}

impl EnvironmentService {
    pub fn new(power: NasaPowerClient, firms: Option<FirmsClient>, seed: Option<u64>) -> Self {
        Self {
            power,
            firms,
            rng: Arc::new(Mutex::new(SimRng::seeded_or_entropy(seed))),
        }
    }

    /// Build the clients described by `config`.
    ///
    /// Without a FIRMS MAP_KEY, fire data is always simulated.
    pub fn from_config(config: &Config) -> Self {
        let power = match &config.power_base_url {
            Some(url) => NasaPowerClient::with_base_url(url),
            None => NasaPowerClient::new(),
        };
        let firms = config.firms_map_key.as_deref().map(|key| match &config.firms_base_url {
            Some(url) => FirmsClient::with_base_url(url, key),
            None => FirmsClient::new(key),
        });
        Self::new(power, firms, config.random_seed)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard)
    }

    /// The last `days` days of climate data ending yesterday.
    pub async fn climate(&self, days: u32, today: NaiveDate) -> ClimateReport {
        let days = days.clamp(1, MAX_CLIMATE_DAYS);
        let end = today - Duration::days(1);
        let start = end - Duration::days(i64::from(days) - 1);

        match self
            .power
            .get_daily(CITY_LATITUDE, CITY_LONGITUDE, start, end)
            .await
        {
            Ok(observed) if !observed.is_empty() => {
                debug!(days = observed.len(), "NASA POWER data fetched");
                ClimateReport {
                    origin: DataOrigin::Nasa,
                    location: city_location(),
                    days: observed,
                }
            }
            Ok(_) => {
                warn!("NASA POWER returned no usable days, using simulated climate");
                self.simulated_climate(start, days)
            }
            Err(e) => {
                warn!(error = %e, "NASA POWER unavailable, using simulated climate");
                self.simulated_climate(start, days)
            }
        }
    }

    /// Fire detections within [`FIRE_RADIUS_DEG`] of the city.
    pub async fn fires(&self, days: u32, today: NaiveDate) -> FireReport {
        let days = days.clamp(1, MAX_FIRE_DAYS);

        let fetched = match &self.firms {
            Some(client) => client
                .get_country_fires(COUNTRY_CODE, days)
                .await
                .map_err(|e| warn!(error = %e, "NASA FIRMS unavailable, using simulated fires"))
                .ok(),
            None => {
                debug!("No FIRMS MAP_KEY configured, using simulated fires");
                None
            }
        };

        let (origin, detections) = match fetched {
            Some(all) => {
                let nearby: Vec<_> = all
                    .into_iter()
                    .filter(|d| d.is_near(CITY_LATITUDE, CITY_LONGITUDE, FIRE_RADIUS_DEG))
                    .collect();
                (DataOrigin::Nasa, nearby)
            }
            None => (DataOrigin::Simulated, self.simulated_fires(days, today)),
        };

        FireReport {
            origin,
            location: city_location(),
            days,
            count: detections.len(),
            detections,
        }
    }

    fn simulated_climate(&self, start: NaiveDate, days: u32) -> ClimateReport {
        let generated = self.with_rng(|rng| {
            (0..days)
                .map(|offset| {
                    let date = start + Duration::days(i64::from(offset));
                    let (mean, rain, humidity) = MONTHLY_NORMALS[date.month0() as usize];
                    let temperature = mean + rng.between(-2.0, 2.0);
                    let precipitation = if rng.chance(0.35) {
                        rain * rng.between(0.5, 3.0)
                    } else {
                        0.0
                    };
                    DailyClimate {
                        date,
                        temperature: round1(temperature),
                        temperature_max: Some(round1(temperature + rng.between(5.0, 8.0))),
                        temperature_min: Some(round1(temperature - rng.between(4.0, 7.0))),
                        precipitation: Some(round1(precipitation)),
                        humidity: Some(round1(humidity + rng.between(-8.0, 8.0))),
                        wind_speed: Some(round1(rng.between(1.5, 4.5))),
                        solar_radiation: Some(round1(rng.between(4.0, 6.5))),
                    }
                })
                .collect()
        });

        ClimateReport {
            origin: DataOrigin::Simulated,
            location: city_location(),
            days: generated,
        }
    }

    fn simulated_fires(&self, days: u32, today: NaiveDate) -> Vec<FireDetection> {
        // Dry season (Jul-Oct) burns far more than the rest of the year.
        let max_per_day = if (7..=10).contains(&today.month()) { 6.0 } else { 2.0 };

        self.with_rng(|rng| {
            let count = (rng.between(0.0, max_per_day) * f64::from(days)) as usize;
            (0..count)
                .map(|_| {
                    let back = rng.pick(days as usize) as i64;
                    FireDetection {
                        latitude: CITY_LATITUDE + rng.between(-FIRE_RADIUS_DEG, FIRE_RADIUS_DEG),
                        longitude: CITY_LONGITUDE + rng.between(-FIRE_RADIUS_DEG, FIRE_RADIUS_DEG),
                        brightness: Some(round1(rng.between(310.0, 367.0))),
                        acquired_date: Some(today - Duration::days(back)),
                        acquired_time: format!("{:04}", 1700 + rng.pick(200)),
                        confidence: ["l", "n", "h"][rng.pick(3)].to_string(),
                        frp: Some(round1(rng.between(0.5, 40.0))),
                        daynight: if rng.chance(0.7) { "D" } else { "N" }.to_string(),
                    }
                })
                .collect()
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nothing listens on the discard port, so requests fail fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn offline_service() -> EnvironmentService {
        EnvironmentService::new(
            NasaPowerClient::with_base_url(UNREACHABLE),
            Some(FirmsClient::with_base_url(UNREACHABLE, "test-key")),
            Some(7),
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 15).unwrap()
    }

    #[tokio::test]
    async fn test_climate_falls_back_to_simulation() {
        let report = offline_service().climate(7, today()).await;
        assert_eq!(report.origin, DataOrigin::Simulated);
        assert_eq!(report.days.len(), 7);
        assert_eq!(report.days[0].date, NaiveDate::from_ymd_opt(2025, 8, 8).unwrap());
        assert_eq!(report.latest().unwrap().date, NaiveDate::from_ymd_opt(2025, 8, 14).unwrap());
        for day in &report.days {
            assert!((15.0..=30.0).contains(&day.temperature), "{day:?}");
            assert!(day.temperature_max.unwrap() > day.temperature);
            assert!(day.precipitation.unwrap() >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_climate_days_clamped() {
        let service = offline_service();
        assert_eq!(service.climate(0, today()).await.days.len(), 1);
        assert_eq!(service.climate(90, today()).await.days.len(), 30);
    }

    #[tokio::test]
    async fn test_fires_fall_back_and_stay_in_box() {
        let report = offline_service().fires(3, today()).await;
        assert_eq!(report.origin, DataOrigin::Simulated);
        assert_eq!(report.count, report.detections.len());
        assert!(report.count <= 18);
        for fire in &report.detections {
            assert!(fire.is_near(CITY_LATITUDE, CITY_LONGITUDE, FIRE_RADIUS_DEG));
        }
    }

    #[tokio::test]
    async fn test_no_map_key_means_simulated() {
        let service = EnvironmentService::new(NasaPowerClient::with_base_url(UNREACHABLE), None, Some(1));
        assert_eq!(service.fires(2, today()).await.origin, DataOrigin::Simulated);
    }

    #[tokio::test]
    async fn test_same_seed_same_simulation() {
        let a = offline_service().climate(5, today()).await;
        let b = offline_service().climate(5, today()).await;
        assert_eq!(a.days, b.days);
    }
}
