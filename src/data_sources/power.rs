//! NASA POWER client.
//!
//! POWER (Prediction Of Worldwide Energy Resources) serves daily
//! meteorological and solar parameters for any point on Earth, derived
//! from MERRA-2 and CERES.
//!
//! # API Reference
//!
//! See: <https://power.larc.nasa.gov/docs/services/api/temporal/daily/>

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Base URL for the daily point endpoint.
const NASA_POWER_API_BASE: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Parameters requested on every call.
const PARAMETERS: &str = "T2M,T2M_MAX,T2M_MIN,PRECTOTCORR,RH2M,WS2M,ALLSKY_SFC_SW_DWN";

/// POWER marks missing values with this number.
const FILL_VALUE: f64 = -999.0;

/// Client for the NASA POWER daily API.
#[derive(Clone)]
pub struct NasaPowerClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for NasaPowerClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl NasaPowerClient {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::with_base_url(NASA_POWER_API_BASE)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch daily values between `start` and `end` (inclusive).
    ///
    /// Days whose mean temperature is missing are dropped.
    pub async fn get_daily(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailyClimate>> {
        let url = format!(
            "{}?parameters={}&community=RE&longitude={}&latitude={}&start={}&end={}&format=JSON",
            self.base_url,
            urlencoding::encode(PARAMETERS),
            longitude,
            latitude,
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let data = response.json::<PowerResponse>().await?;
        Ok(data.into_days())
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Raw response from the daily point endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PowerResponse {
    pub properties: PowerProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowerProperties {
    /// Parameter name → (YYYYMMDD → value).
    #[serde(default)]
    pub parameter: HashMap<String, BTreeMap<String, f64>>,
}

/// One day of climate data for the city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyClimate {
    pub date: NaiveDate,
    /// °C
    pub temperature: f64,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    /// mm/day
    pub precipitation: Option<f64>,
    /// %
    pub humidity: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    /// kWh/m²/day
    pub solar_radiation: Option<f64>,
}

impl PowerResponse {
    fn value(&self, parameter: &str, key: &str) -> Option<f64> {
        self.properties
            .parameter
            .get(parameter)
            .and_then(|series| series.get(key))
            .copied()
            .filter(|v| *v > FILL_VALUE + 1.0)
    }

    /// Flatten the per-parameter series into chronological days.
    pub fn into_days(self) -> Vec<DailyClimate> {
        let Some(t2m) = self.properties.parameter.get("T2M") else {
            return Vec::new();
        };

        t2m.keys()
            .filter_map(|key| {
                let date = NaiveDate::parse_from_str(key, "%Y%m%d").ok()?;
                let temperature = self.value("T2M", key)?;
                Some(DailyClimate {
                    date,
                    temperature,
                    temperature_max: self.value("T2M_MAX", key),
                    temperature_min: self.value("T2M_MIN", key),
                    precipitation: self.value("PRECTOTCORR", key),
                    humidity: self.value("RH2M", key),
                    wind_speed: self.value("WS2M", key),
                    solar_radiation: self.value("ALLSKY_SFC_SW_DWN", key),
                })
            })
            .collect()
    }
}
