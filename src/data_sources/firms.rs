//! NASA FIRMS client.
//!
//! FIRMS (Fire Information for Resource Management System) publishes
//! active fire detections from MODIS and VIIRS within hours of satellite
//! overpass. The country endpoint returns CSV.
//!
//! # API Reference
//!
//! See: <https://firms.modaps.eosdis.nasa.gov/api/country/>
//!
//! A MAP_KEY is required for every request.

use std::time::Duration;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Base URL for the FIRMS API.
const FIRMS_API_BASE: &str = "https://firms.modaps.eosdis.nasa.gov";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Near-real-time VIIRS product.
const SOURCE: &str = "VIIRS_SNPP_NRT";

/// Client for the FIRMS country CSV API.
#[derive(Clone)]
pub struct FirmsClient {
    client: reqwest::Client,
    base_url: String,
    map_key: String,
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl FirmsClient {
    /// Create a new FIRMS client.
    ///
    /// # Arguments
    ///
    /// * `map_key` - FIRMS MAP_KEY.
    pub fn new(map_key: &str) -> Self {
        Self::with_base_url(FIRMS_API_BASE, map_key)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, map_key: &str) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            map_key: map_key.to_string(),
        }
    }

    /// Fetch detections for a country over the last `days` days (1..=10).
    ///
    /// # Arguments
    ///
    /// * `country` - ISO 3166-1 alpha-3 code (e.g., "BOL")
    /// * `days` - Day range, clamped to what the API accepts
    pub async fn get_country_fires(
        &self,
        country: &str,
        days: u32,
    ) -> anyhow::Result<Vec<FireDetection>> {
        let url = format!(
            "{}/api/country/csv/{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.map_key),
            SOURCE,
            country.to_uppercase(),
            days.clamp(1, 10),
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        parse_csv(&body)
    }
}

/// A single active-fire pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireDetection {
    pub latitude: f64,
    pub longitude: f64,
    /// Kelvin (I-4 channel).
    pub brightness: Option<f64>,
    pub acquired_date: Option<NaiveDate>,
    /// HHMM, UTC.
    pub acquired_time: String,
    /// `l`, `n` or `h` for VIIRS.
    pub confidence: String,
    /// Fire radiative power, MW.
    pub frp: Option<f64>,
    pub daynight: String,
}

impl FireDetection {
    /// Whether the detection falls within `radius_deg` of a point on both axes.
    pub fn is_near(&self, latitude: f64, longitude: f64, radius_deg: f64) -> bool {
        (self.latitude - latitude).abs() <= radius_deg
            && (self.longitude - longitude).abs() <= radius_deg
    }
}

/// One CSV row as FIRMS publishes it.
///
/// Unparseable numbers and dates become `None` rather than failing the row.
#[derive(Debug, Deserialize)]
struct FirmsRow {
    #[serde(deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
    /// VIIRS reports `bright_ti4`, MODIS `brightness`.
    #[serde(default, alias = "brightness", deserialize_with = "csv::invalid_option")]
    bright_ti4: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    acq_date: Option<NaiveDate>,
    #[serde(default)]
    acq_time: String,
    #[serde(default)]
    confidence: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    frp: Option<f64>,
    #[serde(default)]
    daynight: String,
}

impl FirmsRow {
    fn into_detection(self) -> Option<FireDetection> {
        Some(FireDetection {
            latitude: self.latitude?,
            longitude: self.longitude?,
            brightness: self.bright_ti4,
            acquired_date: self.acq_date,
            acquired_time: self.acq_time,
            confidence: self.confidence,
            frp: self.frp,
            daynight: self.daynight,
        })
    }
}

/// Parse the FIRMS CSV body.
///
/// Columns are located by header name. A body without `latitude` and
/// `longitude` headers (FIRMS answers errors in plain text) is rejected;
/// rows that fail to parse or lack coordinates are skipped.
pub fn parse_csv(body: &str) -> anyhow::Result<Vec<FireDetection>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = rdr.headers().context("FIRMS CSV header")?;
    if !headers.iter().any(|h| h == "latitude") || !headers.iter().any(|h| h == "longitude") {
        bail!(
            "unexpected FIRMS response: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }

    Ok(rdr
        .deserialize::<FirmsRow>()
        .filter_map(Result::ok)
        .filter_map(FirmsRow::into_detection)
        .collect())
}
