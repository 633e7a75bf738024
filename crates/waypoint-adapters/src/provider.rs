//! Map provider client.
//!
//! One HTTP client over a RESTful map API exposing the three capabilities
//! the planner needs: POI text search, geocoding, and a multi-day weather
//! forecast.  Endpoint paths and response shapes follow the Amap web-service
//! conventions; the tool layer never sees this wire format, only the typed
//! results.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::{AdapterError, Result};

/// Default web-service base URL.
const DEFAULT_BASE_URL: &str = "https://restapi.amap.com/v3";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the map provider.
#[derive(Debug, Clone)]
pub struct MapProviderConfig {
    /// Web-service API key.
    pub api_key: String,
    /// Base URL for the REST API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl MapProviderConfig {
    /// Config with the public endpoint and a 10s timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub id: String,
    pub name: String,
    pub category: String,
    pub address: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// A geocoded address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// One day of forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub date: String,
    pub condition: String,
    pub high_c: f64,
    pub low_c: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the map provider.
pub struct MapProvider {
    client: reqwest::Client,
    config: MapProviderConfig,
}

impl MapProvider {
    /// Create a provider client, validating the base URL eagerly.
    pub fn new(config: MapProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AdapterError::MissingCredential {
                name: "AMAP_API_KEY".into(),
            });
        }
        Url::parse(&config.base_url).map_err(|e| AdapterError::Upstream {
            reason: format!("invalid base url `{}`: {e}", config.base_url),
        })?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Keyword POI search scoped to one city.
    pub async fn text_search(&self, keywords: &str, city: &str, limit: usize) -> Result<Vec<Poi>> {
        let body = self
            .request(
                "place/text",
                &[
                    ("keywords", keywords),
                    ("city", city),
                    ("citylimit", "true"),
                    ("offset", &limit.to_string()),
                ],
            )
            .await?;
        parse_pois(&body)
    }

    /// Resolve an address to coordinates.
    pub async fn geocode(&self, address: &str, city: Option<&str>) -> Result<GeocodeResult> {
        let mut params = vec![("address", address)];
        if let Some(city) = city {
            params.push(("city", city));
        }
        let body = self.request("geocode/geo", &params).await?;
        parse_geocode(&body)
    }

    /// Multi-day forecast for a city.
    pub async fn forecast(&self, city: &str) -> Result<Vec<ForecastDay>> {
        let body = self
            .request("weather/weatherInfo", &[("city", city), ("extensions", "all")])
            .await?;
        parse_forecast(&body)
    }

    async fn request(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(%path, "map provider request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Upstream {
                reason: format!("status {}", response.status()),
            });
        }

        let body: Value = response.json().await?;

        // The provider signals failure in-band: status "1" is success.
        if body.get("status").and_then(Value::as_str) != Some("1") {
            let info = body
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error");
            return Err(AdapterError::Provider { info: info.into() });
        }

        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn parse_pois(body: &Value) -> Result<Vec<Poi>> {
    let pois = body
        .get("pois")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::Decode {
            reason: "response has no `pois` array".into(),
        })?;

    Ok(pois
        .iter()
        .filter_map(|item| {
            let (longitude, latitude) =
                parse_location(item.get("location").and_then(Value::as_str)?)?;
            Some(Poi {
                id: str_field(item, "id"),
                name: str_field(item, "name"),
                category: str_field(item, "type"),
                address: str_field(item, "address"),
                longitude,
                latitude,
            })
        })
        .collect())
}

fn parse_geocode(body: &Value) -> Result<GeocodeResult> {
    let first = body
        .pointer("/geocodes/0")
        .ok_or_else(|| AdapterError::Decode {
            reason: "response has no geocodes".into(),
        })?;

    let (longitude, latitude) = first
        .get("location")
        .and_then(Value::as_str)
        .and_then(parse_location)
        .ok_or_else(|| AdapterError::Decode {
            reason: "geocode entry has no parsable location".into(),
        })?;

    Ok(GeocodeResult {
        formatted_address: str_field(first, "formatted_address"),
        longitude,
        latitude,
    })
}

fn parse_forecast(body: &Value) -> Result<Vec<ForecastDay>> {
    let casts = body
        .pointer("/forecasts/0/casts")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::Decode {
            reason: "response has no forecast casts".into(),
        })?;

    Ok(casts
        .iter()
        .map(|cast| ForecastDay {
            date: str_field(cast, "date"),
            condition: str_field(cast, "dayweather"),
            high_c: num_field(cast, "daytemp"),
            low_c: num_field(cast, "nighttemp"),
        })
        .collect())
}

/// Split a `"lng,lat"` pair.
fn parse_location(raw: &str) -> Option<(f64, f64)> {
    let (lng, lat) = raw.split_once(',')?;
    Some((lng.trim().parse().ok()?, lat.trim().parse().ok()?))
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Temperatures arrive as strings; tolerate numbers too.
fn num_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_location_splits_pair() {
        assert_eq!(parse_location("116.397,39.909"), Some((116.397, 39.909)));
        assert_eq!(parse_location("116.397, 39.909"), Some((116.397, 39.909)));
        assert!(parse_location("116.397").is_none());
        assert!(parse_location("x,y").is_none());
    }

    #[test]
    fn parse_pois_maps_fields() {
        let body = json!({
            "status": "1",
            "pois": [{
                "id": "B000A60DA1",
                "name": "Forbidden City",
                "type": "scenic spot",
                "address": "4 Jingshan Front St",
                "location": "116.397026,39.918058"
            }, {
                // Entry without a location is skipped.
                "id": "B000A60DA2",
                "name": "No Location"
            }]
        });

        let pois = parse_pois(&body).expect("parses");
        assert_eq!(pois.len(), 1);
        assert_eq!(pois[0].name, "Forbidden City");
        assert_eq!(pois[0].category, "scenic spot");
        assert!((pois[0].longitude - 116.397026).abs() < 1e-9);
    }

    #[test]
    fn parse_pois_without_array_fails() {
        assert!(parse_pois(&json!({"status": "1"})).is_err());
    }

    #[test]
    fn parse_geocode_takes_first_entry() {
        let body = json!({
            "status": "1",
            "geocodes": [{
                "formatted_address": "Beijing, Dongcheng, Jingshan Front St 4",
                "location": "116.397026,39.918058"
            }]
        });

        let geocoded = parse_geocode(&body).expect("parses");
        assert!(geocoded.formatted_address.contains("Dongcheng"));
        assert!((geocoded.latitude - 39.918058).abs() < 1e-9);
    }

    #[test]
    fn parse_forecast_reads_casts() {
        let body = json!({
            "status": "1",
            "forecasts": [{
                "city": "Beijing",
                "casts": [
                    {"date": "2026-09-01", "dayweather": "sunny", "daytemp": "28", "nighttemp": "17"},
                    {"date": "2026-09-02", "dayweather": "cloudy", "daytemp": "26", "nighttemp": "16"}
                ]
            }]
        });

        let days = parse_forecast(&body).expect("parses");
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].condition, "sunny");
        assert!((days[0].high_c - 28.0).abs() < f64::EPSILON);
        assert!((days[1].low_c - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_api_key_rejected() {
        let config = MapProviderConfig {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(10),
        };
        assert!(matches!(
            MapProvider::new(config),
            Err(AdapterError::MissingCredential { .. })
        ));
    }
}
