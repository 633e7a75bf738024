//! Deterministic stub tools.
//!
//! Same names and schemas as the provider-backed tools, but answers are
//! computed from the arguments alone: no network, no keys, and two identical
//! calls always return identical payloads.  Used by the offline CLI mode and
//! by end-to-end tests that need reproducible tool behavior.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use waypoint_kernel::{ToolClass, ToolError, ToolHandler, ToolSpec};

use crate::images::{IMAGE_LOOKUP, image_input_schema, image_output_schema};
use crate::lodging::{LODGING_SEARCH, lodging_input_schema, lodging_output_schema};
use crate::poi::{
    GEOCODE, POI_SEARCH, geocode_input_schema, geocode_output_schema, poi_input_schema,
    poi_output_schema, required_str,
};
use crate::weather::{WEATHER_FORECAST, weather_input_schema, weather_output_schema};

/// Every stub tool, ready for registration.
pub fn stub_toolset() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            POI_SEARCH,
            "Search points of interest by keyword within a city (stub).",
            ToolClass::Local,
            poi_input_schema(),
            poi_output_schema(),
            Arc::new(StubPoiHandler),
        ),
        ToolSpec::new(
            GEOCODE,
            "Resolve an address to coordinates (stub).",
            ToolClass::Local,
            geocode_input_schema(),
            geocode_output_schema(),
            Arc::new(StubGeocodeHandler),
        ),
        ToolSpec::new(
            WEATHER_FORECAST,
            "Fetch the multi-day weather forecast for a city (stub).",
            ToolClass::Local,
            weather_input_schema(),
            weather_output_schema(),
            Arc::new(StubWeatherHandler),
        ),
        ToolSpec::new(
            LODGING_SEARCH,
            "Find accommodation options for a tier (stub).",
            ToolClass::Local,
            lodging_input_schema(),
            lodging_output_schema(),
            Arc::new(StubLodgingHandler),
        ),
        ToolSpec::new(
            IMAGE_LOOKUP,
            "Look up photos matching a query (stub).",
            ToolClass::Local,
            image_input_schema(),
            image_output_schema(),
            Arc::new(StubImageHandler),
        ),
    ]
}

/// A spec whose handler always fails; for exercising tool-error paths.
pub fn failing_spec(name: impl Into<String>, reason: impl Into<String>) -> ToolSpec {
    let name = name.into();
    ToolSpec::new(
        name.clone(),
        "Always fails (stub)",
        ToolClass::Local,
        json!({"type": "object"}),
        json!({"type": "object"}),
        Arc::new(FailingHandler {
            name,
            reason: reason.into(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct StubPoiHandler;

#[async_trait]
impl ToolHandler for StubPoiHandler {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let keywords = required_str(&arguments, "keywords", POI_SEARCH)?;
        let city = required_str(&arguments, "city", POI_SEARCH)?;

        let pois: Vec<Value> = (1..=3)
            .map(|n| {
                json!({
                    "id": format!("stub-poi-{}-{n}", slug(keywords)),
                    "name": format!("{city} {keywords} #{n}"),
                    "category": "scenic spot",
                    "address": format!("{n} Example Road, {city}"),
                    "location": {
                        "longitude": 116.0 + n as f64 * 0.01,
                        "latitude": 39.9 + n as f64 * 0.01
                    }
                })
            })
            .collect();

        Ok(json!({"pois": pois}))
    }
}

struct StubGeocodeHandler;

#[async_trait]
impl ToolHandler for StubGeocodeHandler {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let address = required_str(&arguments, "address", GEOCODE)?;
        Ok(json!({
            "formatted_address": address,
            "location": {"longitude": 116.397026, "latitude": 39.918058}
        }))
    }
}

struct StubWeatherHandler;

#[async_trait]
impl ToolHandler for StubWeatherHandler {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let city = required_str(&arguments, "city", WEATHER_FORECAST)?;
        let conditions = ["sunny", "cloudy", "light rain"];

        let daily: Vec<Value> = (0..7)
            .map(|n| {
                json!({
                    "date": format!("day+{n}"),
                    "condition": conditions[n % conditions.len()],
                    "high_c": 26.0 - n as f64,
                    "low_c": 15.0 - n as f64
                })
            })
            .collect();

        Ok(json!({"city": city, "daily": daily}))
    }
}

struct StubLodgingHandler;

#[async_trait]
impl ToolHandler for StubLodgingHandler {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let city = required_str(&arguments, "city", LODGING_SEARCH)?;
        let tier = required_str(&arguments, "tier", LODGING_SEARCH)?;

        Ok(json!({
            "options": [{
                "name": format!("{city} {tier} stay"),
                "address": format!("88 Central Avenue, {city}"),
                "tier": tier
            }]
        }))
    }
}

struct StubImageHandler;

#[async_trait]
impl ToolHandler for StubImageHandler {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let query = required_str(&arguments, "query", IMAGE_LOOKUP)?;
        Ok(json!({
            "images": [{
                "id": format!("stub-img-{}", slug(query)),
                "url": format!("https://images.example/{}.jpg", slug(query))
            }]
        }))
    }
}

struct FailingHandler {
    name: String,
    reason: String,
}

#[async_trait]
impl ToolHandler for FailingHandler {
    async fn call(&self, _arguments: Value) -> waypoint_kernel::Result<Value> {
        Err(ToolError::execution(&self.name, &self.reason))
    }
}

fn slug(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
