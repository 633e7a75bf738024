//! Weather forecast tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use waypoint_kernel::{ToolClass, ToolError, ToolHandler, ToolSpec};

use crate::cache::ResponseCache;
use crate::poi::required_str;
use crate::provider::MapProvider;

/// Registry name of the weather tool.
pub const WEATHER_FORECAST: &str = "weather_forecast";

/// Input schema for [`WEATHER_FORECAST`].
pub fn weather_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["city"],
        "properties": {
            "city": {"type": "string", "description": "City to fetch the forecast for"}
        },
        "additionalProperties": false
    })
}

/// Output schema for [`WEATHER_FORECAST`].
pub fn weather_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["city", "daily"],
        "properties": {
            "city": {"type": "string"},
            "daily": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["date", "condition", "high_c", "low_c"],
                    "properties": {
                        "date": {"type": "string"},
                        "condition": {"type": "string"},
                        "high_c": {"type": "number"},
                        "low_c": {"type": "number"}
                    }
                }
            }
        }
    })
}

/// Multi-day city forecast backed by the map provider, fronted by a TTL
/// cache (forecasts go stale faster than POIs, so the TTL is shorter).
pub struct WeatherForecastTool {
    provider: Arc<MapProvider>,
    cache: Arc<ResponseCache>,
}

impl WeatherForecastTool {
    /// Build the registrable spec.
    pub fn spec(provider: Arc<MapProvider>, cache: Arc<ResponseCache>) -> ToolSpec {
        ToolSpec::new(
            WEATHER_FORECAST,
            "Fetch the multi-day weather forecast for a city: per-day \
             condition and high/low temperatures in °C.",
            ToolClass::Provider,
            weather_input_schema(),
            weather_output_schema(),
            Arc::new(Self { provider, cache }),
        )
    }
}

#[async_trait]
impl ToolHandler for WeatherForecastTool {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let city = required_str(&arguments, "city", WEATHER_FORECAST)?;

        let cache_key = format!("weather:{city}");
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let days = self
            .provider
            .forecast(city)
            .await
            .map_err(|e| ToolError::execution(WEATHER_FORECAST, e))?;

        let payload = json!({
            "city": city,
            "daily": days.iter().map(|d| json!({
                "date": d.date,
                "condition": d.condition,
                "high_c": d.high_c,
                "low_c": d.low_c
            })).collect::<Vec<_>>()
        });

        self.cache.insert(cache_key, payload.clone()).await;
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
