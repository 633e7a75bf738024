//! POI search and geocoding tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use waypoint_kernel::{ToolClass, ToolError, ToolHandler, ToolSpec};

use crate::cache::ResponseCache;
use crate::provider::MapProvider;

/// Registry name of the POI search tool.
pub const POI_SEARCH: &str = "poi_search";
/// Registry name of the geocoding tool.
pub const GEOCODE: &str = "geocode";

/// Default number of POIs returned when the model does not ask for more.
const DEFAULT_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// Input schema for [`POI_SEARCH`].
pub fn poi_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["keywords", "city"],
        "properties": {
            "keywords": {"type": "string", "description": "What to search for, e.g. \"museum\""},
            "city": {"type": "string", "description": "City to search in"},
            "limit": {"type": "integer", "minimum": 1, "maximum": 25}
        },
        "additionalProperties": false
    })
}

/// Output schema for [`POI_SEARCH`].
pub fn poi_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["pois"],
        "properties": {
            "pois": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "name"],
                    "properties": {
                        "id": {"type": "string"},
                        "name": {"type": "string"},
                        "category": {"type": "string"},
                        "address": {"type": "string"},
                        "location": {
                            "type": "object",
                            "required": ["longitude", "latitude"],
                            "properties": {
                                "longitude": {"type": "number"},
                                "latitude": {"type": "number"}
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Input schema for [`GEOCODE`].
pub fn geocode_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["address"],
        "properties": {
            "address": {"type": "string", "description": "Address or place name to resolve"},
            "city": {"type": "string"}
        },
        "additionalProperties": false
    })
}

/// Output schema for [`GEOCODE`].
pub fn geocode_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["formatted_address", "location"],
        "properties": {
            "formatted_address": {"type": "string"},
            "location": {
                "type": "object",
                "required": ["longitude", "latitude"],
                "properties": {
                    "longitude": {"type": "number"},
                    "latitude": {"type": "number"}
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// POI search
// ---------------------------------------------------------------------------

/// Keyword POI search backed by the map provider, fronted by a TTL cache.
pub struct PoiSearchTool {
    provider: Arc<MapProvider>,
    cache: Arc<ResponseCache>,
}

impl PoiSearchTool {
    /// Build the registrable spec.
    pub fn spec(provider: Arc<MapProvider>, cache: Arc<ResponseCache>) -> ToolSpec {
        ToolSpec::new(
            POI_SEARCH,
            "Search points of interest by keyword within a city. Returns up \
             to `limit` matches with id, name, category, address and \
             coordinates.",
            ToolClass::Provider,
            poi_input_schema(),
            poi_output_schema(),
            Arc::new(Self { provider, cache }),
        )
    }
}

#[async_trait]
impl ToolHandler for PoiSearchTool {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let keywords = required_str(&arguments, "keywords", POI_SEARCH)?;
        let city = required_str(&arguments, "city", POI_SEARCH)?;
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_LIMIT, |n| n as usize);

        let cache_key = format!("poi:{city}:{keywords}:{limit}");
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let pois = self
            .provider
            .text_search(keywords, city, limit)
            .await
            .map_err(|e| ToolError::execution(POI_SEARCH, e))?;

        let payload = json!({
            "pois": pois.iter().map(|p| json!({
                "id": p.id,
                "name": p.name,
                "category": p.category,
                "address": p.address,
                "location": {"longitude": p.longitude, "latitude": p.latitude}
            })).collect::<Vec<_>>()
        });

        self.cache.insert(cache_key, payload.clone()).await;
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

/// Address-to-coordinates resolution.
pub struct GeocodeTool {
    provider: Arc<MapProvider>,
}

impl GeocodeTool {
    /// Build the registrable spec.
    pub fn spec(provider: Arc<MapProvider>) -> ToolSpec {
        ToolSpec::new(
            GEOCODE,
            "Resolve an address or place name to coordinates.",
            ToolClass::Provider,
            geocode_input_schema(),
            geocode_output_schema(),
            Arc::new(Self { provider }),
        )
    }
}

#[async_trait]
impl ToolHandler for GeocodeTool {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let address = required_str(&arguments, "address", GEOCODE)?;
        let city = arguments.get("city").and_then(Value::as_str);

        let geocoded = self
            .provider
            .geocode(address, city)
            .await
            .map_err(|e| ToolError::execution(GEOCODE, e))?;

        Ok(json!({
            "formatted_address": geocoded.formatted_address,
            "location": {
                "longitude": geocoded.longitude,
                "latitude": geocoded.latitude
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Shared argument helpers
// ---------------------------------------------------------------------------

/// Extract a required string argument.
///
/// The input schema already guarantees presence; this guards handlers that
/// are invoked directly (tests, future callers) without the invoker's
/// validation in front.
pub(crate) fn required_str<'a>(
    arguments: &'a Value,
    key: &str,
    tool: &str,
) -> waypoint_kernel::Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments {
            name: tool.to_owned(),
            reason: format!("missing required string field `{key}`"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_kernel::CompiledSchema;

    #[test]
    fn schemas_compile() {
        for schema in [
            poi_input_schema(),
            poi_output_schema(),
            geocode_input_schema(),
            geocode_output_schema(),
        ] {
            CompiledSchema::compile(&schema).expect("schema compiles");
        }
    }

    #[test]
    fn poi_input_schema_rejects_extra_fields() {
        let schema = CompiledSchema::compile(&poi_input_schema()).unwrap();
        assert!(schema.validate(&json!({"keywords": "museum", "city": "Beijing"})).is_ok());
        assert!(schema
            .validate(&json!({"keywords": "museum", "city": "Beijing", "radius": 5}))
            .is_err());
    }

    #[test]
    fn required_str_reports_missing_field() {
        let err = required_str(&json!({}), "city", POI_SEARCH).expect_err("missing");
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
