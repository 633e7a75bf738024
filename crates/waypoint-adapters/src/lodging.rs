//! Lodging search tool.
//!
//! The map provider has no dedicated lodging endpoint; lodging search is a
//! tier-keyed POI text search, which is exactly how the reference deployment
//! sources its hotel candidates.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use waypoint_kernel::{ToolClass, ToolError, ToolHandler, ToolSpec};

use crate::poi::required_str;
use crate::provider::MapProvider;

/// Registry name of the lodging tool.
pub const LODGING_SEARCH: &str = "lodging_search";

/// Options returned per search.
const RESULT_LIMIT: usize = 5;

/// Input schema for [`LODGING_SEARCH`].
pub fn lodging_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["city", "tier"],
        "properties": {
            "city": {"type": "string", "description": "City to search in"},
            "tier": {
                "type": "string",
                "enum": ["economy", "comfort", "luxury"],
                "description": "Accommodation price band"
            }
        },
        "additionalProperties": false
    })
}

/// Output schema for [`LODGING_SEARCH`].
pub fn lodging_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["options"],
        "properties": {
            "options": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "address", "tier"],
                    "properties": {
                        "name": {"type": "string"},
                        "address": {"type": "string"},
                        "tier": {"type": "string"}
                    }
                }
            }
        }
    })
}

/// Map a tier to the provider search keywords.
fn tier_keywords(tier: &str) -> &'static str {
    match tier {
        "economy" => "budget hotel",
        "luxury" => "luxury hotel",
        _ => "hotel",
    }
}

/// Tier-scoped lodging search.
pub struct LodgingSearchTool {
    provider: Arc<MapProvider>,
}

impl LodgingSearchTool {
    /// Build the registrable spec.
    pub fn spec(provider: Arc<MapProvider>) -> ToolSpec {
        ToolSpec::new(
            LODGING_SEARCH,
            "Find accommodation options in a city for the requested tier \
             (economy, comfort, luxury).",
            ToolClass::Provider,
            lodging_input_schema(),
            lodging_output_schema(),
            Arc::new(Self { provider }),
        )
    }
}

#[async_trait]
impl ToolHandler for LodgingSearchTool {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let city = required_str(&arguments, "city", LODGING_SEARCH)?;
        let tier = required_str(&arguments, "tier", LODGING_SEARCH)?;

        let options = self
            .provider
            .text_search(tier_keywords(tier), city, RESULT_LIMIT)
            .await
            .map_err(|e| ToolError::execution(LODGING_SEARCH, e))?;

        Ok(json!({
            "options": options.iter().map(|p| json!({
                "name": p.name,
                "address": p.address,
                "tier": tier
            })).collect::<Vec<_>>()
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
