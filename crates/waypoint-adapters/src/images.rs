//! Image lookup tool.
//!
//! Thin wrapper over the Unsplash search API, used to decorate itineraries
//! with destination photos.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use waypoint_kernel::{ToolClass, ToolError, ToolHandler, ToolSpec};

use crate::error::{AdapterError, Result};
use crate::poi::required_str;

/// Registry name of the image tool.
pub const IMAGE_LOOKUP: &str = "image_lookup";

/// Unsplash search endpoint.
const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

/// Default number of images returned.
const DEFAULT_LIMIT: u64 = 3;

/// Input schema for [`IMAGE_LOOKUP`].
pub fn image_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["query"],
        "properties": {
            "query": {"type": "string", "description": "Search term, e.g. a landmark name"},
            "limit": {"type": "integer", "minimum": 1, "maximum": 10}
        },
        "additionalProperties": false
    })
}

/// Output schema for [`IMAGE_LOOKUP`].
pub fn image_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["images"],
        "properties": {
            "images": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "url"],
                    "properties": {
                        "id": {"type": "string"},
                        "url": {"type": "string"},
                        "description": {"type": "string"}
                    }
                }
            }
        }
    })
}

/// Photo search by keyword.
pub struct ImageLookupTool {
    client: reqwest::Client,
    access_key: String,
}

impl ImageLookupTool {
    /// Build the registrable spec.
    pub fn spec(access_key: impl Into<String>) -> Result<ToolSpec> {
        let access_key = access_key.into();
        if access_key.is_empty() {
            return Err(AdapterError::MissingCredential {
                name: "UNSPLASH_ACCESS_KEY".into(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(ToolSpec::new(
            IMAGE_LOOKUP,
            "Look up photos matching a query. Returns image URLs suitable \
             for illustrating an itinerary.",
            ToolClass::Provider,
            image_input_schema(),
            image_output_schema(),
            Arc::new(Self { client, access_key }),
        ))
    }
}

#[async_trait]
impl ToolHandler for ImageLookupTool {
    async fn call(&self, arguments: Value) -> waypoint_kernel::Result<Value> {
        let query = required_str(&arguments, "query", IMAGE_LOOKUP)?;
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_LIMIT);

        let per_page = limit.to_string();
        let params: [(&str, &str); 3] = [
            ("query", query),
            ("per_page", &per_page),
            ("client_id", &self.access_key),
        ];
        let response = self
            .client
            .get(UNSPLASH_SEARCH_URL)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolError::execution(IMAGE_LOOKUP, e))?;

        if !response.status().is_success() {
            return Err(ToolError::execution(
                IMAGE_LOOKUP,
                format!("status {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::execution(IMAGE_LOOKUP, e))?;

        Ok(map_results(&body))
    }
}

fn map_results(body: &Value) -> Value {
    let images: Vec<Value> = body
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(Value::as_str)?;
                    let url = item.pointer("/urls/regular").and_then(Value::as_str)?;
                    let mut image = json!({"id": id, "url": url});
                    if let Some(desc) = item.get("description").and_then(Value::as_str) {
                        image["description"] = json!(desc);
                    }
                    Some(image)
                })
                .collect()
        })
        .unwrap_or_default();

    json!({"images": images})
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
        CompiledSchema::compile(&image_input_schema()).expect("input compiles");
        CompiledSchema::compile(&image_output_schema()).expect("output compiles");
    }

    #[test]
    fn map_results_extracts_urls() {
        let body = json!({
            "results": [
                {
                    "id": "abc",
                    "urls": {"regular": "https://images.example/abc.jpg"},
                    "description": "Forbidden City at dusk"
                },
                {"id": "no-urls"}
            ]
        });

        let mapped = map_results(&body);
        let images = mapped["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["url"], "https://images.example/abc.jpg");
        assert_eq!(images[0]["description"], "Forbidden City at dusk");
    }

    #[test]
    fn map_results_validates_against_output_schema() {
        let schema = CompiledSchema::compile(&image_output_schema()).unwrap();
        let body = json!({
            "results": [{"id": "abc", "urls": {"regular": "https://images.example/abc.jpg"}}]
        });
        assert!(schema.validate(&map_results(&body)).is_ok());
    }

    #[test]
    fn missing_access_key_rejected() {
        assert!(matches!(
            ImageLookupTool::spec(""),
            Err(AdapterError::MissingCredential { .. })
        ));
    }
}
