//! Provider tool handlers for Waypoint.
//!
//! Each module wraps one external capability behind the
//! [`waypoint_kernel::ToolHandler`] contract with declared input and output
//! schemas:
//!
//! - [`poi`] -- POI text search and geocoding over the map provider.
//! - [`weather`] -- Multi-day city forecast.
//! - [`lodging`] -- Tier-keyed accommodation search.
//! - [`images`] -- Photo lookup for itinerary decoration.
//! - [`cache`] -- TTL response cache fronting the slow-changing lookups.
//! - [`stubs`] -- Deterministic offline stand-ins with identical schemas.

pub mod cache;
pub mod error;
pub mod images;
pub mod lodging;
pub mod poi;
pub mod provider;
pub mod stubs;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

pub use cache::{CacheStats, ResponseCache};
pub use error::{AdapterError, Result};
pub use images::ImageLookupTool;
pub use lodging::LodgingSearchTool;
pub use poi::{GeocodeTool, PoiSearchTool};
pub use provider::{MapProvider, MapProviderConfig};
pub use stubs::{failing_spec, stub_toolset};
pub use weather::WeatherForecastTool;

use waypoint_kernel::ToolSpec;

/// Cache sizing shared by the provider toolset.
const CACHE_CAPACITY: u64 = 1024;

/// Build the full provider-backed toolset.
///
/// The image tool is included only when an Unsplash key is configured; the
/// map tools are mandatory because the planner cannot do anything useful
/// without them.
pub fn provider_toolset(
    amap_api_key: &str,
    unsplash_access_key: Option<&str>,
    poi_ttl: Duration,
    weather_ttl: Duration,
) -> Result<Vec<ToolSpec>> {
    let provider = Arc::new(MapProvider::new(MapProviderConfig::new(amap_api_key))?);
    let poi_cache = Arc::new(ResponseCache::new(CACHE_CAPACITY, poi_ttl));
    let weather_cache = Arc::new(ResponseCache::new(CACHE_CAPACITY, weather_ttl));

    let mut specs = vec![
        PoiSearchTool::spec(Arc::clone(&provider), poi_cache),
        GeocodeTool::spec(Arc::clone(&provider)),
        WeatherForecastTool::spec(Arc::clone(&provider), weather_cache),
        LodgingSearchTool::spec(provider),
    ];

    if let Some(key) = unsplash_access_key {
        specs.push(ImageLookupTool::spec(key)?);
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_kernel::ToolRegistry;

    #[test]
    fn provider_toolset_registers_cleanly() {
        let specs = provider_toolset(
            "test-key",
            Some("unsplash-key"),
            Duration::from_secs(3600),
            Duration::from_secs(1800),
        )
        .expect("toolset builds");
        assert_eq!(specs.len(), 5);

        let registry = ToolRegistry::new();
        for spec in specs {
            registry.register(spec).expect("unique names, valid schemas");
        }
        assert_eq!(registry.count(), 5);
    }

    #[test]
    fn provider_toolset_without_image_key_skips_image_tool() {
        let specs = provider_toolset(
            "test-key",
            None,
            Duration::from_secs(3600),
            Duration::from_secs(1800),
        )
        .expect("toolset builds");
        assert_eq!(specs.len(), 4);
    }

    #[test]
    fn provider_toolset_requires_map_key() {
        assert!(provider_toolset("", None, Duration::from_secs(1), Duration::from_secs(1)).is_err());
    }
}
