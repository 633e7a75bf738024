//! The shipped planning roles.
//!
//! Four roles drive a trip plan: three facet agents (attractions, weather,
//! lodging) that may run concurrently, and the synthesis agent that folds
//! their outputs into the day-by-day itinerary.  Each role is plain
//! configuration — prompt, allowed tools, output schema — consumed by the
//! shared loop in [`crate::agent`].

use serde_json::json;

use crate::agent::AgentRole;

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

/// One sub-result category contributed to the final plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Attractions,
    Weather,
    Lodging,
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Attractions => "attractions",
            Self::Weather => "weather",
            Self::Lodging => "lodging",
        };
        write!(f, "{s}")
    }
}

/// Which facets the synthesis stage cannot proceed without.
///
/// Requiredness is deployment configuration, not orchestrator logic: a
/// deployment that treats lodging as mandatory flips one flag instead of
/// patching the control flow.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequirements {
    pub attractions: bool,
    pub weather: bool,
    pub lodging: bool,
}

impl SynthesisRequirements {
    /// Whether the given facet is required.
    pub fn requires(&self, facet: Facet) -> bool {
        match facet {
            Facet::Attractions => self.attractions,
            Facet::Weather => self.weather,
            Facet::Lodging => self.lodging,
        }
    }
}

impl Default for SynthesisRequirements {
    fn default() -> Self {
        // An itinerary without attractions is not an itinerary; weather and
        // lodging degrade to markers.
        Self {
            attractions: true,
            weather: false,
            lodging: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Role set
// ---------------------------------------------------------------------------

/// The four roles used by one planner deployment.
#[derive(Debug, Clone)]
pub struct RoleSet {
    pub attraction: AgentRole,
    pub weather: AgentRole,
    pub lodging: AgentRole,
    pub synthesis: AgentRole,
}

impl Default for RoleSet {
    fn default() -> Self {
        Self {
            attraction: attraction_role(),
            weather: weather_role(),
            lodging: lodging_role(),
            synthesis: synthesis_role(),
        }
    }
}

/// Attraction agent: finds POIs matching the traveler's preferences.
pub fn attraction_role() -> AgentRole {
    AgentRole::new(
        "attraction",
        "You are the attraction agent for a trip planner. Use the available \
         tools to find points of interest in the destination city that match \
         the traveler's preferences. Prefer well-known sights and spread your \
         picks across categories. When you have enough candidates (roughly \
         three per trip day), answer with the final JSON.",
        ["poi_search".to_string(), "geocode".to_string()],
        json!({
            "type": "object",
            "required": ["attractions"],
            "properties": {
                "attractions": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["id", "name"],
                        "properties": {
                            "id": {"type": "string"},
                            "name": {"type": "string"},
                            "address": {"type": "string"},
                            "category": {"type": "string"}
                        }
                    }
                }
            }
        }),
    )
}

/// Weather agent: summarizes the forecast for the trip window.
pub fn weather_role() -> AgentRole {
    AgentRole::new(
        "weather",
        "You are the weather agent for a trip planner. Look up the forecast \
         for the destination city and summarize conditions over the trip \
         dates, flagging days that need indoor alternatives.",
        ["weather_forecast".to_string()],
        json!({
            "type": "object",
            "required": ["summary"],
            "properties": {
                "summary": {"type": "string"},
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
        }),
    )
}

/// Lodging agent: recommends one place to stay in the requested tier.
pub fn lodging_role() -> AgentRole {
    AgentRole::new(
        "lodging",
        "You are the lodging agent for a trip planner. Search for \
         accommodation in the destination city matching the requested tier \
         and pick the single best option, favoring central locations.",
        ["lodging_search".to_string(), "poi_search".to_string()],
        json!({
            "type": "object",
            "required": ["lodging"],
            "properties": {
                "lodging": {
                    "type": "object",
                    "required": ["name", "address"],
                    "properties": {
                        "name": {"type": "string"},
                        "address": {"type": "string"},
                        "tier": {"type": "string", "enum": ["economy", "comfort", "luxury"]},
                        "price_hint": {"type": "string"}
                    }
                }
            }
        }),
    )
}

/// Synthesis agent: folds facet outputs into the day-by-day itinerary.
///
/// No tools: everything it needs arrives in the task message.
pub fn synthesis_role() -> AgentRole {
    AgentRole::new(
        "itinerary",
        "You are the itinerary agent for a trip planner. You receive the trip \
         request and the gathered facts (attractions, and possibly weather \
         and lodging). Produce a day-by-day itinerary covering exactly the \
         requested number of days. Within each day, order activities by time \
         and never let time windows overlap. Use 24-hour HH:MM times. Only \
         schedule attractions you were given.",
        [],
        json!({
            "type": "object",
            "required": ["days"],
            "properties": {
                "days": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["day", "activities"],
                        "properties": {
                            "day": {"type": "integer", "minimum": 1},
                            "activities": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["poi_id", "poi_name", "start", "end"],
                                    "properties": {
                                        "poi_id": {"type": "string"},
                                        "poi_name": {"type": "string"},
                                        "start": {
                                            "type": "string",
                                            "pattern": "^([01][0-9]|2[0-3]):[0-5][0-9]$"
                                        },
                                        "end": {
                                            "type": "string",
                                            "pattern": "^([01][0-9]|2[0-3]):[0-5][0-9]$"
                                        },
                                        "note": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_kernel::CompiledSchema;

    #[test]
    fn all_role_schemas_compile() {
        for role in [
            attraction_role(),
            weather_role(),
            lodging_role(),
            synthesis_role(),
        ] {
            CompiledSchema::compile(&role.output_schema)
                .unwrap_or_else(|e| panic!("schema for `{}` failed: {e}", role.name));
        }
    }

    #[test]
    fn synthesis_schema_accepts_wellformed_day() {
        let schema = CompiledSchema::compile(&synthesis_role().output_schema).unwrap();
        let instance = json!({
            "days": [{
                "day": 1,
                "activities": [{
                    "poi_id": "p1",
                    "poi_name": "Forbidden City",
                    "start": "09:00",
                    "end": "12:00"
                }]
            }]
        });
        assert!(schema.validate(&instance).is_ok());
    }

    #[test]
    fn synthesis_schema_rejects_bad_time_format() {
        let schema = CompiledSchema::compile(&synthesis_role().output_schema).unwrap();
        let instance = json!({
            "days": [{
                "day": 1,
                "activities": [{
                    "poi_id": "p1",
                    "poi_name": "Forbidden City",
                    "start": "9am",
                    "end": "noon"
                }]
            }]
        });
        assert!(schema.validate(&instance).is_err());
    }

    #[test]
    fn default_requirements_need_attractions_only() {
        let req = SynthesisRequirements::default();
        assert!(req.requires(Facet::Attractions));
        assert!(!req.requires(Facet::Weather));
        assert!(!req.requires(Facet::Lodging));
    }

    #[test]
    fn facet_agents_have_disjoint_conversations_but_shared_tools() {
        let roles = RoleSet::default();
        assert!(roles.attraction.allowed_tools.contains("poi_search"));
        assert!(roles.lodging.allowed_tools.contains("poi_search"));
        assert!(!roles.weather.allowed_tools.contains("poi_search"));
        assert!(roles.synthesis.allowed_tools.is_empty());
    }
}
