//! Agent engine for Waypoint.
//!
//! This crate implements the reasoning side of the trip planner: the loop
//! that turns a [`trip::TripRequest`] into a validated
//! [`trip::ItineraryPlan`] by repeatedly consulting a language model,
//! dispatching the tool calls it requests through `waypoint-kernel`, and
//! feeding results back until a well-formed final answer terminates the run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   fan-out    ┌─────────────────────────┐
//! │ TripPlanner  │─────────────>│ attraction / weather /  │
//! │ (orchestrate)│              │ lodging agent loops     │
//! └──────┬───────┘   join       └───────────┬─────────────┘
//!        │                                  │
//!        v                                  v
//! ┌──────────────┐              ┌─────────────────────────┐
//! │  synthesis   │<─────────────│ facet outputs / markers │
//! │  agent loop  │              └─────────────────────────┘
//! └──────┬───────┘
//!        v
//!   ItineraryPlan (invariant-checked)
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Model client trait, HTTP implementation, wire types.
//! - [`context`] -- Per-run conversation state with bounded eviction.
//! - [`agent`] -- The shared role-driven reasoning loop.
//! - [`roles`] -- The shipped planning roles and facet requirements.
//! - [`orchestrator`] -- Fan-out/join plan controller.
//! - [`trip`] -- Request and itinerary data model.
//! - [`config`] -- Environment-driven settings.
//! - [`error`] -- Agent and planning error types.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod roles;
pub mod trip;

// Re-export the most commonly used types at the crate root.
pub use agent::{AgentOutcome, AgentRole, AgentRunner, FailureCause, LoopConfig};
pub use config::Settings;
pub use context::{ContextConfig, Conversation};
pub use error::{AgentError, PlanError, Result};
pub use llm::{Decision, HttpModelClient, LlmConfig, Message, ModelClient, Role};
pub use orchestrator::TripPlanner;
pub use roles::{Facet, RoleSet, SynthesisRequirements};
pub use trip::{
    AccommodationTier, Activity, DayPlan, FacetOutcome, ItineraryPlan, LodgingSuggestion,
    PoiRef, TimeWindow, TripRequest, WeatherSummary,
};
