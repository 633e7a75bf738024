//! Plan controller.
//!
//! [`TripPlanner::plan`] is the public operation of the engine: it fans the
//! three facet agents out as concurrent tasks, joins them, runs the synthesis
//! agent over their combined output, and assembles the final
//! [`ItineraryPlan`].
//!
//! Failure policy (see also [`crate::roles::SynthesisRequirements`]):
//!
//! - A failed facet agent becomes an `unavailable` marker unless the
//!   deployment marks that facet required, in which case the whole request
//!   fails with a [`PlanError::PlanningFailure`] naming the facet.
//! - The orchestrator never retries a failed agent; retries live inside the
//!   agent loop.
//! - Structural invariants are re-checked on the assembled plan; a violation
//!   is a [`PlanError::InvariantViolation`] and is never repaired in place.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentOutcome, AgentRunner, FailureCause};
use crate::error::PlanError;
use crate::roles::{Facet, RoleSet, SynthesisRequirements};
use crate::trip::{
    Activity, DayPlan, FacetOutcome, ItineraryPlan, LodgingSuggestion, PoiRef, TimeWindow,
    TripRequest, WeatherSummary,
};

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Top-level controller: one instance serves many concurrent `plan` calls.
#[derive(Clone)]
pub struct TripPlanner {
    runner: AgentRunner,
    roles: RoleSet,
    requirements: SynthesisRequirements,
}

impl TripPlanner {
    /// Create a planner with the default role set and requirements.
    pub fn new(runner: AgentRunner) -> Self {
        Self {
            runner,
            roles: RoleSet::default(),
            requirements: SynthesisRequirements::default(),
        }
    }

    /// Replace the role set.
    pub fn with_roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    /// Replace the facet requirements.
    pub fn with_requirements(mut self, requirements: SynthesisRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Plan a trip.
    pub async fn plan(&self, request: &TripRequest) -> Result<ItineraryPlan, PlanError> {
        self.plan_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Plan a trip under a caller-supplied cancellation signal.
    ///
    /// Cancellation propagates into every in-flight agent loop and tool
    /// invocation; the call returns [`PlanError::Cancelled`] once they have
    /// unwound.
    pub async fn plan_with_cancel(
        &self,
        request: &TripRequest,
        cancel: CancellationToken,
    ) -> Result<ItineraryPlan, PlanError> {
        let request_text = facet_task(request);

        tracing::info!(
            destination = %request.destination,
            days = request.days,
            tier = %request.tier,
            "planning started"
        );

        // ── facet fan-out ────────────────────────────────────────────────
        // The three facet agents are independent: each owns a private
        // conversation, so they run as plain concurrent tasks with no
        // synchronization beyond the join below.
        let facet_roles = [
            (Facet::Attractions, self.roles.attraction.clone()),
            (Facet::Weather, self.roles.weather.clone()),
            (Facet::Lodging, self.roles.lodging.clone()),
        ];

        let handles: Vec<_> = facet_roles
            .into_iter()
            .map(|(facet, role)| {
                let runner = self.runner.clone();
                let task = request_text.clone();
                let child = cancel.child_token();
                tokio::spawn(async move {
                    let outcome = runner.run(&role, &task, &child).await;
                    (facet, outcome)
                })
            })
            .collect();

        let mut reports: Vec<(Facet, AgentOutcome)> = Vec::with_capacity(handles.len());
        for handle in futures::future::join_all(handles).await {
            let (facet, outcome) =
                handle.map_err(|e| PlanError::Internal(format!("facet task panicked: {e}")))?;
            reports.push((facet, outcome));
        }

        if cancel.is_cancelled() {
            return Err(PlanError::Cancelled);
        }

        // ── partial-failure policy ───────────────────────────────────────
        let mut attractions: Option<Value> = None;
        let mut weather: FacetOutcome<WeatherSummary> = FacetOutcome::Unavailable {
            reason: "weather agent did not run".into(),
        };
        let mut lodging: FacetOutcome<LodgingSuggestion> = FacetOutcome::Unavailable {
            reason: "lodging agent did not run".into(),
        };
        let mut facet_payloads: Vec<(Facet, Option<Value>, String)> = Vec::new();

        for (facet, outcome) in reports {
            match outcome {
                AgentOutcome::Success { output, steps } => {
                    tracing::info!(facet = %facet, steps, "facet agent succeeded");
                    facet_payloads.push((facet, Some(output), String::new()));
                }
                AgentOutcome::Failure { cause, steps } => {
                    if cause == FailureCause::Cancelled {
                        return Err(PlanError::Cancelled);
                    }
                    tracing::warn!(facet = %facet, steps, %cause, "facet agent failed");
                    if self.requirements.requires(facet) {
                        return Err(PlanError::PlanningFailure {
                            facet: facet.to_string(),
                            reason: cause.to_string(),
                        });
                    }
                    facet_payloads.push((facet, None, cause.to_string()));
                }
            }
        }

        for (facet, payload, failure_reason) in &facet_payloads {
            match (facet, payload) {
                (Facet::Attractions, Some(value)) => attractions = Some(value.clone()),
                (Facet::Weather, Some(value)) => {
                    weather = parse_facet::<WeatherSummary>(value.clone(), "weather")?;
                }
                (Facet::Lodging, Some(value)) => {
                    let nested = value.get("lodging").cloned().unwrap_or(Value::Null);
                    lodging = parse_facet::<LodgingSuggestion>(nested, "lodging")?;
                }
                (Facet::Weather, None) => {
                    weather = FacetOutcome::Unavailable {
                        reason: format!("weather unavailable: {failure_reason}"),
                    };
                }
                (Facet::Lodging, None) => {
                    lodging = FacetOutcome::Unavailable {
                        reason: format!("lodging unavailable: {failure_reason}"),
                    };
                }
                (Facet::Attractions, None) => {
                    // Only reachable when attractions are configured optional.
                    attractions = None;
                }
            }
        }

        // ── synthesis ────────────────────────────────────────────────────
        let synthesis_task = synthesis_task(request, attractions.as_ref(), &weather, &lodging);
        let outcome = self
            .runner
            .run(&self.roles.synthesis, &synthesis_task, &cancel.child_token())
            .await;

        match outcome {
            AgentOutcome::Success { output, steps } => {
                tracing::info!(steps, "synthesis agent succeeded");
                assemble(request, output, weather, lodging)
            }
            AgentOutcome::Failure {
                cause: FailureCause::Cancelled,
                ..
            } => Err(PlanError::Cancelled),
            AgentOutcome::Failure { cause, .. } => Err(PlanError::PlanningFailure {
                facet: "itinerary".into(),
                reason: cause.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Task construction
// ---------------------------------------------------------------------------

/// User message handed to every facet agent.
fn facet_task(request: &TripRequest) -> String {
    let payload = json!({
        "destination": request.destination,
        "start_date": request.start_date,
        "end_date": request.end_date(),
        "days": request.days,
        "accommodation_tier": request.tier,
        "preferences": request.preferences,
    });
    format!("Trip request:\n{payload}")
}

/// User message handed to the synthesis agent: the request plus every facet
/// payload or its unavailability marker.
fn synthesis_task(
    request: &TripRequest,
    attractions: Option<&Value>,
    weather: &FacetOutcome<WeatherSummary>,
    lodging: &FacetOutcome<LodgingSuggestion>,
) -> String {
    let mut payload = json!({
        "request": {
            "destination": request.destination,
            "start_date": request.start_date,
            "days": request.days,
            "accommodation_tier": request.tier,
            "preferences": request.preferences,
        }
    });

    payload["attractions"] = match attractions {
        Some(value) => value.clone(),
        None => json!({"status": "unavailable"}),
    };
    payload["weather"] = facet_json(weather);
    payload["lodging"] = facet_json(lodging);

    format!("Plan the itinerary from these inputs:\n{payload}")
}

fn facet_json<T: serde::Serialize>(outcome: &FacetOutcome<T>) -> Value {
    match outcome {
        FacetOutcome::Available { value } => {
            serde_json::to_value(value).unwrap_or_else(|_| json!({"status": "unavailable"}))
        }
        FacetOutcome::Unavailable { reason } => {
            json!({"status": "unavailable", "reason": reason})
        }
    }
}

fn parse_facet<T: serde::de::DeserializeOwned>(
    value: Value,
    facet: &str,
) -> Result<FacetOutcome<T>, PlanError> {
    // The payload already passed the role's output schema; a mismatch here
    // means the schema and the typed model disagree, which is a defect.
    serde_json::from_value::<T>(value)
        .map(|value| FacetOutcome::Available { value })
        .map_err(|e| PlanError::Internal(format!("validated {facet} payload failed to decode: {e}")))
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SynthOutput {
    days: Vec<SynthDay>,
}

#[derive(Debug, Deserialize)]
struct SynthDay {
    day: u32,
    activities: Vec<SynthActivity>,
}

#[derive(Debug, Deserialize)]
struct SynthActivity {
    poi_id: String,
    poi_name: String,
    start: String,
    end: String,
    #[serde(default)]
    note: Option<String>,
}

/// Fold the synthesis output and the facet values into the final plan, then
/// re-check the structural invariants.
fn assemble(
    request: &TripRequest,
    output: Value,
    weather: FacetOutcome<WeatherSummary>,
    lodging: FacetOutcome<LodgingSuggestion>,
) -> Result<ItineraryPlan, PlanError> {
    let parsed: SynthOutput = serde_json::from_value(output)
        .map_err(|e| PlanError::Internal(format!("validated itinerary failed to decode: {e}")))?;

    let mut days = Vec::with_capacity(parsed.days.len());
    for synth_day in parsed.days {
        let date = request
            .date_for_day(synth_day.day)
            .unwrap_or(request.start_date);

        let mut activities = Vec::with_capacity(synth_day.activities.len());
        for activity in synth_day.activities {
            let window = TimeWindow {
                start: parse_time(&activity.start)?,
                end: parse_time(&activity.end)?,
            };
            activities.push(Activity {
                poi: PoiRef {
                    id: activity.poi_id,
                    name: activity.poi_name,
                },
                window,
                note: activity.note,
            });
        }

        days.push(DayPlan {
            day: synth_day.day,
            date,
            activities,
        });
    }

    let plan = ItineraryPlan {
        destination: request.destination.clone(),
        days,
        lodging,
        weather,
    };

    plan.check_invariants(request.days)
        .map_err(|reason| PlanError::InvariantViolation { reason })?;

    Ok(plan)
}

fn parse_time(s: &str) -> Result<chrono::NaiveTime, PlanError> {
    chrono::NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| PlanError::Internal(format!("unparsable time `{s}`: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LoopConfig;
    use crate::llm::client::ModelClient;
    use crate::llm::types::{Decision, Message};
    use crate::trip::AccommodationTier;
    use async_trait::async_trait;
    use std::sync::Arc;
    use waypoint_kernel::{InvokerConfig, ToolDefinition, ToolInvoker, ToolRegistry};

    /// Model that answers by role, recognized from the system prompt.
    struct RoleKeyedModel;

    #[async_trait]
    impl ModelClient for RoleKeyedModel {
        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> crate::error::Result<Decision> {
            let system = &messages[0].content;
            let decision = if system.contains("attraction agent") {
                Decision::Malformed {
                    reason: "attraction stub refuses".into(),
                }
            } else if system.contains("weather agent") {
                Decision::Final(json!({"summary": "mild and dry"}))
            } else if system.contains("lodging agent") {
                Decision::Final(json!({
                    "lodging": {"name": "Hutong Inn", "address": "12 Nanluoguxiang"}
                }))
            } else {
                Decision::Final(json!({"days": []}))
            };
            Ok(decision)
        }
    }

    fn planner(model: Arc<dyn ModelClient>) -> TripPlanner {
        let registry = Arc::new(ToolRegistry::new());
        let invoker = Arc::new(ToolInvoker::new(registry, InvokerConfig::default()));
        let runner = AgentRunner::new(
            model,
            invoker,
            LoopConfig {
                retry_budget: 1,
                ..LoopConfig::default()
            },
        );
        TripPlanner::new(runner)
    }

    fn request() -> TripRequest {
        TripRequest::new(
            "Beijing",
            chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            3,
            AccommodationTier::Comfort,
            vec!["history".into()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn required_facet_failure_names_the_facet() {
        // Attractions are required by default and the stub model fails them.
        let planner = planner(Arc::new(RoleKeyedModel));
        let err = planner.plan(&request()).await.expect_err("must fail");

        match err {
            PlanError::PlanningFailure { facet, .. } => assert_eq!(facet, "attractions"),
            other => panic!("expected planning failure, got {other:?}"),
        }
    }

    #[test]
    fn synthesis_task_carries_unavailability_markers() {
        let req = request();
        let weather: FacetOutcome<WeatherSummary> = FacetOutcome::Unavailable {
            reason: "weather unavailable: tool error".into(),
        };
        let lodging: FacetOutcome<LodgingSuggestion> = FacetOutcome::Available {
            value: LodgingSuggestion {
                name: "Hutong Inn".into(),
                address: "12 Nanluoguxiang".into(),
                tier: Some(AccommodationTier::Comfort),
                price_hint: None,
            },
        };

        let task = synthesis_task(&req, Some(&json!({"attractions": []})), &weather, &lodging);
        assert!(task.contains("weather unavailable"));
        assert!(task.contains("Hutong Inn"));
        assert!(task.contains("Beijing"));
    }

    #[test]
    fn assemble_rejects_wrong_day_count() {
        let req = request();
        let output = json!({
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
        let err = assemble(
            &req,
            output,
            FacetOutcome::Unavailable {
                reason: "n/a".into(),
            },
            FacetOutcome::Unavailable {
                reason: "n/a".into(),
            },
        )
        .expect_err("3 days requested, 1 delivered");
        assert!(matches!(err, PlanError::InvariantViolation { .. }));
    }
}
