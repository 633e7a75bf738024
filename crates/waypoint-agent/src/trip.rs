//! Trip planning data model.
//!
//! [`TripRequest`] is the immutable input accepted from the caller;
//! [`ItineraryPlan`] is the immutable output assembled by the orchestrator.
//! Everything in between (facet payloads) travels as schema-validated JSON
//! and only becomes typed here, at the assembly boundary.

use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Accommodation price band requested by the traveler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccommodationTier {
    /// Budget lodging.
    Economy,
    /// Mid-range lodging.
    Comfort,
    /// High-end lodging.
    Luxury,
}

impl std::fmt::Display for AccommodationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Economy => "economy",
            Self::Comfort => "comfort",
            Self::Luxury => "luxury",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AccommodationTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economy" => Ok(Self::Economy),
            "comfort" => Ok(Self::Comfort),
            "luxury" => Ok(Self::Luxury),
            other => Err(format!("unknown accommodation tier `{other}`")),
        }
    }
}

/// A validated trip request.  Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    /// Destination city.
    pub destination: String,
    /// First day of the trip.
    pub start_date: NaiveDate,
    /// Trip length in days.
    pub days: u32,
    /// Requested accommodation tier.
    pub tier: AccommodationTier,
    /// Ordered preference tags (e.g. "history", "food").
    pub preferences: Vec<String>,
}

impl TripRequest {
    /// Longest trip the planner accepts.
    pub const MAX_DAYS: u32 = 30;

    /// Validate and construct a request.
    pub fn new(
        destination: impl Into<String>,
        start_date: NaiveDate,
        days: u32,
        tier: AccommodationTier,
        preferences: Vec<String>,
    ) -> Result<Self> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                reason: "destination must not be empty".into(),
            });
        }
        if days == 0 || days > Self::MAX_DAYS {
            return Err(AgentError::InvalidRequest {
                reason: format!("trip length must be 1..={} days, got {days}", Self::MAX_DAYS),
            });
        }
        Ok(Self {
            destination,
            start_date,
            days,
            tier,
            preferences,
        })
    }

    /// Last day of the trip.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(u64::from(self.days - 1)))
            .unwrap_or(self.start_date)
    }

    /// Calendar date of a 1-based trip day.
    pub fn date_for_day(&self, day: u32) -> Option<NaiveDate> {
        if day == 0 || day > self.days {
            return None;
        }
        self.start_date.checked_add_days(Days::new(u64::from(day - 1)))
    }
}

// ---------------------------------------------------------------------------
// Itinerary
// ---------------------------------------------------------------------------

/// A half-open `[start, end)` slot within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Reference to a point of interest returned by the attraction facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiRef {
    pub id: String,
    pub name: String,
}

/// One scheduled activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub poi: PoiRef,
    pub window: TimeWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// All activities for one trip day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    /// 1-based day counter.
    pub day: u32,
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}

/// Recommended lodging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LodgingSuggestion {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<AccommodationTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_hint: Option<String>,
}

/// One day of forecast data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub condition: String,
    pub high_c: f64,
    pub low_c: f64,
}

/// Aggregated weather for the trip window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub summary: String,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
}

/// A facet value that may be missing because its agent failed.
///
/// The marker carries the failure reason so a caller can tell the user *why*
/// a facet is absent instead of showing a silent gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FacetOutcome<T> {
    /// The facet agent produced a validated value.
    Available { value: T },
    /// The facet agent failed; the plan proceeds without it.
    Unavailable { reason: String },
}

impl<T> FacetOutcome<T> {
    /// Whether a value is present.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Borrow the value, if present.
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }
}

/// The final planning artifact.  Assembled once, then immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryPlan {
    pub destination: String,
    pub days: Vec<DayPlan>,
    pub lodging: FacetOutcome<LodgingSuggestion>,
    pub weather: FacetOutcome<WeatherSummary>,
}

impl ItineraryPlan {
    /// Check the structural invariants against the originating request.
    ///
    /// Violations are reported, never repaired: a failing check signals a
    /// defect in assembly or synthesis, and reshaping the data here would
    /// hide it.
    pub fn check_invariants(&self, expected_days: u32) -> std::result::Result<(), String> {
        if self.days.len() != expected_days as usize {
            return Err(format!(
                "plan has {} day(s), request asked for {expected_days}",
                self.days.len()
            ));
        }

        for (i, day) in self.days.iter().enumerate() {
            let expected_number = (i + 1) as u32;
            if day.day != expected_number {
                return Err(format!(
                    "day at position {i} is numbered {}, expected {expected_number}",
                    day.day
                ));
            }

            let mut previous_end: Option<NaiveTime> = None;
            for activity in &day.activities {
                if activity.window.start >= activity.window.end {
                    return Err(format!(
                        "day {}: activity `{}` has an empty or inverted time window",
                        day.day, activity.poi.name
                    ));
                }
                if let Some(prev) = previous_end {
                    if activity.window.start < prev {
                        return Err(format!(
                            "day {}: activity `{}` overlaps the previous one",
                            day.day, activity.poi.name
                        ));
                    }
                }
                previous_end = Some(activity.window.end);
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
