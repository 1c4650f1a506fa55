//! Session domain models.
//!
//! Contains the in-memory record of an authenticated driver: the token, the
//! day's assignment, its ordered stops and the UI resume state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::lenient;

/// Lifecycle status of a single stop.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Lifecycle status of the day's assignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

/// A driver's route for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(deserialize_with = "lenient::string")]
    pub assignment_id: String,
    #[serde(default)]
    pub driver_dl: Option<String>,
    #[serde(default)]
    pub vehicle_no: Option<String>,
    #[serde(default)]
    pub route_date: Option<String>,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_stops: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub completed_stops: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub in_progress_stops: u32,
    #[serde(default)]
    pub trip_started_at: Option<String>,
    #[serde(default)]
    pub trip_ended_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One pickup location within an assignment.
///
/// Fields the backend sends that are not modelled here are kept in `extra` and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::sequence")]
    pub sequence: u32,
    /// Customer name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub status: StopStatus,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub branch_id: Option<String>,
    /// Opaque code used downstream for barcode correlation. Never rewritten.
    #[serde(default)]
    pub branch_code: Option<Value>,
    #[serde(default)]
    pub pickup_started_at: Option<String>,
    #[serde(default)]
    pub pickup_ended_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stop {
    pub fn is_pending(&self) -> bool {
        self.status == StopStatus::Pending
    }
}

/// Progress counters shown to the driver.
///
/// `current` is 1-based; both are zero before an assignment is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub current: u32,
    pub total: u32,
}

/// UI state persisted so the app can reopen on the same screen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default, alias = "current_page")]
    pub current_page: Option<String>,
    #[serde(default, alias = "navigation_started")]
    pub navigation_started: bool,
    #[serde(default, alias = "pickup_form_data")]
    pub pickup_form_data: Map<String, Value>,
    #[serde(default, alias = "completed_steps")]
    pub completed_steps: BTreeSet<String>,
    #[serde(default, alias = "last_activity")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Partial update for [`AppState`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppStatePatch {
    pub current_page: Option<String>,
    pub navigation_started: Option<bool>,
    pub pickup_form_data: Option<Map<String, Value>>,
    pub completed_steps: Option<Vec<String>>,
}

impl AppStatePatch {
    pub fn page(page: impl Into<String>) -> Self {
        Self {
            current_page: Some(page.into()),
            ..Self::default()
        }
    }
}

/// The authenticated working state of the current driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub is_logged_in: bool,
    pub session_token: Option<String>,
    /// `None` means the token never expires.
    pub token_expires_at: Option<DateTime<Utc>>,
    pub assignment: Option<Assignment>,
    /// Ordered by ascending sequence.
    pub stops: Vec<Stop>,
    /// Index into `stops` of the current stop. Moved only by login, restore
    /// and `advance()`.
    pub current_index: Option<usize>,
    pub totals: Totals,
    pub app_state: AppState,
    pub trip_started: bool,
    pub trip_completed: bool,
}

impl Session {
    /// Builds a fresh session from a login payload.
    pub(crate) fn from_assignment(
        token: Option<String>,
        token_expires_at: Option<DateTime<Utc>>,
        assignment: Assignment,
        stops: Vec<Stop>,
    ) -> Self {
        let stops = order_stops(stops);
        let current_index = initial_stop_index(&stops);
        let totals = Totals {
            current: current_index.map(|i| i as u32 + 1).unwrap_or(0),
            total: stops.len() as u32,
        };

        Self {
            is_logged_in: true,
            session_token: token,
            token_expires_at,
            assignment: Some(assignment),
            stops,
            current_index,
            totals,
            app_state: AppState::default(),
            trip_started: false,
            trip_completed: false,
        }
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.current_index.and_then(|i| self.stops.get(i))
    }

    pub fn has_token(&self) -> bool {
        self.session_token.is_some()
    }

    /// Drops the credential and the login flag, keeping route data.
    pub(crate) fn clear_token(&mut self) {
        self.session_token = None;
        self.token_expires_at = None;
        self.is_logged_in = false;
    }
}

/// Sorts stops by sequence, keeping server order for equal sequences.
pub(crate) fn order_stops(mut stops: Vec<Stop>) -> Vec<Stop> {
    stops.sort_by_key(|stop| stop.sequence);
    stops
}

/// First pending stop, else the first stop; `None` for an empty route.
pub(crate) fn initial_stop_index(stops: &[Stop]) -> Option<usize> {
    match stops.iter().position(Stop::is_pending) {
        Some(index) => Some(index),
        None if !stops.is_empty() => Some(0),
        None => None,
    }
}

/// Read-only view of the current stop, as the pickup screens consume it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPickup {
    pub stop_id: String,
    pub sequence: u32,
    pub customer_name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub next_pickup_date: Option<String>,
    pub pickup_index: u32,
    pub total_pickups: u32,
    pub is_last: bool,
    pub customer_id: Option<String>,
    pub branch_code: Option<Value>,
    pub contact: Option<String>,
    pub notes: Option<String>,
    pub weight: Option<f64>,
    pub status: StopStatus,
    pub photo_path: Option<String>,
}

impl CurrentPickup {
    pub(crate) fn from_session(session: &Session) -> Option<Self> {
        let stop = session.current_stop()?;
        Some(Self {
            stop_id: stop.id.clone(),
            sequence: stop.sequence,
            customer_name: stop.name.clone(),
            address: stop.address.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            next_pickup_date: session
                .assignment
                .as_ref()
                .and_then(|a| a.route_date.clone()),
            pickup_index: session.totals.current,
            total_pickups: session.totals.total,
            is_last: session.totals.current == session.totals.total,
            customer_id: stop.branch_id.clone(),
            branch_code: stop.branch_code.clone(),
            contact: stop.contact.clone(),
            notes: stop.notes.clone(),
            weight: stop.weight,
            status: stop.status,
            photo_path: stop.photo_path.clone(),
        })
    }
}

/// Route progress projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub current: u32,
    pub total: u32,
    pub completed: u32,
    pub percentage: u32,
    pub remaining: u32,
    pub in_progress: u32,
}

impl ProgressSummary {
    pub fn compute(totals: Totals, completed: u32, in_progress: u32) -> Self {
        let percentage = if totals.total > 0 {
            (f64::from(completed) / f64::from(totals.total) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            current: totals.current,
            total: totals.total,
            completed,
            percentage,
            remaining: totals.total.saturating_sub(completed),
            in_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stop(id: &str, sequence: u32, status: StopStatus) -> Stop {
        serde_json::from_value(json!({
            "id": id,
            "sequence": sequence,
            "status": status.to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn test_stop_keeps_unknown_fields_and_branch_code() {
        let raw = json!({
            "id": 7,
            "sequence": "2",
            "name": "Acme Foods",
            "latitude": "28.4595",
            "longitude": 77.0266,
            "weight": "15",
            "status": "in_progress",
            "branch_code": 1042,
            "customer_ref": "C-991"
        });
        let stop: Stop = serde_json::from_value(raw).unwrap();
        assert_eq!(stop.id, "7");
        assert_eq!(stop.sequence, 2);
        assert_eq!(stop.latitude, Some(28.4595));
        assert_eq!(stop.weight, Some(15.0));
        assert_eq!(stop.status, StopStatus::InProgress);
        assert_eq!(stop.branch_code, Some(json!(1042)));
        assert_eq!(stop.extra.get("customer_ref"), Some(&json!("C-991")));

        let written = serde_json::to_value(&stop).unwrap();
        assert_eq!(written["branch_code"], json!(1042));
        assert_eq!(written["customer_ref"], json!("C-991"));
    }

    #[test]
    fn test_initial_stop_prefers_first_pending() {
        let stops = order_stops(vec![
            stop("c", 3, StopStatus::Pending),
            stop("a", 1, StopStatus::Completed),
            stop("b", 2, StopStatus::Pending),
        ]);
        assert_eq!(stops[0].id, "a");
        assert_eq!(initial_stop_index(&stops), Some(1));
    }

    #[test]
    fn test_initial_stop_first_element_is_found() {
        let stops = vec![stop("a", 1, StopStatus::Pending), stop("b", 2, StopStatus::Pending)];
        assert_eq!(initial_stop_index(&stops), Some(0));
    }

    #[test]
    fn test_initial_stop_falls_back_to_first() {
        let stops = vec![stop("a", 1, StopStatus::Completed)];
        assert_eq!(initial_stop_index(&stops), Some(0));
        assert_eq!(initial_stop_index(&[]), None);
    }

    #[test]
    fn test_progress_summary() {
        let summary = ProgressSummary::compute(Totals { current: 2, total: 3 }, 1, 1);
        assert_eq!(summary.percentage, 33);
        assert_eq!(summary.remaining, 2);

        let empty = ProgressSummary::compute(Totals::default(), 0, 0);
        assert_eq!(empty.percentage, 0);
        assert_eq!(empty.remaining, 0);

        let over = ProgressSummary::compute(Totals { current: 2, total: 2 }, 3, 0);
        assert_eq!(over.remaining, 0);
        assert_eq!(over.percentage, 150);
    }

    #[test]
    fn test_app_state_accepts_snake_case() {
        let state: AppState = serde_json::from_value(json!({
            "current_page": "pickup_form",
            "navigationStarted": true,
            "completedSteps": ["weight", "photo", "weight"]
        }))
        .unwrap();
        assert_eq!(state.current_page.as_deref(), Some("pickup_form"));
        assert!(state.navigation_started);
        assert_eq!(state.completed_steps.len(), 2);
    }
}
