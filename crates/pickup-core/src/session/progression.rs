//! Stop and assignment progression.

use super::manager::SessionManager;
use super::model::{CurrentPickup, ProgressSummary, Stop, StopStatus};
use crate::error::{Result, SessionError};
use serde_json::{Map, Value};
use tracing::info;

/// Accepted pickup weight range, in kilograms.
pub const WEIGHT_RANGE: std::ops::RangeInclusive<f64> = 0.1..=1000.0;

/// Evidence captured when a stop is completed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StopCompletion {
    pub weight: Option<f64>,
    pub photo_path: Option<String>,
    /// Any other fields to merge into the stop.
    pub extra: Map<String, Value>,
}

impl StopCompletion {
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.weight {
            Some(weight) if !WEIGHT_RANGE.contains(&weight) => Err(SessionError::validation(
                format!(
                    "Weight must be between {} and {} kg",
                    WEIGHT_RANGE.start(),
                    WEIGHT_RANGE.end()
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Request body for the remote completion call.
    pub(crate) fn to_body(&self, stop_id: &str) -> Value {
        let mut body = self.extra.clone();
        body.insert("stop_id".to_string(), Value::String(stop_id.to_string()));
        if let Some(weight) = self.weight {
            body.insert("weight".to_string(), Value::from(weight));
        }
        if let Some(photo_path) = &self.photo_path {
            body.insert("photo_path".to_string(), Value::String(photo_path.clone()));
        }
        Value::Object(body)
    }
}

impl SessionManager {
    /// Moves to the next pending stop after the current one.
    ///
    /// # Errors
    ///
    /// Returns `NoNextStop` when progress is already at the last stop or no
    /// pending stop follows the current one.
    pub async fn advance(&mut self) -> Result<CurrentPickup> {
        let totals = self.session.totals;
        if totals.current >= totals.total {
            info!("[Progress] Already at the last pickup");
            return Err(SessionError::NoNextStop);
        }

        let current_sequence = self.session.current_stop().map(|stop| stop.sequence);
        let next = self
            .session
            .stops
            .iter()
            .position(|stop| {
                stop.is_pending() && current_sequence.is_none_or(|seq| stop.sequence > seq)
            })
            .ok_or(SessionError::NoNextStop)?;

        let sequence = self.session.stops[next].sequence;
        self.session.current_index = Some(next);
        self.session.totals.current = sequence;
        self.save().await;

        info!(
            "[Progress] Moved to pickup {} of {}",
            sequence, self.session.totals.total
        );
        CurrentPickup::from_session(&self.session).ok_or(SessionError::NoCurrentStop)
    }

    /// Marks the current stop completed and updates the assignment counters.
    ///
    /// Completion fields are merged into the stop; `status`, `completed_at`
    /// and `pickup_ended_at` are then stamped, and `id` and `sequence` are
    /// never overwritten. The current stop pointer does not move.
    ///
    /// # Errors
    ///
    /// - `NoCurrentStop` when no stop is current
    /// - `ValidationFailed` for an out-of-range weight
    pub async fn complete_current(&mut self, completion: StopCompletion) -> Result<Stop> {
        let index = self
            .session
            .current_index
            .filter(|index| *index < self.session.stops.len())
            .ok_or(SessionError::NoCurrentStop)?;
        completion.validate()?;

        let now = self.clock.now().to_rfc3339();
        let updated = merge_completion(&self.session.stops[index], &completion, &now)?;
        self.session.stops[index] = updated.clone();

        if let Some(assignment) = self.session.assignment.as_mut() {
            assignment.completed_stops = assignment.completed_stops.saturating_add(1);
            assignment.in_progress_stops = assignment.in_progress_stops.saturating_sub(1);
        }
        self.save().await;

        info!("[Progress] Pickup {} marked completed", updated.id);
        Ok(updated)
    }

    pub fn progress_summary(&self) -> ProgressSummary {
        let (completed, in_progress) = self
            .session
            .assignment
            .as_ref()
            .map(|a| (a.completed_stops, a.in_progress_stops))
            .unwrap_or((0, 0));
        ProgressSummary::compute(self.session.totals, completed, in_progress)
    }
}

fn merge_completion(stop: &Stop, completion: &StopCompletion, now: &str) -> Result<Stop> {
    let Value::Object(mut fields) = serde_json::to_value(stop)? else {
        return Err(SessionError::validation("stop did not serialize to an object"));
    };

    for (key, value) in &completion.extra {
        if key != "id" && key != "sequence" {
            fields.insert(key.clone(), value.clone());
        }
    }
    if let Some(weight) = completion.weight {
        fields.insert("weight".to_string(), Value::from(weight));
    }
    if let Some(photo_path) = &completion.photo_path {
        fields.insert("photo_path".to_string(), Value::String(photo_path.clone()));
    }
    fields.insert(
        "status".to_string(),
        Value::String(StopStatus::Completed.to_string()),
    );
    fields.insert("completed_at".to_string(), Value::String(now.to_string()));
    fields.insert("pickup_ended_at".to_string(), Value::String(now.to_string()));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| SessionError::validation(format!("invalid completion data: {}", e)))
}
