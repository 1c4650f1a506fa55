//! Protected trip state-transition calls.

use super::manager::SessionManager;
use super::model::{AssignmentStatus, Stop};
use super::progression::StopCompletion;
use super::token;
use crate::backend::{ApiSuccess, TripEndpoint};
use crate::error::{Result, SessionError};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{info, warn};

/// Successful trip call.
#[derive(Debug, Clone, PartialEq)]
pub struct TripOutcome {
    pub message: String,
    pub data: Option<Value>,
}

impl TripOutcome {
    fn from_success(endpoint: TripEndpoint, success: ApiSuccess) -> Self {
        let message = success
            .message
            .unwrap_or_else(|| default_success_message(endpoint).to_string());
        Self {
            message,
            data: success.data,
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.data.as_ref()?.get(name)?.as_str()
    }
}

fn default_success_message(endpoint: TripEndpoint) -> &'static str {
    match endpoint {
        TripEndpoint::StartTrip => "Trip started successfully",
        TripEndpoint::StartNext => "Next pickup started",
        TripEndpoint::CompleteCurrent => "Pickup completed",
        TripEndpoint::CompleteTrip => "Trip completed",
        TripEndpoint::CurrentStatus => "Current pickup status retrieved",
    }
}

impl SessionManager {
    /// Sends a bearer-authenticated trip call.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` without a valid token
    /// - `NoAssignment` before login
    /// - Backend failures, with per-endpoint rejection messages
    async fn trip_call(&mut self, endpoint: TripEndpoint, body: Value) -> Result<TripOutcome> {
        self.ensure_valid_session()?;
        if self.session.assignment.is_none() {
            warn!("[Trip] No assignment data found");
            return Err(SessionError::NoAssignment);
        }
        let token = self
            .session
            .session_token
            .clone()
            .ok_or(SessionError::SessionExpired)?;

        info!(
            "[Trip] {} {} with token {}",
            endpoint.method(),
            endpoint.path(),
            token::redact(&token)
        );
        let success = self
            .backend
            .trip_call(&token, endpoint, body)
            .await
            .map_err(|e| {
                warn!("[Trip] {} failed: {}", endpoint, e);
                SessionError::from_backend(e, |status, message| {
                    endpoint.rejection_message(status, message)
                })
            })?;

        Ok(TripOutcome::from_success(endpoint, success))
    }

    /// Starts the day's trip and records the assignment's new status.
    pub async fn start_trip(&mut self) -> Result<TripOutcome> {
        let outcome = self.trip_call(TripEndpoint::StartTrip, json!({})).await?;

        self.session.trip_started = true;
        if let Some(assignment) = self.session.assignment.as_mut() {
            if let Some(status) = outcome
                .field("status")
                .and_then(|s| AssignmentStatus::from_str(s).ok())
            {
                assignment.status = status;
            }
            if let Some(started_at) = outcome.field("trip_started_at") {
                assignment.trip_started_at = Some(started_at.to_string());
            }
        }
        self.save().await;
        Ok(outcome)
    }

    pub async fn start_next(&mut self) -> Result<TripOutcome> {
        self.trip_call(TripEndpoint::StartNext, json!({})).await
    }

    /// Reports the current stop as completed, then applies the completion
    /// locally.
    ///
    /// Validation happens before the network call.
    pub async fn complete_current_remote(&mut self, completion: StopCompletion) -> Result<Stop> {
        let stop_id = self
            .session
            .current_stop()
            .map(|stop| stop.id.clone())
            .ok_or(SessionError::NoCurrentStop)?;
        completion.validate()?;

        self.trip_call(TripEndpoint::CompleteCurrent, completion.to_body(&stop_id))
            .await?;
        self.complete_current(completion).await
    }

    /// Closes the trip and marks the assignment completed.
    pub async fn complete_trip(&mut self) -> Result<TripOutcome> {
        let outcome = self.trip_call(TripEndpoint::CompleteTrip, json!({})).await?;

        self.session.trip_completed = true;
        let ended_at = outcome
            .field("trip_ended_at")
            .map(str::to_string)
            .unwrap_or_else(|| self.clock.now().to_rfc3339());
        if let Some(assignment) = self.session.assignment.as_mut() {
            assignment.status = AssignmentStatus::Completed;
            assignment.trip_ended_at = Some(ended_at);
        }
        self.save().await;
        Ok(outcome)
    }

    /// Server-side view of the trip. Does not change the session.
    pub async fn current_status(&mut self) -> Result<TripOutcome> {
        self.trip_call(TripEndpoint::CurrentStatus, Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::{BackendError, ErrorCategory};
    use crate::session::test_support::{fixture, logged_in, MockBackend};
    use crate::session::StopStatus;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_start_trip_updates_assignment() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend.set_trip(
            TripEndpoint::StartTrip,
            Ok(ApiSuccess {
                message: None,
                data: Some(json!({
                    "status": "in_progress",
                    "trip_started_at": "2026-10-18T08:00:00Z"
                })),
            }),
        );

        let outcome = manager.start_trip().await.unwrap();
        assert_eq!(outcome.message, "Trip started successfully");
        assert!(manager.session().trip_started);
        let assignment = manager.assignment().unwrap();
        assert_eq!(assignment.status, AssignmentStatus::InProgress);
        assert_eq!(
            assignment.trip_started_at.as_deref(),
            Some("2026-10-18T08:00:00Z")
        );
        assert!(fx
            .store
            .raw("driver_session")
            .unwrap()
            .contains("\"tripStarted\":true"));
    }

    #[tokio::test]
    async fn test_trip_call_requires_valid_session() {
        let (fx, mut manager) = logged_in(2, Some(600)).await;
        fx.clock.advance(TimeDelta::minutes(20));

        assert_eq!(
            manager.start_trip().await.unwrap_err(),
            SessionError::SessionExpired
        );
        assert_eq!(fx.backend.calls("auto-start-trip"), 0);
    }

    #[tokio::test]
    async fn test_trip_call_requires_assignment() {
        let fx = fixture(MockBackend::new());
        let mut manager = fx.manager();
        manager.session.session_token = Some("tok".to_string());
        manager.session.is_logged_in = true;

        assert_eq!(
            manager.current_status().await.unwrap_err(),
            SessionError::NoAssignment
        );
    }

    #[tokio::test]
    async fn test_trip_rejection_uses_endpoint_message() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend.set_trip(
            TripEndpoint::StartTrip,
            Err(BackendError::rejected(400, Some("already started".into()))),
        );

        match manager.start_trip().await.unwrap_err() {
            SessionError::ServerRejected {
                category, message, ..
            } => {
                assert_eq!(category, ErrorCategory::BadRequest);
                assert_eq!(
                    message,
                    "Bad request. Invalid assignment or trip already started."
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!manager.session().trip_started);
        assert!(manager.is_logged_in());
    }

    #[tokio::test]
    async fn test_unauthorized_trip_call_keeps_session() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend.set_trip(
            TripEndpoint::CurrentStatus,
            Err(BackendError::rejected(401, None)),
        );

        let err = manager.current_status().await.unwrap_err();
        assert!(!err.forces_logout());
        assert_eq!(err.to_string(), "Unauthorized. Please login again.");
        assert!(manager.is_logged_in());
    }

    #[tokio::test]
    async fn test_complete_current_remote_applies_locally() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;

        let stop = manager
            .complete_current_remote(StopCompletion::with_weight(8.0))
            .await
            .unwrap();
        assert_eq!(stop.status, StopStatus::Completed);
        assert_eq!(
            fx.backend.last_body(),
            Some(json!({ "stop_id": "S-1", "weight": 8.0 }))
        );
        assert_eq!(manager.assignment().unwrap().completed_stops, 1);
    }

    #[tokio::test]
    async fn test_complete_current_remote_failure_leaves_stop() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend.set_trip(
            TripEndpoint::CompleteCurrent,
            Err(BackendError::Timeout { timeout_secs: 15 }),
        );

        let err = manager
            .complete_current_remote(StopCompletion::default())
            .await
            .unwrap_err();
        assert!(err.is_ambiguous());
        assert_eq!(manager.current_stop().unwrap().status, StopStatus::Pending);
    }

    #[tokio::test]
    async fn test_complete_current_remote_validates_first() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        let err = manager
            .complete_current_remote(StopCompletion::with_weight(5000.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ValidationFailed(_)));
        assert_eq!(fx.backend.calls("auto-complete-current"), 0);
    }

    #[tokio::test]
    async fn test_complete_trip_marks_assignment() {
        let (fx, mut manager) = logged_in(1, Some(3600)).await;

        manager.complete_trip().await.unwrap();
        let assignment = manager.assignment().unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
        assert_eq!(
            assignment.trip_ended_at.as_deref(),
            Some(fx.clock.now().to_rfc3339().as_str())
        );
        assert!(manager.session().trip_completed);
    }

    #[tokio::test]
    async fn test_current_status_returns_data() {
        let (fx, mut manager) = logged_in(1, Some(3600)).await;
        fx.backend.set_trip(
            TripEndpoint::CurrentStatus,
            Ok(ApiSuccess {
                message: Some("ok".into()),
                data: Some(json!({ "next_sequence": 2 })),
            }),
        );

        let outcome = manager.current_status().await.unwrap();
        assert_eq!(outcome.message, "ok");
        assert_eq!(outcome.data, Some(json!({ "next_sequence": 2 })));
        assert_eq!(fx.backend.calls("current-status"), 1);
    }
}
