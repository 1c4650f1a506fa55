//! Persistence bridge between the in-memory session and the durable store.
//!
//! The session is written as a single JSON record under the configured key.
//! Writes are best-effort: failures are logged and never reach the caller.

use super::manager::SessionManager;
use super::model::{initial_stop_index, AppState, Assignment, Session, Stop, Totals};
use super::token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// On-disk shape of the session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub session_token: Option<String>,
    /// RFC 3339; `null` when the token never expires.
    #[serde(default)]
    pub token_expires_at: Option<String>,
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub totals: Option<Totals>,
    #[serde(default)]
    pub app_state: AppState,
    #[serde(default)]
    pub current_stop_index: Option<usize>,
    #[serde(default)]
    pub trip_started: bool,
    #[serde(default)]
    pub trip_completed: bool,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
}

impl PersistedSession {
    pub fn from_session(session: &Session, saved_at: DateTime<Utc>) -> Self {
        Self {
            session_token: session.session_token.clone(),
            token_expires_at: session.token_expires_at.map(|at| at.to_rfc3339()),
            is_logged_in: session.is_logged_in,
            assignment: session.assignment.clone(),
            stops: session.stops.clone(),
            totals: Some(session.totals),
            app_state: session.app_state.clone(),
            current_stop_index: session.current_index,
            trip_started: session.trip_started,
            trip_completed: session.trip_completed,
            last_saved: Some(saved_at),
        }
    }

    /// Rebuilds a session with an already-validated expiry.
    fn into_session(self, token_expires_at: Option<DateTime<Utc>>) -> Session {
        let current_index = self
            .current_stop_index
            .filter(|index| *index < self.stops.len())
            .or_else(|| initial_stop_index(&self.stops));
        let totals = self.totals.unwrap_or(Totals {
            current: current_index.map(|i| i as u32 + 1).unwrap_or(0),
            total: self.stops.len() as u32,
        });

        Session {
            is_logged_in: self.is_logged_in,
            session_token: self.session_token,
            token_expires_at,
            assignment: self.assignment,
            stops: self.stops,
            current_index,
            totals,
            app_state: self.app_state,
            trip_started: self.trip_started,
            trip_completed: self.trip_completed,
        }
    }
}

impl SessionManager {
    /// Writes the whole session as one durable record.
    ///
    /// Failures are logged, never propagated.
    pub async fn save(&self) {
        let record = PersistedSession::from_session(&self.session, self.clock.now());
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!("[Persistence] Failed to serialize session: {}", e);
                return;
            }
        };

        match self.store.set(&self.settings.storage_key, json).await {
            Ok(()) => debug!("[Persistence] Session saved"),
            Err(e) => warn!("[Persistence] Failed to save session: {}", e),
        }
    }

    /// Restores the session from the durable record.
    ///
    /// # Returns
    ///
    /// - `false` when there is no record, it cannot be read, or it holds no token
    /// - `false` when the stored expiry has passed (grace included); the
    ///   record is deleted
    /// - `true` after every field has been restored
    pub async fn load(&mut self) -> bool {
        let raw = match self.store.get(&self.settings.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                warn!("[Persistence] Failed to read session record: {}", e);
                return false;
            }
        };

        let record: PersistedSession = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("[Persistence] Ignoring unreadable session record: {}", e);
                return false;
            }
        };

        if record.session_token.is_none() {
            debug!("[Persistence] Stored session holds no token");
            return false;
        }

        let expires_at = match record.token_expires_at.as_deref() {
            None => None,
            Some(text) => match DateTime::parse_from_rfc3339(text) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!(
                        "[Persistence] Stored expiry {:?} is unreadable ({}), clearing record",
                        text, e
                    );
                    self.discard_persisted().await;
                    return false;
                }
            },
        };

        if let Some(at) = expires_at {
            if token::is_expired_with_grace(at, self.clock.now()) {
                info!("[Persistence] Saved session expired at {}, clearing record", at);
                self.discard_persisted().await;
                return false;
            }
        }

        self.session = record.into_session(expires_at);
        info!(
            "[Persistence] Session restored: {} stops, progress {}/{}",
            self.session.stops.len(),
            self.session.totals.current,
            self.session.totals.total
        );
        true
    }

    /// Removes the durable record. Failures are logged.
    pub async fn discard_persisted(&self) {
        if let Err(e) = self.store.remove(&self.settings.storage_key).await {
            warn!("[Persistence] Failed to clear session record: {}", e);
        }
    }
}
