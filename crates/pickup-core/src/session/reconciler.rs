//! Reconciliation of the local session with the backend.
//!
//! Both entry points follow the same rule: an ambiguous failure (timeout,
//! unreachable, malformed reply) never logs the driver out while the local
//! token is still valid. Only an explicit rejection from the backend or a
//! confirmed local expiry clears the session.

use super::manager::SessionManager;
use super::refresh::RefreshCheck;
use crate::backend::{ApiSuccess, SessionStatusPayload};
use crate::error::{BackendError, SessionError};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of [`SessionManager::restore_and_validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub has_valid_session: bool,
    /// Screen to reopen, set whenever the session is valid.
    pub current_page: Option<String>,
    /// The backend could not be asked; local state was trusted.
    pub using_local_session: bool,
    /// Set when the backend explicitly refused the stored session.
    #[serde(skip)]
    pub rejection: Option<SessionError>,
}

impl RestoreOutcome {
    fn invalid() -> Self {
        Self::default()
    }

    fn valid(current_page: String, using_local_session: bool) -> Self {
        Self {
            has_valid_session: true,
            current_page: Some(current_page),
            using_local_session,
            rejection: None,
        }
    }

    fn rejected(err: SessionError) -> Self {
        Self {
            rejection: Some(err),
            ..Self::default()
        }
    }
}

/// Outcome of [`SessionManager::on_app_resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Active { using_local_session: bool },
    NeedsLogin,
    /// The backend refused the session; it has been logged out.
    Rejected(SessionError),
}

impl ResumeOutcome {
    pub fn session_valid(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

impl SessionManager {
    /// Startup path: restore from the durable store and confirm with the
    /// backend.
    pub async fn restore_and_validate(&mut self) -> RestoreOutcome {
        if !self.load().await {
            info!("[Reconciler] No local session found");
            return RestoreOutcome::invalid();
        }

        if !self.is_token_valid() {
            info!("[Reconciler] Local session token expired, clearing");
            self.invalidate().await;
            return RestoreOutcome::invalid();
        }

        let Some(token) = self.session.session_token.clone() else {
            return RestoreOutcome::invalid();
        };

        match self.backend.session_status(&token).await {
            Ok(status) => {
                info!("[Reconciler] Session confirmed by backend");

                let check = self.refresh_if_needed().await;
                if !check.is_valid() {
                    // Expired between the local check and now.
                    self.invalidate().await;
                    return RestoreOutcome::invalid();
                }

                self.merge_status_app_state(status_payload(&status));
                self.save().await;
                RestoreOutcome::valid(self.current_page(), false)
            }
            Err(e) => self.restore_after_failure(e).await,
        }
    }

    async fn restore_after_failure(&mut self, err: BackendError) -> RestoreOutcome {
        if err.is_transient() {
            warn!(
                "[Reconciler] Backend validation unavailable ({}), checking local session",
                err
            );
            if self.is_token_valid() {
                info!("[Reconciler] Continuing with local session");
                return RestoreOutcome::valid(self.current_page(), true);
            }
            self.invalidate().await;
            return RestoreOutcome::invalid();
        }

        let rejection = SessionError::session_invalid(&err);
        warn!("[Reconciler] {}", rejection);
        self.invalidate().await;
        RestoreOutcome::rejected(rejection)
    }

    /// Foreground path, run on every background to foreground transition.
    ///
    /// Re-reads the durable record first, since the process may have been
    /// killed while in the background.
    pub async fn on_app_resume(&mut self) -> ResumeOutcome {
        let restored = self.load().await;
        info!("[Reconciler] App resumed, session restored from store: {}", restored);

        if !self.session.has_token() {
            info!("[Reconciler] No session token on resume");
            return ResumeOutcome::NeedsLogin;
        }

        if !self.is_token_valid() {
            info!("[Reconciler] Local session expired on resume, logging out");
            self.logout().await;
            return ResumeOutcome::NeedsLogin;
        }

        let Some(token) = self.session.session_token.clone() else {
            return ResumeOutcome::NeedsLogin;
        };

        match self.backend.session_status(&token).await {
            Ok(_) => {
                if let RefreshCheck::Failed(e) = self.refresh_if_needed().await {
                    warn!("[Reconciler] Refresh on resume failed, session still valid: {}", e);
                }
                if !self.is_token_valid() {
                    self.logout().await;
                    return ResumeOutcome::NeedsLogin;
                }
                self.touch_activity();
                self.save().await;
                ResumeOutcome::Active {
                    using_local_session: false,
                }
            }
            Err(e) if e.is_transient() => {
                warn!("[Reconciler] Backend unavailable on resume ({}), using local session", e);
                if self.is_token_valid() {
                    self.touch_activity();
                    self.save().await;
                    ResumeOutcome::Active {
                        using_local_session: true,
                    }
                } else {
                    self.logout().await;
                    ResumeOutcome::NeedsLogin
                }
            }
            Err(e) => {
                let rejection = SessionError::session_invalid(&e);
                warn!("[Reconciler] {} (on resume)", rejection);
                self.logout().await;
                ResumeOutcome::Rejected(rejection)
            }
        }
    }

    /// Authoritative invalidation: in-memory session reset, record removed.
    async fn invalidate(&mut self) {
        self.reset_session();
        self.discard_persisted().await;
    }

    fn merge_status_app_state(&mut self, status: SessionStatusPayload) {
        let Some(remote) = status.app_state else {
            return;
        };
        if let Err(e) = self.merge_remote_app_state(remote) {
            warn!("[Reconciler] Ignoring remote app state: {}", e);
        }
    }
}

/// `session-status` data, tolerating an absent or unreadable payload.
fn status_payload(status: &ApiSuccess) -> SessionStatusPayload {
    match &status.data {
        None | Some(serde_json::Value::Null) => SessionStatusPayload::default(),
        Some(_) => status.decode().unwrap_or_else(|e| {
            warn!("[Reconciler] Unreadable session-status payload: {}", e);
            SessionStatusPayload::default()
        }),
    }
}
