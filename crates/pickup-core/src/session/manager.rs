use super::model::{Assignment, CurrentPickup, Session, Stop, Totals};
use super::token::{self, ExpirationInfo};
use crate::backend::{AssignmentPayload, DriverCredentials, PickupBackend};
use crate::clock::Clock;
use crate::error::{Result, SessionError};
use crate::store::DurableStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Durable-store key of the session record.
pub const DEFAULT_STORAGE_KEY: &str = "driver_session";

/// Screen reported when nothing else was persisted.
pub const DEFAULT_PAGE: &str = "pickup_start";

/// Host-tunable knobs of a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub storage_key: String,
    pub default_page: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_page: DEFAULT_PAGE.to_string(),
        }
    }
}

/// Owns the driver session and its collaborators.
///
/// `SessionManager` is responsible for:
/// - Logging in and out
/// - Token validity, expiry and refresh
/// - Persisting the session after every durable mutation
/// - Reconciling the local session with the backend on start and resume
/// - Moving through the stops of the day's assignment
///
/// Every mutating operation takes `&mut self`; hosts that share a manager
/// across tasks wrap it in a `tokio::sync::Mutex` so there is a single writer.
pub struct SessionManager {
    pub(super) clock: Arc<dyn Clock>,
    pub(super) store: Arc<dyn DurableStore>,
    pub(super) backend: Arc<dyn PickupBackend>,
    pub(super) settings: SessionSettings,
    pub(super) session: Session,
    /// Highest screen-change sequence applied so far.
    pub(super) last_screen_seq: Option<u64>,
}

impl SessionManager {
    /// Creates a manager with an empty session and default settings.
    ///
    /// # Arguments
    ///
    /// * `clock` - Time source for every expiry decision
    /// * `store` - Durable store the session snapshot is written to
    /// * `backend` - Remote pickup backend
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn DurableStore>,
        backend: Arc<dyn PickupBackend>,
    ) -> Self {
        Self::with_settings(clock, store, backend, SessionSettings::default())
    }

    pub fn with_settings(
        clock: Arc<dyn Clock>,
        store: Arc<dyn DurableStore>,
        backend: Arc<dyn PickupBackend>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            clock,
            store,
            backend,
            settings,
            session: Session::default(),
            last_screen_seq: None,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Read-only view of the whole session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.session.assignment.as_ref()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.session.stops
    }

    pub fn totals(&self) -> Totals {
        self.session.totals
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.session.current_stop()
    }

    /// Details of the current stop as the pickup screens show them.
    pub fn current_pickup(&self) -> Option<CurrentPickup> {
        CurrentPickup::from_session(&self.session)
    }

    /// Logged-in flag combined with a pure validity check.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in && self.token_validity().is_valid()
    }

    /// Persisted page, or the configured default.
    pub fn current_page(&self) -> String {
        self.session
            .app_state
            .current_page
            .clone()
            .unwrap_or_else(|| self.settings.default_page.clone())
    }

    /// Authenticates a driver and replaces the session wholesale.
    ///
    /// Credentials are normalized and validated before any network call.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for malformed credentials
    /// - `ServerRejected` with a per-status message when the backend refuses
    /// - `NetworkTimeout` / `NetworkUnreachable` / `MalformedResponse` otherwise
    pub async fn login(&mut self, vehicle_no: &str, driver_dl: &str) -> Result<Assignment> {
        let credentials = DriverCredentials::new(vehicle_no, driver_dl)?;
        info!(
            "[Session] Login attempt for vehicle {}",
            credentials.vehicle_no()
        );

        let response = self
            .backend
            .today_assignment(&credentials)
            .await
            .map_err(|e| {
                warn!("[Session] Login failed: {}", e);
                SessionError::from_backend(e, login_rejection_message)
            })?;

        let payload: AssignmentPayload = response.decode()?;
        let Some(session_token) = payload.session_token else {
            return Err(SessionError::MalformedResponse(
                "login response carried no session token".to_string(),
            ));
        };

        let now = self.clock.now();
        let expires_at = payload
            .token_expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| token::expiry_from_now(now, secs));

        self.session = Session::from_assignment(
            Some(session_token),
            expires_at,
            payload.assignment,
            payload.stops,
        );
        self.last_screen_seq = None;

        info!(
            "[Session] Logged in: assignment {} with {} stops, current {}/{}",
            self.session
                .assignment
                .as_ref()
                .map(|a| a.assignment_id.as_str())
                .unwrap_or("-"),
            self.session.stops.len(),
            self.session.totals.current,
            self.session.totals.total
        );

        self.save().await;

        self.session
            .assignment
            .clone()
            .ok_or(SessionError::NoAssignment)
    }

    /// Clears the whole session and removes the durable record.
    pub async fn logout(&mut self) {
        self.reset_session();
        self.discard_persisted().await;
        info!("[Session] Logged out, session cleared");
    }

    /// The token, only while it is valid. Expires it lazily.
    pub fn session_token(&mut self) -> Option<String> {
        if self.is_token_valid() {
            self.session.session_token.clone()
        } else {
            None
        }
    }

    /// `Bearer <token>` for a valid session.
    pub fn auth_header(&mut self) -> Option<String> {
        self.session_token().map(|token| format!("Bearer {}", token))
    }

    /// Gate for protected calls.
    ///
    /// # Errors
    ///
    /// Returns `SessionExpired` when there is no usable token.
    pub fn ensure_valid_session(&mut self) -> Result<()> {
        if self.is_token_valid() {
            Ok(())
        } else {
            warn!("[Session] Session is invalid or expired, login required");
            Err(SessionError::SessionExpired)
        }
    }

    /// Remaining lifetime of the token, `None` when no expiry is held.
    pub fn token_expiration_info(&self) -> Option<ExpirationInfo> {
        self.session
            .token_expires_at
            .map(|expires_at| token::expiration_info(expires_at, self.clock.now()))
    }

    pub(super) fn reset_session(&mut self) {
        self.session = Session::default();
        self.last_screen_seq = None;
    }
}

/// User-facing message for a rejected login.
pub(crate) fn login_rejection_message(status: u16, server_message: Option<&str>) -> String {
    let lowered = server_message.map(str::to_lowercase).unwrap_or_default();
    if lowered.contains("no assignment") {
        return "No pickup assignment found for today. Please check with your supervisor."
            .to_string();
    }
    if lowered.contains("invalid") {
        return "Invalid vehicle number or driving license. Please check your credentials and try again."
            .to_string();
    }
    match status {
        400 => "Bad request. Please check your vehicle number and driving license format."
            .to_string(),
        401 => "Unauthorized. Invalid credentials provided.".to_string(),
        404 => "Vehicle or driver not found in the system.".to_string(),
        s if s >= 500 => "Server error. Please try again later or contact support.".to_string(),
        _ => server_message
            .map(str::to_string)
            .unwrap_or_else(|| "Authentication failed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, ErrorCategory};
    use crate::session::test_support::{fixture, login_response, MockBackend};

    #[tokio::test]
    async fn test_login_populates_session() {
        let fx = fixture(MockBackend::new().with_login(Ok(login_response(10, Some(3600)))));
        let mut manager = fx.manager();

        let assignment = manager.login("DL01AB1234", "DL12345678901").await.unwrap();

        assert_eq!(assignment.assignment_id, "A-100");
        assert_eq!(manager.totals(), Totals { current: 1, total: 10 });
        assert_eq!(manager.stops().len(), 10);
        assert_eq!(manager.current_stop().unwrap().sequence, 1);
        assert!(manager.is_logged_in());
        assert_eq!(
            manager.session().token_expires_at,
            Some(fx.clock.now() + chrono::TimeDelta::seconds(3600))
        );
        assert!(fx.store.contains(DEFAULT_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_login_validation_skips_network() {
        let fx = fixture(MockBackend::new());
        let mut manager = fx.manager();

        let err = manager.login("DL01", "DL12345678901").await.unwrap_err();
        assert!(matches!(err, SessionError::ValidationFailed(_)));
        assert_eq!(fx.backend.calls("today_assignment"), 0);
    }

    #[tokio::test]
    async fn test_login_rejection_messages() {
        let fx = fixture(MockBackend::new().with_login(Err(BackendError::rejected(
            404,
            Some("No assignment for vehicle".to_string()),
        ))));
        let mut manager = fx.manager();

        let err = manager.login("DL01AB1234", "DL12345678901").await.unwrap_err();
        match err {
            SessionError::ServerRejected {
                category, message, ..
            } => {
                assert_eq!(category, ErrorCategory::NotFound);
                assert_eq!(
                    message,
                    "No pickup assignment found for today. Please check with your supervisor."
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!manager.is_logged_in());
        assert!(!fx.store.contains(DEFAULT_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_login_timeout_is_typed() {
        let fx = fixture(
            MockBackend::new().with_login(Err(BackendError::Timeout { timeout_secs: 30 })),
        );
        let mut manager = fx.manager();

        let err = manager.login("DL01AB1234", "DL12345678901").await.unwrap_err();
        assert_eq!(err, SessionError::NetworkTimeout { timeout_secs: 30 });
    }

    #[tokio::test]
    async fn test_login_without_expiry_never_expires() {
        let fx = fixture(MockBackend::new().with_login(Ok(login_response(2, None))));
        let mut manager = fx.manager();
        manager.login("DL01AB1234", "DL12345678901").await.unwrap();

        fx.clock.advance(chrono::TimeDelta::days(365));
        assert!(manager.is_token_valid());
        assert!(manager.token_expiration_info().is_none());
        assert_eq!(manager.auth_header().as_deref(), Some("Bearer tok-login"));
    }

    #[tokio::test]
    async fn test_login_with_no_stops() {
        let fx = fixture(MockBackend::new().with_login(Ok(login_response(0, Some(3600)))));
        let mut manager = fx.manager();
        manager.login("DL01AB1234", "DL12345678901").await.unwrap();

        assert_eq!(manager.totals(), Totals { current: 0, total: 0 });
        assert!(manager.current_pickup().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let fx = fixture(MockBackend::new().with_login(Ok(login_response(3, Some(3600)))));
        let mut manager = fx.manager();
        manager.login("DL01AB1234", "DL12345678901").await.unwrap();

        manager.logout().await;

        assert_eq!(manager.session(), &Session::default());
        assert!(!fx.store.contains(DEFAULT_STORAGE_KEY));
        assert!(manager.ensure_valid_session().is_err());
    }

    #[test]
    fn test_login_message_table() {
        assert_eq!(
            login_rejection_message(401, Some("Invalid credentials")),
            "Invalid vehicle number or driving license. Please check your credentials and try again."
        );
        assert_eq!(
            login_rejection_message(401, None),
            "Unauthorized. Invalid credentials provided."
        );
        assert_eq!(
            login_rejection_message(502, Some("gateway")),
            "Server error. Please try again later or contact support."
        );
        assert_eq!(login_rejection_message(409, None), "Authentication failed");
    }
}
