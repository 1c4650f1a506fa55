//! Token lifecycle: validity, lazy expiry and refresh.

use super::manager::SessionManager;
use super::token::{self, TokenValidity};
use crate::backend::TokenPayload;
use crate::error::{Result, SessionError};
use tracing::{debug, info, warn};

/// Result of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub token: String,
    /// Seconds, as reported by the backend.
    pub expires_in: Option<u64>,
}

/// Outcome of [`SessionManager::refresh_if_needed`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshCheck {
    /// No usable token; the caller must log in again.
    Invalid,
    /// Token valid and outside the refresh window.
    NotDue,
    Refreshed(RefreshedToken),
    /// Refresh was due but failed; the old token is still in use.
    Failed(SessionError),
}

impl RefreshCheck {
    /// The session is still usable after the check.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

impl SessionManager {
    /// Pure validity check at the current clock time.
    pub fn token_validity(&self) -> TokenValidity {
        token::evaluate(
            self.session.session_token.is_some(),
            self.session.token_expires_at,
            self.clock.now(),
        )
    }

    /// Clears the credential if it has expired.
    ///
    /// An expiry held without a token is cleared too, since that state can
    /// only mean logged-out.
    ///
    /// # Returns
    ///
    /// `true` if a held token was expired and removed.
    pub fn expire_if_needed(&mut self) -> bool {
        match self.token_validity() {
            TokenValidity::Expired { expires_at } => {
                info!(
                    "[Token] Session token expired at {} (now {})",
                    expires_at,
                    self.clock.now()
                );
                self.session.clear_token();
                true
            }
            TokenValidity::Absent
                if self.session.is_logged_in || self.session.token_expires_at.is_some() =>
            {
                self.session.clear_token();
                false
            }
            _ => false,
        }
    }

    /// Validity with lazy expiry: an expired token is cleared as a side effect.
    pub fn is_token_valid(&mut self) -> bool {
        self.expire_if_needed();
        self.token_validity().is_valid()
    }

    /// True iff a token with an expiry is held and its remaining lifetime is
    /// strictly inside the refresh window.
    pub fn should_refresh(&self) -> bool {
        match (&self.session.session_token, self.session.token_expires_at) {
            (Some(_), Some(expires_at)) => token::refresh_due(expires_at, self.clock.now()),
            _ => false,
        }
    }

    /// Refreshes the token when it is inside the refresh window.
    ///
    /// A failed refresh is reported but never invalidates the session.
    pub async fn refresh_if_needed(&mut self) -> RefreshCheck {
        if !self.is_token_valid() {
            return RefreshCheck::Invalid;
        }
        if !self.should_refresh() {
            debug!("[Token] Refresh not due");
            return RefreshCheck::NotDue;
        }

        info!("[Token] Token inside refresh window, refreshing");
        match self.refresh().await {
            Ok(refreshed) => RefreshCheck::Refreshed(refreshed),
            Err(e) => {
                warn!("[Token] Refresh failed, keeping current token: {}", e);
                RefreshCheck::Failed(e)
            }
        }
    }

    /// Exchanges the current token for a new one.
    ///
    /// On success token and expiry are replaced together and persisted. When
    /// the backend omits `token_expires_in` the previous expiry is kept.
    ///
    /// # Errors
    ///
    /// - `NoToken` when no valid token is held (no network call is made)
    /// - Backend failures, with the session left untouched
    pub async fn refresh(&mut self) -> Result<RefreshedToken> {
        let Some(current) = self.session_token() else {
            return Err(SessionError::NoToken);
        };

        let response = self.backend.refresh_token(&current).await?;
        let payload: TokenPayload = response.decode()?;
        let Some(new_token) = payload.session_token else {
            return Err(SessionError::MalformedResponse(
                "refresh response carried no session token".to_string(),
            ));
        };

        let expires_at = match payload.token_expires_in.filter(|secs| *secs > 0) {
            Some(secs) => Some(token::expiry_from_now(self.clock.now(), secs)),
            None => self.session.token_expires_at,
        };

        self.session.session_token = Some(new_token.clone());
        self.session.token_expires_at = expires_at;
        self.session.is_logged_in = true;

        info!(
            "[Token] Token refreshed: {} (expires {:?})",
            token::redact(&new_token),
            expires_at
        );
        self.save().await;

        Ok(RefreshedToken {
            token: new_token,
            expires_in: payload.token_expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::BackendError;
    use crate::session::test_support::{fixture, logged_in, refresh_response, MockBackend};
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_lazy_expiry_clears_token() {
        let (fx, mut manager) = logged_in(3, Some(3600)).await;

        fx.clock.advance(TimeDelta::minutes(64));
        assert!(manager.is_token_valid());

        fx.clock.advance(TimeDelta::minutes(1));
        assert!(matches!(
            manager.token_validity(),
            TokenValidity::Expired { .. }
        ));
        assert!(!manager.is_token_valid());
        assert!(manager.session().session_token.is_none());
        assert!(manager.session().token_expires_at.is_none());
        assert!(!manager.session().is_logged_in);
    }

    #[tokio::test]
    async fn test_expiry_without_token_is_logged_out() {
        let fx = fixture(MockBackend::new());
        let mut manager = fx.manager();
        manager.session.is_logged_in = true;
        manager.session.session_token = None;
        manager.session.token_expires_at = Some(fx.clock.now() + TimeDelta::hours(1));

        assert_eq!(manager.token_validity(), TokenValidity::Absent);
        assert!(!manager.is_token_valid());
        assert!(!manager.session().is_logged_in);
        assert!(manager.session().token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_should_refresh_window() {
        let (fx, manager) = logged_in(1, Some(3 * 3600)).await;
        assert!(!manager.should_refresh());

        fx.clock.advance(TimeDelta::minutes(61));
        assert!(manager.should_refresh());

        fx.clock.advance(TimeDelta::minutes(119));
        assert!(!manager.should_refresh());
    }

    #[tokio::test]
    async fn test_refresh_without_token_makes_no_call() {
        let fx = fixture(MockBackend::new());
        let mut manager = fx.manager();

        let err = manager.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "No token to refresh");
        assert_eq!(fx.backend.calls("refresh_token"), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_token_and_persists() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend
            .set_refresh(Ok(refresh_response("tok-fresh", Some(7200))));

        let refreshed = manager.refresh().await.unwrap();
        assert_eq!(refreshed.token, "tok-fresh");
        assert_eq!(refreshed.expires_in, Some(7200));
        assert_eq!(
            manager.session().token_expires_at,
            Some(fx.clock.now() + TimeDelta::seconds(7200))
        );

        let raw = fx.store.raw("driver_session").unwrap();
        assert!(raw.contains("tok-fresh"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_expiry_when_absent() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        let before = manager.session().token_expires_at;
        fx.backend.set_refresh(Ok(refresh_response("tok-2", None)));

        manager.refresh().await.unwrap();
        assert_eq!(manager.session().token_expires_at, before);
        assert_eq!(manager.session().session_token.as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_state() {
        let (fx, mut manager) = logged_in(2, Some(3600)).await;
        fx.backend
            .set_refresh(Err(BackendError::rejected(401, Some("expired".into()))));
        let before = manager.session().clone();

        let err = manager.refresh().await.unwrap_err();
        assert!(err.is_rejected());
        assert_eq!(manager.session(), &before);
    }

    #[tokio::test]
    async fn test_refresh_if_needed_outcomes() {
        let (fx, mut manager) = logged_in(2, Some(3 * 3600)).await;
        assert_eq!(manager.refresh_if_needed().await, RefreshCheck::NotDue);
        assert_eq!(fx.backend.calls("refresh_token"), 0);

        fx.clock.advance(TimeDelta::hours(2));
        let check = manager.refresh_if_needed().await;
        assert!(matches!(check, RefreshCheck::Failed(SessionError::NetworkUnreachable(_))));
        assert!(check.is_valid());
        assert_eq!(manager.session().session_token.as_deref(), Some("tok-login"));

        fx.backend
            .set_refresh(Ok(refresh_response("tok-3", Some(86_400))));
        assert!(manager.refresh_if_needed().await.refreshed());

        fx.clock.advance(TimeDelta::days(2));
        assert_eq!(manager.refresh_if_needed().await, RefreshCheck::Invalid);
    }
}
