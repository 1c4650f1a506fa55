//! Pure token validity rules.
//!
//! Nothing here mutates a session. [`evaluate`] answers "is this token usable
//! at `now`"; the manager decides what to do with the answer.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Tolerance added to the stored expiry before a token counts as expired.
pub const EXPIRY_GRACE: TimeDelta = TimeDelta::minutes(5);

/// Remaining lifetime below which a refresh is attempted.
pub const REFRESH_WINDOW: TimeDelta = TimeDelta::hours(2);

/// Validity of the held credential at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    /// No token held.
    Absent,
    /// Token held without expiry; never expires.
    NonExpiring,
    /// Token held and `now < expires_at + grace`.
    Valid { expires_at: DateTime<Utc> },
    /// Token held and `now >= expires_at + grace`.
    Expired { expires_at: DateTime<Utc> },
}

impl TokenValidity {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::NonExpiring | Self::Valid { .. })
    }

    pub fn is_expired(self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

/// Classifies a token/expiry pair at `now`.
pub fn evaluate(
    has_token: bool,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TokenValidity {
    match (has_token, expires_at) {
        (false, _) => TokenValidity::Absent,
        (true, None) => TokenValidity::NonExpiring,
        (true, Some(expires_at)) if is_expired_with_grace(expires_at, now) => {
            TokenValidity::Expired { expires_at }
        }
        (true, Some(expires_at)) => TokenValidity::Valid { expires_at },
    }
}

/// `now >= expires_at + EXPIRY_GRACE`
pub fn is_expired_with_grace(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at + EXPIRY_GRACE
}

/// True iff the remaining lifetime is strictly between zero and the refresh
/// window. A token already inside its grace period is not refreshed.
pub fn refresh_due(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let remaining = expires_at - now;
    remaining > TimeDelta::zero() && remaining < REFRESH_WINDOW
}

/// Expiry instant for a token issued at `now` with `expires_in` seconds.
pub fn expiry_from_now(now: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    let seconds = i64::try_from(expires_in).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Remaining-lifetime report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationInfo {
    pub expires_at: DateTime<Utc>,
    pub time_remaining_ms: i64,
    pub time_remaining_seconds: i64,
    /// Ignores the grace period.
    pub is_expired: bool,
}

pub fn expiration_info(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> ExpirationInfo {
    let remaining = expires_at - now;
    let remaining_ms = remaining.num_milliseconds().max(0);
    ExpirationInfo {
        expires_at,
        time_remaining_ms: remaining_ms,
        time_remaining_seconds: remaining_ms / 1000,
        is_expired: remaining <= TimeDelta::zero(),
    }
}

/// Short, log-safe form of a bearer token.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    if prefix.len() < token.len() {
        format!("{}…", prefix)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_760_000_000, 0).unwrap() + TimeDelta::minutes(minutes)
    }

    #[test]
    fn test_no_token_is_absent() {
        assert_eq!(evaluate(false, Some(at(60)), at(0)), TokenValidity::Absent);
        assert!(!TokenValidity::Absent.is_valid());
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let validity = evaluate(true, None, at(1_000_000));
        assert_eq!(validity, TokenValidity::NonExpiring);
        assert!(validity.is_valid());
    }

    #[test]
    fn test_grace_boundary() {
        let expiry = at(0);
        assert!(evaluate(true, Some(expiry), at(4)).is_valid());
        let just_before = expiry + EXPIRY_GRACE - TimeDelta::milliseconds(1);
        assert!(evaluate(true, Some(expiry), just_before).is_valid());
        assert!(evaluate(true, Some(expiry), expiry + EXPIRY_GRACE).is_expired());
        assert!(evaluate(true, Some(expiry), at(10)).is_expired());
    }

    #[test]
    fn test_refresh_window_is_open_interval() {
        let expiry = at(0);
        assert!(!refresh_due(expiry, expiry));
        assert!(!refresh_due(expiry, at(2)));
        assert!(refresh_due(expiry, at(-1)));
        assert!(refresh_due(expiry, at(-119)));
        assert!(!refresh_due(expiry, at(-120)));
        assert!(!refresh_due(expiry, at(-600)));
    }

    #[test]
    fn test_expiration_info_clamps() {
        let info = expiration_info(at(0), at(3));
        assert_eq!(info.time_remaining_ms, 0);
        assert!(info.is_expired);

        let info = expiration_info(at(1), at(0));
        assert_eq!(info.time_remaining_seconds, 60);
        assert!(!info.is_expired);
    }

    #[test]
    fn test_expiry_from_now_saturates() {
        assert_eq!(expiry_from_now(at(0), 3600), at(60));
        assert_eq!(expiry_from_now(at(0), u64::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abcdefghijkl"), "abcdef…");
        assert_eq!(redact("abc"), "***");
    }
}
