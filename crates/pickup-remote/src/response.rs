//! Response envelope interpretation.

use pickup_core::backend::ApiSuccess;
use pickup_core::BackendError;
use serde::Deserialize;
use serde_json::Value;

const SUCCESS: &str = "success";

/// `{status, message?, data?}` as sent by every pickup endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Classifies a completed HTTP exchange.
///
/// # Returns
///
/// - `Ok(ApiSuccess)`: 2xx with `status == "success"`
/// - `Err(Rejected)`: non-2xx (any body), or 2xx with another `status`
/// - `Err(Malformed)`: 2xx with an empty or non-JSON body
pub fn interpret_response(status: u16, body: &str) -> Result<ApiSuccess, BackendError> {
    let ok = (200..300).contains(&status);
    let parsed = serde_json::from_str::<Envelope>(body);

    if !ok {
        let message = parsed.ok().and_then(|envelope| envelope.message);
        return Err(BackendError::rejected(status, message));
    }

    if body.trim().is_empty() {
        return Err(BackendError::malformed("empty response body"));
    }

    let envelope = parsed.map_err(|e| BackendError::malformed(e.to_string()))?;
    if envelope.status.as_deref() != Some(SUCCESS) {
        return Err(BackendError::rejected(status, envelope.message));
    }

    Ok(ApiSuccess {
        message: envelope.message,
        data: envelope.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let reply = interpret_response(
            200,
            r#"{"status":"success","message":"ok","data":{"session_token":"t"}}"#,
        )
        .unwrap();
        assert_eq!(reply.message.as_deref(), Some("ok"));
        assert_eq!(reply.data, Some(json!({ "session_token": "t" })));
    }

    #[test]
    fn test_success_without_data() {
        let reply = interpret_response(201, r#"{"status":"success"}"#).unwrap();
        assert_eq!(reply.data, None);
    }

    #[test]
    fn test_non_success_status_in_2xx_is_rejected() {
        let err = interpret_response(200, r#"{"status":"error","message":"no assignment"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::rejected(200, Some("no assignment".to_string()))
        );
    }

    #[test]
    fn test_error_status_with_html_body() {
        let err = interpret_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err, BackendError::rejected(502, None));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unauthorized_keeps_server_message() {
        let err =
            interpret_response(401, r#"{"status":"error","message":"token expired"}"#).unwrap_err();
        assert_eq!(
            err,
            BackendError::rejected(401, Some("token expired".to_string()))
        );
    }

    #[test]
    fn test_malformed_2xx_bodies() {
        assert!(matches!(
            interpret_response(200, "").unwrap_err(),
            BackendError::Malformed(_)
        ));
        assert!(matches!(
            interpret_response(200, "not json").unwrap_err(),
            BackendError::Malformed(_)
        ));
    }
}
