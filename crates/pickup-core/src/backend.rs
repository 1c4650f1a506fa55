//! Remote backend abstraction.
//!
//! The session manager talks to the pickup backend only through
//! [`PickupBackend`]. Implementations classify every failure into a
//! [`BackendError`] before returning, so nothing above this trait looks at
//! transport details or message text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BackendError, SessionError};
use crate::lenient;
use crate::session::{Assignment, Stop};

/// Successful envelope: HTTP 2xx and `status == "success"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiSuccess {
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl ApiSuccess {
    pub fn new(data: Value) -> Self {
        Self {
            message: None,
            data: Some(data),
        }
    }

    /// Decodes `data` into `T`, treating a missing payload as `null`.
    pub fn decode<T>(&self) -> Result<T, BackendError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| BackendError::malformed(e.to_string()))
    }
}

/// HTTP method of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// Bearer-authenticated trip state-transition endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum TripEndpoint {
    #[strum(serialize = "auto-start-trip")]
    StartTrip,
    #[strum(serialize = "auto-start-next")]
    StartNext,
    #[strum(serialize = "auto-complete-current")]
    CompleteCurrent,
    #[strum(serialize = "auto-complete-trip")]
    CompleteTrip,
    CurrentStatus,
}

impl TripEndpoint {
    /// Path relative to the backend base URL.
    pub fn path(self) -> String {
        let name: &'static str = self.into();
        format!("/multi-pickup/{}", name)
    }

    pub fn method(self) -> Method {
        match self {
            Self::CurrentStatus => Method::Get,
            _ => Method::Post,
        }
    }

    /// User-facing text for a rejected call.
    pub fn rejection_message(self, status: u16, server_message: Option<&str>) -> String {
        match status {
            400 if self == Self::StartTrip => {
                "Bad request. Invalid assignment or trip already started.".to_string()
            }
            400 => "Bad request. Invalid assignment.".to_string(),
            401 => "Unauthorized. Please login again.".to_string(),
            404 => "Assignment not found.".to_string(),
            s if s >= 500 => "Server error. Please try again later.".to_string(),
            _ => server_message
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_message().to_string()),
        }
    }

    fn fallback_message(self) -> &'static str {
        match self {
            Self::StartTrip => "Failed to start trip",
            Self::StartNext => "Failed to start next pickup",
            Self::CompleteCurrent => "Failed to complete current pickup",
            Self::CompleteTrip => "Failed to complete trip",
            Self::CurrentStatus => "Failed to get current status",
        }
    }
}

/// Bearer-authenticated barcode and pickup-bag cycle endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeEndpoint {
    Scan,
    ScanAndStart,
    StartCycle,
    UpdateCycleStatus { cycle_id: String },
    CycleDetails { cycle_id: String },
    CyclesByBarcode { barcode_id: String },
}

impl BarcodeEndpoint {
    /// Path relative to the backend base URL.
    pub fn path(&self) -> String {
        match self {
            Self::Scan => "/barcode/scan".to_string(),
            Self::ScanAndStart => "/barcode/cycle/scan-and-start".to_string(),
            Self::StartCycle => "/barcode/cycle/start".to_string(),
            Self::UpdateCycleStatus { cycle_id } => {
                format!("/barcode/cycle/{}/update-status", cycle_id)
            }
            Self::CycleDetails { cycle_id } => format!("/barcode/cycle/{}", cycle_id),
            Self::CyclesByBarcode { barcode_id } => {
                format!("/barcode/cycle/by-barcode/{}", barcode_id)
            }
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::CycleDetails { .. } | Self::CyclesByBarcode { .. } => Method::Get,
            _ => Method::Post,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::ScanAndStart => "scan-and-start",
            Self::StartCycle => "start-cycle",
            Self::UpdateCycleStatus { .. } => "update-cycle-status",
            Self::CycleDetails { .. } => "cycle-details",
            Self::CyclesByBarcode { .. } => "cycles-by-barcode",
        }
    }

    /// User-facing text for a rejected call: the server's message, or a
    /// per-endpoint fallback carrying the status.
    pub fn rejection_message(&self, status: u16, server_message: Option<&str>) -> String {
        match server_message {
            Some(message) => message.to_string(),
            None => format!("{} ({})", self.fallback_message(), status),
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            Self::Scan => "Failed to scan barcode",
            Self::ScanAndStart | Self::StartCycle => "Failed to start pickup cycle",
            Self::UpdateCycleStatus { .. } => "Failed to update cycle status",
            Self::CycleDetails { .. } => "Failed to get cycle details",
            Self::CyclesByBarcode { .. } => "Failed to get cycles",
        }
    }
}

/// Validated login credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCredentials {
    vehicle_no: String,
    driver_dl: String,
}

impl DriverCredentials {
    /// Normalizes (trim, upper-case) and validates the credentials.
    ///
    /// Vehicle numbers are 8 to 10 characters of letters, digits and spaces.
    /// Driving licences are 10 to 15 letters and digits.
    pub fn new(vehicle_no: &str, driver_dl: &str) -> Result<Self, SessionError> {
        let vehicle_no = vehicle_no.trim().to_uppercase();
        let driver_dl = driver_dl.trim().to_uppercase();

        if vehicle_no.is_empty() {
            return Err(SessionError::validation("Please enter a vehicle number"));
        }
        if driver_dl.is_empty() {
            return Err(SessionError::validation("Please enter a driving license number"));
        }

        let vehicle_len = vehicle_no.chars().count();
        if !(8..=10).contains(&vehicle_len) {
            return Err(SessionError::validation(
                "Vehicle number must be between 8 and 10 characters",
            ));
        }
        if !vehicle_no
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ')
        {
            return Err(SessionError::validation(
                "Vehicle number may only contain letters and digits",
            ));
        }

        let dl_len = driver_dl.chars().count();
        if !(10..=15).contains(&dl_len) {
            return Err(SessionError::validation(
                "Driving license must be between 10 and 15 characters",
            ));
        }
        if !driver_dl.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionError::validation(
                "Driving license may only contain letters and digits",
            ));
        }

        Ok(Self {
            vehicle_no,
            driver_dl,
        })
    }

    pub fn vehicle_no(&self) -> &str {
        &self.vehicle_no
    }

    pub fn driver_dl(&self) -> &str {
        &self.driver_dl
    }

    /// Request body for the login endpoint.
    pub fn to_body(&self) -> Value {
        serde_json::json!({
            "vehicle_no": self.vehicle_no,
            "driver_dl": self.driver_dl,
        })
    }
}

/// Token fields shared by the login and refresh payloads.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TokenPayload {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_token: Option<String>,
    /// Seconds until expiry; a number or a numeric string.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub token_expires_in: Option<u64>,
}

/// `data` of a successful `today-assignment` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignmentPayload {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub session_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub token_expires_in: Option<u64>,
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(flatten)]
    pub assignment: Assignment,
}

/// `data` of a successful `session-status` response.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SessionStatusPayload {
    #[serde(default)]
    pub app_state: Option<Value>,
}

/// The pickup backend as seen by the session manager.
///
/// Implementations enforce their own per-call deadlines and report every
/// failure as a [`BackendError`].
#[async_trait]
pub trait PickupBackend: Send + Sync {
    /// `POST /multi-pickup/today-assignment`
    async fn today_assignment(
        &self,
        credentials: &DriverCredentials,
    ) -> Result<ApiSuccess, BackendError>;

    /// `GET /multi-pickup/session-status`
    async fn session_status(&self, token: &str) -> Result<ApiSuccess, BackendError>;

    /// `POST /multi-pickup/refresh-token`
    async fn refresh_token(&self, token: &str) -> Result<ApiSuccess, BackendError>;

    /// One of the trip state-transition endpoints.
    async fn trip_call(
        &self,
        token: &str,
        endpoint: TripEndpoint,
        body: Value,
    ) -> Result<ApiSuccess, BackendError>;

    /// One of the barcode cycle endpoints. `body` is ignored for GET calls.
    async fn barcode_call(
        &self,
        token: &str,
        endpoint: &BarcodeEndpoint,
        body: Value,
    ) -> Result<ApiSuccess, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_are_normalized() {
        let creds = DriverCredentials::new(" dl01ab1234 ", "dl12345678901").unwrap();
        assert_eq!(creds.vehicle_no(), "DL01AB1234");
        assert_eq!(creds.driver_dl(), "DL12345678901");
        assert_eq!(
            creds.to_body(),
            json!({ "vehicle_no": "DL01AB1234", "driver_dl": "DL12345678901" })
        );
    }

    #[test]
    fn test_credentials_length_rules() {
        assert!(DriverCredentials::new("DL01", "DL12345678901").is_err());
        assert!(DriverCredentials::new("DL01AB12345", "DL12345678901").is_err());
        assert!(DriverCredentials::new("DL01AB1234", "DL123").is_err());
        assert!(DriverCredentials::new("DL01AB1234", "DL-2345678901").is_err());

        let err = DriverCredentials::new("", "DL12345678901").unwrap_err();
        assert!(matches!(err, SessionError::ValidationFailed(_)));
    }

    #[test]
    fn test_trip_endpoint_paths() {
        assert_eq!(TripEndpoint::StartTrip.path(), "/multi-pickup/auto-start-trip");
        assert_eq!(
            TripEndpoint::CompleteCurrent.path(),
            "/multi-pickup/auto-complete-current"
        );
        assert_eq!(TripEndpoint::CurrentStatus.path(), "/multi-pickup/current-status");
        assert_eq!(TripEndpoint::CurrentStatus.method(), Method::Get);
        assert_eq!(TripEndpoint::StartNext.method(), Method::Post);
        assert_eq!(Method::Post.to_string(), "POST");
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            TripEndpoint::StartTrip.rejection_message(400, None),
            "Bad request. Invalid assignment or trip already started."
        );
        assert_eq!(
            TripEndpoint::CurrentStatus.rejection_message(400, None),
            "Bad request. Invalid assignment."
        );
        assert_eq!(
            TripEndpoint::CompleteTrip.rejection_message(503, Some("db down")),
            "Server error. Please try again later."
        );
        assert_eq!(
            TripEndpoint::CompleteTrip.rejection_message(409, Some("Trip already closed")),
            "Trip already closed"
        );
        assert_eq!(
            TripEndpoint::StartNext.rejection_message(422, None),
            "Failed to start next pickup"
        );
    }

    #[test]
    fn test_barcode_endpoint_paths() {
        assert_eq!(BarcodeEndpoint::Scan.path(), "/barcode/scan");
        assert_eq!(
            BarcodeEndpoint::ScanAndStart.path(),
            "/barcode/cycle/scan-and-start"
        );
        let update = BarcodeEndpoint::UpdateCycleStatus {
            cycle_id: "42".to_string(),
        };
        assert_eq!(update.path(), "/barcode/cycle/42/update-status");
        assert_eq!(update.method(), Method::Post);

        let by_barcode = BarcodeEndpoint::CyclesByBarcode {
            barcode_id: "BAG-7".to_string(),
        };
        assert_eq!(by_barcode.path(), "/barcode/cycle/by-barcode/BAG-7");
        assert_eq!(by_barcode.method(), Method::Get);
    }

    #[test]
    fn test_barcode_rejection_prefers_server_message() {
        assert_eq!(
            BarcodeEndpoint::Scan.rejection_message(404, Some("Barcode not found")),
            "Barcode not found"
        );
        assert_eq!(
            BarcodeEndpoint::StartCycle.rejection_message(500, None),
            "Failed to start pickup cycle (500)"
        );
    }

    #[test]
    fn test_assignment_payload_decodes_loose_numbers() {
        let success = ApiSuccess::new(json!({
            "session_token": "tok-1",
            "token_expires_in": "86400",
            "assignment_id": 55,
            "driver_dl": "DL12345678901",
            "vehicle_no": "DL01AB1234",
            "route_date": "2026-10-18",
            "status": "assigned",
            "total_stops": "2",
            "completed_stops": 0,
            "in_progress_stops": null,
            "stops": [
                { "id": 1, "sequence": 1, "status": "pending", "latitude": "28.1" },
                { "id": 2, "sequence": 2, "status": "pending" }
            ]
        }));
        let payload: AssignmentPayload = success.decode().unwrap();
        assert_eq!(payload.session_token.as_deref(), Some("tok-1"));
        assert_eq!(payload.token_expires_in, Some(86_400));
        assert_eq!(payload.assignment.assignment_id, "55");
        assert_eq!(payload.assignment.total_stops, 2);
        assert_eq!(payload.stops.len(), 2);
        assert_eq!(payload.stops[0].latitude, Some(28.1));
    }

    #[test]
    fn test_decode_missing_data_is_malformed() {
        let success = ApiSuccess::default();
        let result: Result<AssignmentPayload, _> = success.decode();
        assert!(matches!(result, Err(BackendError::Malformed(_))));

        let status: SessionStatusPayload = ApiSuccess::new(json!({})).decode().unwrap();
        assert_eq!(status.app_state, None);
    }
}
