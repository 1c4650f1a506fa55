//! Barcode scanning and pickup-bag cycle calls.

use super::manager::SessionManager;
use super::progression::WEIGHT_RANGE;
use super::token;
use crate::backend::{ApiSuccess, BarcodeEndpoint};
use crate::error::{Result, SessionError};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// Stage of a pickup-bag cycle after it has been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CycleStatus {
    Inbound,
    Sorting,
    Completed,
}

/// A bag picked up at a branch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleRequest {
    pub barcode_id: String,
    pub branch_code: String,
    pub pickup_weight: f64,
    /// Server generates one when absent.
    pub cycle_id: Option<String>,
    pub branch_name: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CycleRequest {
    pub fn new(barcode_id: &str, branch_code: &str, pickup_weight: f64) -> Self {
        Self {
            barcode_id: barcode_id.trim().to_string(),
            branch_code: branch_code.trim().to_string(),
            pickup_weight,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_id("Barcode", &self.barcode_id)?;
        if self.branch_code.trim().is_empty() {
            return Err(SessionError::validation("Please enter a branch code"));
        }
        check_weight(self.pickup_weight)
    }

    fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("barcode_id".into(), json!(self.barcode_id));
        body.insert("branch_code".into(), json!(self.branch_code));
        body.insert("pickup_weight".into(), json!(self.pickup_weight));
        let optional = [
            ("cycle_id", self.cycle_id.as_ref().map(|v| json!(v))),
            ("branch_name", self.branch_name.as_ref().map(|v| json!(v))),
            ("address", self.address.as_ref().map(|v| json!(v))),
            ("contact", self.contact.as_ref().map(|v| json!(v))),
            ("latitude", self.latitude.map(|v| json!(v))),
            ("longitude", self.longitude.map(|v| json!(v))),
        ];
        for (name, value) in optional {
            let Some(value) = value else { continue };
            body.insert(name.into(), value);
        }
        Value::Object(body)
    }
}

/// Successful barcode call.
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeOutcome {
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl From<ApiSuccess> for BarcodeOutcome {
    fn from(success: ApiSuccess) -> Self {
        Self {
            message: success.message,
            data: success.data,
        }
    }
}

/// Barcode ids and cycle ids become path segments.
fn check_id(label: &str, id: &str) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(SessionError::validation(format!("{} is required", label)));
    }
    if id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
        return Err(SessionError::validation(format!(
            "{} contains invalid characters",
            label
        )));
    }
    Ok(())
}

fn check_weight(weight: f64) -> Result<()> {
    if WEIGHT_RANGE.contains(&weight) {
        Ok(())
    } else {
        Err(SessionError::validation(format!(
            "Weight must be between {} and {} kg",
            WEIGHT_RANGE.start(),
            WEIGHT_RANGE.end()
        )))
    }
}

impl SessionManager {
    async fn barcode_call(&mut self, endpoint: BarcodeEndpoint, body: Value) -> Result<ApiSuccess> {
        self.ensure_valid_session()?;
        let token = self
            .session
            .session_token
            .clone()
            .ok_or(SessionError::SessionExpired)?;

        info!(
            "[Barcode] {} {} with token {}",
            endpoint.method(),
            endpoint.path(),
            token::redact(&token)
        );
        self.backend
            .barcode_call(&token, &endpoint, body)
            .await
            .map_err(|e| {
                warn!("[Barcode] {} failed: {}", endpoint.name(), e);
                SessionError::from_backend(e, |status, message| {
                    endpoint.rejection_message(status, message)
                })
            })
    }

    /// Looks up a barcode; succeeds only for known, active bags.
    pub async fn scan_barcode(&mut self, barcode_id: &str) -> Result<BarcodeOutcome> {
        let barcode_id = barcode_id.trim();
        check_id("Barcode", barcode_id)?;
        let success = self
            .barcode_call(BarcodeEndpoint::Scan, json!({ "barcode_id": barcode_id }))
            .await?;
        Ok(success.into())
    }

    /// Scans a barcode and starts its cycle in one call, tagged with the
    /// current assignment as the route.
    pub async fn scan_and_start_cycle(&mut self, request: &CycleRequest) -> Result<BarcodeOutcome> {
        request.validate()?;
        let mut body = request.to_body();
        if let Some(assignment) = &self.session.assignment {
            body["route_id"] = json!(assignment.assignment_id);
        }
        let success = self
            .barcode_call(BarcodeEndpoint::ScanAndStart, body)
            .await?;
        Ok(success.into())
    }

    pub async fn start_cycle(&mut self, request: &CycleRequest) -> Result<BarcodeOutcome> {
        request.validate()?;
        let success = self
            .barcode_call(BarcodeEndpoint::StartCycle, request.to_body())
            .await?;
        Ok(success.into())
    }

    /// Moves a cycle to `status`; `inbound_weight` is recorded at inbound.
    pub async fn update_cycle_status(
        &mut self,
        cycle_id: &str,
        status: CycleStatus,
        inbound_weight: Option<f64>,
    ) -> Result<BarcodeOutcome> {
        let cycle_id = cycle_id.trim();
        check_id("Cycle id", cycle_id)?;
        let mut body = json!({ "status": status.to_string() });
        if let Some(weight) = inbound_weight {
            check_weight(weight)?;
            body["inbound_weight"] = json!(weight);
        }
        let endpoint = BarcodeEndpoint::UpdateCycleStatus {
            cycle_id: cycle_id.to_string(),
        };
        Ok(self.barcode_call(endpoint, body).await?.into())
    }

    pub async fn cycle_details(&mut self, cycle_id: &str) -> Result<BarcodeOutcome> {
        let cycle_id = cycle_id.trim();
        check_id("Cycle id", cycle_id)?;
        let endpoint = BarcodeEndpoint::CycleDetails {
            cycle_id: cycle_id.to_string(),
        };
        Ok(self.barcode_call(endpoint, Value::Null).await?.into())
    }

    /// Every cycle recorded for a barcode. A missing list reads as empty.
    pub async fn cycles_for_barcode(&mut self, barcode_id: &str) -> Result<Vec<Value>> {
        let barcode_id = barcode_id.trim();
        check_id("Barcode", barcode_id)?;
        let endpoint = BarcodeEndpoint::CyclesByBarcode {
            barcode_id: barcode_id.to_string(),
        };
        let success = self.barcode_call(endpoint, Value::Null).await?;
        Ok(match success.data {
            Some(Value::Array(cycles)) => cycles,
            _ => Vec::new(),
        })
    }
}
