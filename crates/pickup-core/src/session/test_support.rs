//! Shared mocks for session unit tests.

use super::manager::SessionManager;
use crate::backend::{ApiSuccess, BarcodeEndpoint, DriverCredentials, PickupBackend, TripEndpoint};
use crate::clock::ManualClock;
use crate::error::{BackendError, Result, SessionError};
use crate::store::{DurableStore, MemoryStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Reply = std::result::Result<ApiSuccess, BackendError>;

/// Backend with canned replies that counts every call.
pub struct MockBackend {
    login: Mutex<Reply>,
    status: Mutex<Reply>,
    refresh: Mutex<Reply>,
    trips: Mutex<HashMap<&'static str, Reply>>,
    barcodes: Mutex<HashMap<&'static str, Reply>>,
    last_barcode: Mutex<Option<BarcodeEndpoint>>,
    calls: Mutex<HashMap<String, usize>>,
    last_body: Mutex<Option<Value>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            login: Mutex::new(Err(BackendError::Unreachable("no login scripted".into()))),
            status: Mutex::new(Ok(ApiSuccess::new(json!({})))),
            refresh: Mutex::new(Err(BackendError::Unreachable("no refresh scripted".into()))),
            trips: Mutex::new(HashMap::new()),
            barcodes: Mutex::new(HashMap::new()),
            last_barcode: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
            last_body: Mutex::new(None),
        }
    }

    pub fn with_login(self, reply: Reply) -> Self {
        *self.login.lock().unwrap() = reply;
        self
    }

    pub fn set_status(&self, reply: Reply) {
        *self.status.lock().unwrap() = reply;
    }

    pub fn set_refresh(&self, reply: Reply) {
        *self.refresh.lock().unwrap() = reply;
    }

    pub fn set_trip(&self, endpoint: TripEndpoint, reply: Reply) {
        self.trips.lock().unwrap().insert(endpoint.into(), reply);
    }

    /// Scripts the reply for a barcode endpoint by its log name.
    pub fn set_barcode(&self, name: &'static str, reply: Reply) {
        self.barcodes.lock().unwrap().insert(name, reply);
    }

    pub fn last_barcode_endpoint(&self) -> Option<BarcodeEndpoint> {
        self.last_barcode.lock().unwrap().clone()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn last_body(&self) -> Option<Value> {
        self.last_body.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        *self.calls.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
    }
}

#[async_trait]
impl PickupBackend for MockBackend {
    async fn today_assignment(&self, _credentials: &DriverCredentials) -> Reply {
        self.record("today_assignment");
        self.login.lock().unwrap().clone()
    }

    async fn session_status(&self, _token: &str) -> Reply {
        self.record("session_status");
        self.status.lock().unwrap().clone()
    }

    async fn refresh_token(&self, _token: &str) -> Reply {
        self.record("refresh_token");
        self.refresh.lock().unwrap().clone()
    }

    async fn trip_call(&self, _token: &str, endpoint: TripEndpoint, body: Value) -> Reply {
        let name: &'static str = endpoint.into();
        self.record(name);
        *self.last_body.lock().unwrap() = Some(body);
        self.trips
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(ApiSuccess::new(json!({}))))
    }

    async fn barcode_call(&self, _token: &str, endpoint: &BarcodeEndpoint, body: Value) -> Reply {
        let name = endpoint.name();
        self.record(name);
        *self.last_body.lock().unwrap() = Some(body);
        *self.last_barcode.lock().unwrap() = Some(endpoint.clone());
        self.barcodes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(ApiSuccess::new(json!({}))))
    }
}

/// Store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl DurableStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(SessionError::storage("disk unavailable"))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(SessionError::storage("disk unavailable"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(SessionError::storage("disk unavailable"))
    }
}

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<MockBackend>,
}

impl Fixture {
    pub fn manager(&self) -> SessionManager {
        SessionManager::new(self.clock.clone(), self.store.clone(), self.backend.clone())
    }
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_760_000_000, 0).unwrap()
}

pub fn fixture(backend: MockBackend) -> Fixture {
    Fixture {
        clock: Arc::new(ManualClock::new(start_time())),
        store: Arc::new(MemoryStore::new()),
        backend: Arc::new(backend),
    }
}

/// Login reply with `stop_count` pending stops numbered from 1.
pub fn login_response(stop_count: u32, expires_in: Option<u64>) -> ApiSuccess {
    let stops: Vec<Value> = (1..=stop_count)
        .map(|seq| {
            json!({
                "id": format!("S-{}", seq),
                "sequence": seq,
                "name": format!("Customer {}", seq),
                "address": format!("{} Market Road", seq),
                "latitude": "28.45",
                "longitude": 77.02,
                "branch_id": seq * 10,
                "branch_code": format!("BR{:03}", seq),
                "status": "pending"
            })
        })
        .collect();

    let mut data = json!({
        "session_token": "tok-login",
        "assignment_id": "A-100",
        "driver_dl": "DL12345678901",
        "vehicle_no": "DL01AB1234",
        "route_date": "2026-10-18",
        "status": "assigned",
        "total_stops": stop_count,
        "completed_stops": 0,
        "in_progress_stops": 1,
        "stops": stops
    });
    if let Some(secs) = expires_in {
        data["token_expires_in"] = json!(secs);
    }
    ApiSuccess::new(data)
}

pub fn refresh_response(token: &str, expires_in: Option<u64>) -> ApiSuccess {
    let mut data = json!({ "session_token": token });
    if let Some(secs) = expires_in {
        data["token_expires_in"] = json!(secs.to_string());
    }
    ApiSuccess::new(data)
}

/// Logged-in manager on a fresh fixture.
pub async fn logged_in(stop_count: u32, expires_in: Option<u64>) -> (Fixture, SessionManager) {
    let fx = fixture(MockBackend::new().with_login(Ok(login_response(stop_count, expires_in))));
    let mut manager = fx.manager();
    manager.login("DL01AB1234", "DL12345678901").await.unwrap();
    (fx, manager)
}
