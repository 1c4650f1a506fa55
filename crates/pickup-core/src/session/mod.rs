//! Driver session module.
//!
//! This module contains the session domain model and the [`SessionManager`]
//! that owns it.
//!
//! # Module Structure
//!
//! - `model`: Session, assignment, stop and app-state types
//! - `token`: Pure token validity rules (grace period, refresh window)
//! - `manager`: `SessionManager` construction, login and logout
//! - `refresh`: Lazy expiry and token refresh
//! - `persistence`: Durable snapshot save/load
//! - `reconciler`: Startup restore and app-resume reconciliation
//! - `progression`: Stop advancement and completion
//! - `app_state`: UI resume state helpers
//! - `trip`: Protected trip state-transition calls
//! - `barcode`: Barcode scanning and pickup-bag cycle calls
//! - `lifecycle`: Host lifecycle events and the event loop
//!
//! # Usage
//!
//! ```ignore
//! use pickup_core::session::{SessionManager, LifecycleEvent, run_lifecycle};
//! ```

mod app_state;
mod barcode;
mod lifecycle;
mod manager;
mod model;
mod persistence;
mod progression;
mod reconciler;
mod refresh;
pub mod token;
mod trip;

#[cfg(test)]
mod test_support;

// Re-export public API
pub use barcode::{BarcodeOutcome, CycleRequest, CycleStatus};
pub use lifecycle::{
    run_lifecycle, spawn_ticker, EventOutcome, LifecycleEvent, DEFAULT_TICK_INTERVAL,
};
pub use manager::{SessionManager, SessionSettings, DEFAULT_PAGE, DEFAULT_STORAGE_KEY};
pub use model::{
    AppState, AppStatePatch, Assignment, AssignmentStatus, CurrentPickup, ProgressSummary,
    Session, Stop, StopStatus, Totals,
};
pub use persistence::PersistedSession;
pub use progression::{StopCompletion, WEIGHT_RANGE};
pub use reconciler::{RestoreOutcome, ResumeOutcome};
pub use refresh::{RefreshCheck, RefreshedToken};
pub use token::{ExpirationInfo, TokenValidity};
pub use trip::TripOutcome;
