//! Core of the pickup driver client.
//!
//! Holds the session domain model, the error taxonomy, the collaborator
//! traits ([`Clock`](clock::Clock), [`DurableStore`](store::DurableStore),
//! [`PickupBackend`](backend::PickupBackend)) and the
//! [`SessionManager`](session::SessionManager) that ties them together.
//! Concrete stores and HTTP clients live in the infrastructure and remote
//! crates.

pub mod backend;
pub mod clock;
pub mod error;
mod lenient;
pub mod session;
pub mod store;

// Re-export common types
pub use backend::{BarcodeEndpoint, DriverCredentials, PickupBackend, TripEndpoint};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BackendError, ErrorCategory, Result, SessionError};
pub use session::SessionManager;
pub use store::{DurableStore, MemoryStore};
