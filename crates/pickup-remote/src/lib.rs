//! HTTP implementation of the pickup backend.
//!
//! [`HttpPickupBackend`] turns every outcome of a request into a
//! [`BackendError`](pickup_core::BackendError) variant: deadline, transport
//! failure, cancellation, server rejection or malformed body.

mod client;
mod response;

pub use client::{Deadlines, HttpPickupBackend};
pub use response::interpret_response;
