//! Request and Response models for the cache server API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ClearRequest, InvalidateRequest, SetRequest};
pub use responses::{GetResponse, HasResponse, HealthResponse, KeyResponse, RemovedResponse};
