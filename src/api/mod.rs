//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /has/:key` - Check whether a key is cached
//! - `DELETE /del/:key` - Delete a key
//! - `POST /clear` - Clear by key pattern, or everything
//! - `POST /invalidate` - Remove entries matching tags
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
