//! API Module
//!
//! HTTP handlers and routing for the static file server.
//!
//! # Behavior
//! - Files are served from the cache or streamed from disk
//! - Directories resolve to the index document or a generated listing
//! - Missing or escaping paths render the not-found page

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
