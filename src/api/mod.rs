//! API Module
//!
//! HTTP handlers and routing exposing group caches over REST.
//!
//! # Endpoints
//! - `PUT /groups/:group/entries/:key` - Store a value in a group
//! - `GET /groups/:group/entries/:key` - Retrieve a value
//! - `DELETE /groups/:group/entries/:key` - Remove a value
//! - `DELETE /groups/:group` - Evict every entry of a group
//! - `GET /groups/:group/members` - List a group's store keys
//! - `GET /stats` - Client statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
