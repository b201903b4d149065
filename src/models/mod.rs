//! Request and Response models for the cache HTTP API
//!
//! DTOs serialized to and from HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::PutRequest;
pub use responses::{
    ClearResponse, ErrorResponse, GetResponse, HealthResponse, MembersResponse, PutResponse,
    RemoveResponse, StatsResponse,
};
