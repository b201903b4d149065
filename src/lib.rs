//! Group Cache - a memcached-backed cache with group invalidation
//!
//! Every entry put through a [`GroupCache`] is recorded in its group's
//! membership record, so a whole group can be evicted at once while reads
//! stay a single store round trip.

pub mod api;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod group;
pub mod models;
pub mod shared;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, GroupCache};
pub use client::StoreClient;
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_cleanup_task;
