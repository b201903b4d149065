//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Purges expired entries from the in-memory store

mod cleanup;

pub use cleanup::spawn_cleanup_task;
