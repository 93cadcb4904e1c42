//! Hospital management system backend
//!
//! REST and WebSocket API over a PostgreSQL system of record, with Redis for
//! catalog caching and notification fan-out.

pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod database;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::HmsConfig;
pub use database::{DatabaseHealth, DatabaseManager};
pub use self::core::{HmsError, HmsResult};
