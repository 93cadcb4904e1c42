//! Core domain abstractions and types
//!
//! Error definitions, value types and the ports that services depend on.
//! Nothing in here knows about axum or a concrete database pool.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{HmsError, HmsResult, StorageError};
pub use traits::NotificationSink;
pub use types::{Page, Pagination, PaginationQuery};
