//! Query layer: `impl PostgresManager` blocks grouped by aggregate

pub mod appointments;
pub mod audit;
pub mod care;
pub mod insights;
pub mod medications;
pub mod notifications;
pub mod orders;
pub mod patients;
pub mod results;
pub mod tasks;
pub mod users;
pub mod vitals;

pub use care::{FlagFilter, RoundingNoteFilter};
pub use tasks::TaskFilter;
