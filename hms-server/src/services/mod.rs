//! Domain services sitting between the HTTP handlers and the query layer

pub mod audit;
pub mod cds;
pub mod notifications;
pub mod reports;
pub mod schedule;
pub mod scoring;
pub mod timeline;

pub use audit::ClientInfo;
pub use notifications::{NotificationHub, NotificationRequest, NotificationService};
pub use scoring::{DerivedScores, VitalView};
