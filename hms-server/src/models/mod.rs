//! Row types and API representations for every HMS entity

pub mod appointment;
pub mod audit;
pub mod care;
pub mod insight;
pub mod medication;
pub mod notification;
pub mod order;
pub mod patient;
pub mod result;
pub mod task;
pub mod user;
pub mod vital;

pub use appointment::{Appointment, AppointmentFilter, NewAppointment};
pub use audit::AuditEvent;
pub use care::{DischargePlan, HandoffEntry, PatientFlag, RoundingNote};
pub use medication::{MedicationAdministration, NewPatientMedication, PatientMedication, ReconciliationLog};
pub use notification::{NewNotification, Notification, NotificationFilter};
pub use order::{CatalogItem, CdsRule, NewOrder, Order, OrderListEntry, OrderableItem};
pub use patient::{
    AllergySummary, ClinicalNote, NewPatient, NoteSummary, Patient, PatientAllergy, PatientHeader,
    ProblemListEntry,
};
pub use result::{ImagingReport, LabResult, NewImagingReport, NewLabResult};
pub use task::{NewTask, Task, TaskStatusSummary};
pub use user::{Role, SeedSummary, User, UserProfile};
pub use vital::{RiskProfile, VitalMeasurements, VitalSign};
