//! API route definitions
//!
//! Path parameters sharing a position (e.g. `/patients/:id/...`) keep the same
//! name across modules so the merged router stays conflict free.

use super::extract::require_json;
use super::{handlers::*, ApiState};
use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

/// Mounted under `/api/auth`
pub fn create_auth_routes() -> Router<ApiState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/login/mfa-verify", post(auth::mfa_verify))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/me", get(auth::me))
}

/// Mounted under `/api/admin`
pub fn create_admin_routes() -> Router<ApiState> {
    Router::new()
        .route("/setup-roles-permissions", post(admin::setup_roles_permissions))
        .route("/users/:id/roles", post(admin::assign_user_role))
}

pub fn create_patient_routes() -> Router<ApiState> {
    Router::new()
        .route("/patients", post(patients::create_patient))
        .route("/patients/:id", put(patients::update_patient))
        .route("/patients/:id/header-details", get(patients::get_patient_header))
        .route(
            "/patients/:id/allergies",
            post(patients::add_allergy).get(patients::list_allergies),
        )
        .route(
            "/patients/:id/problems",
            post(patients::add_problem).get(patients::list_problems),
        )
        .route(
            "/patients/:id/notes",
            post(patients::create_note).get(patients::list_notes),
        )
        .route("/notes/:id/sign", post(patients::sign_note))
}

/// Order entry and clinical decision support
pub fn create_order_routes() -> Router<ApiState> {
    Router::new()
        .route("/orderable-items", get(orders::list_orderable_items))
        .route(
            "/patients/:id/orders",
            post(orders::create_order).get(orders::list_patient_orders),
        )
        .route("/orders/:id/sign", post(orders::sign_order))
        .route("/orders/:id/discontinue", post(orders::discontinue_order))
        .route("/cds/execute-checks", post(cds::execute_checks))
        .route("/cds/rules", get(cds::list_rules).post(cds::create_rule))
}

/// Medication lists, reconciliation and the MAR
pub fn create_medication_routes() -> Router<ApiState> {
    Router::new()
        .route("/patients/:id/medications", get(medications::list_patient_medications))
        .route("/patients/:id/medications/home", post(medications::add_home_medication))
        .route("/medications/:id", put(medications::update_medication))
        .route(
            "/patients/:id/medications/reconcile",
            post(medications::reconcile_medications),
        )
        .route(
            "/patients/:id/medications/reconciliation-logs",
            get(medications::list_reconciliation_logs),
        )
        .route("/mar/administrations", post(medications::document_administration))
        .route("/patients/:id/mar", get(medications::get_patient_mar))
}

pub fn create_result_routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/patients/:id/results/labs",
            post(results::create_lab_result).get(results::list_lab_results),
        )
        .route(
            "/patients/:id/results/imaging",
            post(results::create_imaging_report).get(results::list_imaging_reports),
        )
        .route("/results/labs/:id/acknowledge", post(results::acknowledge_lab_result))
        .route(
            "/results/imaging/:id/acknowledge",
            post(results::acknowledge_imaging_report),
        )
}

pub fn create_vitals_routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/patients/:id/vitals",
            post(vitals::create_vital).get(vitals::list_vitals),
        )
        .route("/patients/:id/vitals/latest", get(vitals::latest_vitals))
        .route(
            "/vitals/:id",
            get(vitals::get_vital)
                .put(vitals::update_vital)
                .delete(vitals::delete_vital),
        )
        .route("/vitals/:id/derived-scores", get(vitals::derived_scores))
}

pub fn create_task_routes() -> Router<ApiState> {
    Router::new()
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/tasks/summary", get(tasks::task_summary))
        .route("/tasks/today", get(tasks::today_tasks))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/complete", patch(tasks::complete_task))
        .route("/tasks/:id/status", patch(tasks::update_task_status))
}

/// Rounding notes, handoffs, flags and discharge plans
pub fn create_care_routes() -> Router<ApiState> {
    use care::{discharge, flags, handoff, rounds};

    Router::new()
        .route(
            "/patients/:id/rounding-notes",
            post(rounds::create_rounding_note).get(rounds::list_patient_rounding_notes),
        )
        .route(
            "/rounding-notes/:id",
            get(rounds::get_rounding_note).put(rounds::update_rounding_note),
        )
        .route("/rounding-notes/:id/finalize", post(rounds::finalize_rounding_note))
        .route("/rounding-notes/:id/review", post(rounds::review_rounding_note))
        .route("/all-rounding-notes", get(rounds::list_all_rounding_notes))
        .route(
            "/patients/:id/handoff-entries",
            post(handoff::create_handoff_entry).get(handoff::list_handoff_entries),
        )
        .route(
            "/handoff-entries/:id",
            get(handoff::get_handoff_entry)
                .put(handoff::update_handoff_entry)
                .delete(handoff::delete_handoff_entry),
        )
        .route("/handoff-entries/:id/review", post(handoff::review_handoff_entry))
        .route(
            "/patients/:id/flags",
            post(flags::create_flag).get(flags::list_flags),
        )
        .route("/flags/:id", get(flags::get_flag).put(flags::update_flag))
        .route("/flags/:id/review", post(flags::review_flag))
        .route("/flags/:id/deactivate", post(flags::deactivate_flag))
        .route(
            "/patients/:id/discharge-plans",
            post(discharge::create_discharge_plan).get(discharge::list_discharge_plans),
        )
        .route(
            "/discharge-plans/:id",
            get(discharge::get_discharge_plan)
                .put(discharge::update_discharge_plan)
                .delete(discharge::delete_discharge_plan),
        )
        .route("/discharge-plans/:id/review", post(discharge::review_discharge_plan))
}

/// Appointment writes are rejected with 415 before authentication when the
/// body is not JSON
pub fn create_schedule_routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/appointments",
            post(schedule::create_appointment).get(schedule::list_appointments),
        )
        .route(
            "/appointments/:id",
            get(schedule::get_appointment).put(schedule::update_appointment),
        )
        .route("/appointments/:id/cancel", post(schedule::cancel_appointment))
        .route_layer(middleware::from_fn(require_json))
}

pub fn create_notification_routes() -> Router<ApiState> {
    Router::new()
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/mark-all-read",
            post(notifications::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/mark-read",
            post(notifications::mark_notification_read),
        )
        .route("/notifications/:id", delete(notifications::delete_notification))
}

/// Dashboard, timeline and reports
pub fn create_insight_routes() -> Router<ApiState> {
    Router::new()
        .route("/dashboard", get(insights::dashboard))
        .route("/patients/:id/timeline", get(insights::patient_timeline))
        .route(
            "/reports/patient-demographics",
            get(insights::patient_demographics_report),
        )
        .route(
            "/reports/appointment-statistics",
            get(insights::appointment_statistics_report),
        )
        .route("/reports/lab-result-trends", get(insights::lab_result_trends_report))
        .route("/reports/medication-usage", get(insights::medication_usage_report))
        .route("/reports/task-completion", get(insights::task_completion_report))
        .route(
            "/reports/average-length-of-stay",
            get(insights::average_length_of_stay_report),
        )
}
