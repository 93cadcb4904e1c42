//! Permission catalog, built-in roles and the starter orderable-item catalog

pub const SYSTEM_ADMIN_ROLE: &str = "SystemAdmin";

/// `(name, description)` for every permission the API checks
pub const PERMISSIONS: &[(&str, &str)] = &[
    ("patient:read", "Can read patient data"),
    ("patient:create", "Can create new patients"),
    ("patient:update", "Can update patient demographics, allergies and problems"),
    ("patient:read:own", "Can read own assigned patients"),
    ("patient:read:timeline", "Can read the merged clinical timeline of a patient"),
    ("note:create", "Can create clinical notes"),
    ("note:read", "Can read clinical notes"),
    ("note:sign", "Can sign clinical notes"),
    ("order:create", "Can create new orders"),
    ("order:read", "Can read orders"),
    ("order:sign:medication", "Can sign medication orders"),
    ("order:read_catalog", "Can browse orderable items"),
    ("order:sign", "Can sign any order type (general)"),
    ("order:discontinue", "Can discontinue orders"),
    ("cds:execute", "Can run clinical decision support checks"),
    ("cds:manage_rules", "Can list and create clinical decision support rules"),
    ("task:create", "Can create new tasks"),
    ("task:read:own", "Can read tasks assigned to or created by self"),
    ("task:read:any", "Can read any task (admin/supervisor)"),
    ("task:update:own", "Can update tasks assigned to or created by self"),
    ("task:update:any", "Can update any task (admin/supervisor)"),
    ("task:delete:own", "Can delete tasks created by self (if allowed)"),
    ("task:delete:any", "Can delete any task (admin)"),
    ("vitals:record", "Can record patient vital signs"),
    ("vitals:read", "Can read patient vital signs"),
    ("vitals:update", "Can update/correct vital signs entries"),
    ("vitals:update:any", "Can update vital signs recorded by anyone"),
    ("vitals:delete", "Can delete vital signs entries"),
    ("vitals:delete:any", "Can delete vital signs recorded by anyone"),
    ("vitals:read:derived_scores", "Can view derived clinical scores from vitals"),
    ("rounding_note:create", "Can create clinical rounding notes"),
    ("rounding_note:read", "Can read clinical rounding notes"),
    ("rounding_note:read:any", "Can read all rounding notes (admin/supervisor)"),
    ("rounding_note:update", "Can update their own clinical rounding notes (if not finalized)"),
    ("rounding_note:update:any", "Can update any clinical rounding note (admin)"),
    ("rounding_note:update:finalized", "Can update finalized rounding notes (supervisor/admin)"),
    ("rounding_note:finalize", "Can finalize their own clinical rounding notes"),
    ("rounding_note:finalize:any", "Can finalize any clinical rounding note (admin)"),
    ("rounding_note:review", "Can review clinical rounding notes"),
    ("handoff:create", "Can create handoff entries"),
    ("handoff:read", "Can read handoff entries"),
    ("handoff:read:any", "Can read all handoff entries"),
    ("handoff:update", "Can update their own handoff entries (if not reviewed)"),
    ("handoff:update:any", "Can update any handoff entry (admin)"),
    ("handoff:update:reviewed", "Can update reviewed handoff entries (supervisor/admin)"),
    ("handoff:review", "Can review handoff entries"),
    ("handoff:delete", "Can delete their own handoff entries (if allowed)"),
    ("handoff:delete:any", "Can delete any handoff entry (admin)"),
    ("flag:create", "Can create patient flags"),
    ("flag:read", "Can read patient flags"),
    ("flag:read:any", "Can read flags on any patient"),
    ("flag:update", "Can update their own patient flags"),
    ("flag:update:any", "Can update any patient flag (admin)"),
    ("flag:review", "Can review patient flags"),
    ("flag:review:own", "Can review flags they raised"),
    ("flag:deactivate", "Can deactivate their own patient flags"),
    ("flag:deactivate:any", "Can deactivate any patient flag (admin)"),
    ("flag:delete", "Can delete patient flags"),
    ("discharge_plan:create", "Can create discharge plans"),
    ("discharge_plan:read", "Can read discharge plans"),
    ("discharge_plan:read:any", "Can read all discharge plans (admin/coordinator)"),
    ("discharge_plan:update", "Can update discharge plans"),
    ("discharge_plan:update:any", "Can update any discharge plan (admin/coordinator)"),
    ("discharge_plan:delete", "Can delete discharge plans"),
    ("discharge_plan:delete:any", "Can delete any discharge plan (admin)"),
    ("discharge_plan:review", "Can review discharge plans"),
    ("discharge_plan:manage_home_meds", "Can manage home medications in discharge plans"),
    ("discharge_plan:reconcile", "Can perform medication reconciliation in discharge plans"),
    ("medication:read", "Can read patient medication lists (MAR, Home, Discharge)"),
    ("medication:manage_home_meds", "Can add, update, and manage patient home medications list"),
    ("medication:update", "Can update existing medication records (e.g., status, end_date)"),
    ("medication:reconcile", "Can perform and log medication reconciliation"),
    ("medication:reconcile:read_log", "Can read medication reconciliation logs"),
    ("medication:administer", "Can document medication administration"),
    ("mar:document_administration", "Can document entries on the medication administration record"),
    ("mar:read", "Can read the medication administration record"),
    ("notification:read", "Can read own notifications"),
    ("notification:update", "Can update own notifications (e.g., mark as read)"),
    ("notification:delete", "Can delete own notifications"),
    ("notification:create_system", "Allows system components to create notifications"),
    ("result:create:lab", "Can record lab results"),
    ("result:create:imaging", "Can record imaging reports"),
    ("result:acknowledge:lab", "Can acknowledge lab results"),
    ("result:acknowledge:imaging", "Can acknowledge imaging results"),
    ("result:acknowledge:consult", "Can acknowledge consult results"),
    ("result:acknowledge:all", "Can acknowledge all types of results (admin)"),
    ("result:read:lab", "Can read lab results"),
    ("result:read:imaging", "Can read imaging results"),
    ("result:read:consult", "Can read consult results"),
    ("result:read:any", "Can read all types of results (admin)"),
    ("result:review:lab", "Can review lab results"),
    ("result:review:imaging", "Can review imaging results"),
    ("result:review:consult", "Can review consult results"),
    ("result:review:any", "Can review all types of results (admin)"),
    ("result:delete:lab", "Can delete lab results"),
    ("result:delete:imaging", "Can delete imaging results"),
    ("result:delete:consult", "Can delete consult results"),
    ("result:delete:any", "Can delete any type of result (admin)"),
    ("orderable_item:read", "Can read orderable items (medications, labs, etc.)"),
    ("orderable_item:create", "Can create new orderable items (admin)"),
    ("orderable_item:update", "Can update existing orderable items (admin)"),
    ("orderable_item:delete", "Can delete orderable items (admin)"),
    ("orderable_item:read_catalog", "Can read the catalog of orderable items"),
    ("orderable_item:manage_catalog", "Can manage the catalog of orderable items (admin)"),
    ("appointment:read", "Can read appointments"),
    ("appointment:read:own", "Can read own provider schedule"),
    ("appointment:read:any", "Can read any provider schedule"),
    ("appointment:create", "Can book appointments"),
    ("appointment:update", "Can update appointments"),
    ("appointment:update:any", "Can update any appointment"),
    ("appointment:cancel", "Can cancel appointments"),
    ("appointment:cancel:any", "Can cancel any appointment"),
    ("appointment:manage_schedule", "Can manage provider schedules"),
    ("dashboard:read", "Can read the personal dashboard"),
    ("report:read:patient_demographics", "Can read patient demographics reports"),
    ("report:read:appointment_stats", "Can read appointment statistics"),
    ("report:read:lab_result_trends", "Can read lab result trends"),
    ("report:read:medication_usage", "Can read medication usage reports"),
    ("report:read:task_completion", "Can read task completion reports"),
    ("report:read:length_of_stay", "Can read length of stay reports"),
    ("user:logout", "Can log out (revoke own token)"),
    ("user:profile:read", "Can read own profile"),
    ("admin:manage_roles", "Can manage user roles and permissions"),
    ("admin:manage_permissions", "Can manage permissions and access control"),
    ("admin:manage_users", "Can manage users and roles"),
    ("admin:manage_system_setup", "Can perform system setup tasks"),
];

const SESSION: &[&str] = &[
    "user:logout",
    "user:profile:read",
    "dashboard:read",
    "notification:read",
    "notification:update",
    "notification:delete",
];

const ATTENDING_PHYSICIAN: &[&str] = &[
    "patient:read", "patient:create", "patient:update", "patient:read:timeline",
    "note:create", "note:read", "note:sign",
    "order:create", "order:read", "order:sign:medication", "order:read_catalog", "order:sign",
    "order:discontinue", "cds:execute",
    "task:create", "task:read:own", "task:update:own", "task:delete:own",
    "vitals:record", "vitals:read", "vitals:update", "vitals:read:derived_scores",
    "rounding_note:create", "rounding_note:read", "rounding_note:update",
    "rounding_note:finalize", "rounding_note:review",
    "handoff:create", "handoff:read", "handoff:update", "handoff:review", "handoff:delete",
    "flag:create", "flag:read", "flag:update", "flag:review", "flag:deactivate",
    "discharge_plan:create", "discharge_plan:read", "discharge_plan:update",
    "discharge_plan:delete", "discharge_plan:review", "discharge_plan:reconcile",
    "discharge_plan:manage_home_meds",
    "medication:read", "medication:manage_home_meds", "medication:update",
    "medication:reconcile", "medication:reconcile:read_log", "medication:administer",
    "mar:read",
    "result:read:lab", "result:read:imaging", "result:acknowledge:lab",
    "result:acknowledge:imaging",
    "appointment:read", "appointment:read:own", "appointment:create", "appointment:update",
    "appointment:cancel",
];

const RESIDENT: &[&str] = &[
    "patient:read", "patient:read:own", "patient:read:timeline",
    "note:create", "note:read", "note:sign",
    "order:create", "order:read", "order:read_catalog", "cds:execute",
    "result:acknowledge:lab", "result:read:lab", "result:read:imaging",
    "task:create", "task:read:own", "task:update:own",
    "vitals:record", "vitals:read", "vitals:update", "vitals:read:derived_scores",
    "rounding_note:create", "rounding_note:read", "rounding_note:update",
    "rounding_note:finalize", "rounding_note:review",
    "handoff:create", "handoff:read", "handoff:update", "handoff:review", "handoff:delete",
    "flag:create", "flag:read", "flag:update", "flag:review", "flag:deactivate", "flag:delete",
    "flag:read:any",
    "discharge_plan:create", "discharge_plan:read", "discharge_plan:update",
    "discharge_plan:delete", "discharge_plan:review", "discharge_plan:reconcile",
    "discharge_plan:manage_home_meds",
    "medication:read", "medication:manage_home_meds", "medication:update",
    "medication:reconcile", "medication:reconcile:read_log", "medication:administer",
    "mar:read",
    "appointment:read", "appointment:create", "appointment:update", "appointment:cancel",
    "appointment:cancel:any", "appointment:manage_schedule", "appointment:read:own",
    "appointment:read:any",
];

const NURSE: &[&str] = &[
    "patient:read", "patient:read:timeline",
    "note:create", "note:read", "order:read_catalog", "order:read",
    "task:create", "task:read:own", "task:update:own",
    "vitals:record", "vitals:read", "vitals:update", "vitals:read:derived_scores",
    "rounding_note:read", "rounding_note:create",
    "handoff:read", "handoff:create",
    "flag:create", "flag:read", "flag:update",
    "discharge_plan:create", "discharge_plan:read", "discharge_plan:update",
    "discharge_plan:manage_home_meds",
    "medication:read", "medication:manage_home_meds", "medication:update",
    "medication:reconcile:read_log", "medication:administer",
    "mar:read", "mar:document_administration",
    "result:read:lab", "result:read:imaging",
];

const PHARMACIST: &[&str] = &[
    "patient:read", "order:read", "order:read_catalog", "cds:execute",
    "medication:read", "medication:manage_home_meds", "medication:update",
    "medication:reconcile", "medication:reconcile:read_log",
    "discharge_plan:read", "discharge_plan:reconcile", "discharge_plan:manage_home_meds",
    "mar:read", "report:read:medication_usage",
];

const CASE_MANAGER: &[&str] = &[
    "patient:read", "task:create", "task:read:own", "task:update:own",
    "discharge_plan:create", "discharge_plan:read", "discharge_plan:update",
    "discharge_plan:delete", "discharge_plan:review", "discharge_plan:read:any",
    "report:read:length_of_stay",
];

/// Permission names granted to a built-in role (session permissions included)
pub fn role_permissions(role: &str) -> Vec<&'static str> {
    let specific: &[&str] = match role {
        "AttendingPhysician" => ATTENDING_PHYSICIAN,
        "Resident" => RESIDENT,
        "Nurse" => NURSE,
        "Pharmacist" => PHARMACIST,
        "CaseManager" => CASE_MANAGER,
        SYSTEM_ADMIN_ROLE => return PERMISSIONS.iter().map(|(name, _)| *name).collect(),
        _ => return Vec::new(),
    };

    let mut names: Vec<&'static str> = specific.iter().chain(SESSION).copied().collect();
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(*name));
    names
}

pub const BUILT_IN_ROLES: [&str; 6] = [
    "AttendingPhysician",
    "Resident",
    "Nurse",
    "Pharmacist",
    "CaseManager",
    SYSTEM_ADMIN_ROLE,
];

/// Starter catalog row inserted when `orderable_items` is empty
#[derive(Debug, Clone, Copy)]
pub struct SampleItem {
    pub item_type: &'static str,
    pub name: &'static str,
    pub generic_name: Option<&'static str>,
    pub code: &'static str,
    pub dose_range: Option<(f64, f64, &'static str)>,
}

pub const SAMPLE_ORDERABLE_ITEMS: &[SampleItem] = &[
    SampleItem { item_type: "Medication", name: "Aspirin 81mg Tablet", generic_name: Some("Aspirin"), code: "NDC-ASP81", dose_range: Some((81.0, 325.0, "mg")) },
    SampleItem { item_type: "Medication", name: "Lisinopril 10mg Tablet", generic_name: Some("Lisinopril"), code: "NDC-LIS10", dose_range: Some((2.5, 40.0, "mg")) },
    SampleItem { item_type: "Medication", name: "Metformin 500mg Tablet", generic_name: Some("Metformin"), code: "NDC-MET500", dose_range: Some((500.0, 2550.0, "mg")) },
    SampleItem { item_type: "LabTest", name: "Complete Blood Count (CBC)", generic_name: None, code: "LOINC-CBC", dose_range: None },
    SampleItem { item_type: "LabTest", name: "Basic Metabolic Panel (BMP)", generic_name: None, code: "LOINC-BMP", dose_range: None },
    SampleItem { item_type: "LabTest", name: "Troponin I", generic_name: None, code: "LOINC-TROP", dose_range: None },
    SampleItem { item_type: "ImagingStudy", name: "Chest X-Ray, 2 Views", generic_name: None, code: "CPT-CHESTXRAY", dose_range: None },
    SampleItem { item_type: "ImagingStudy", name: "CT Head without contrast", generic_name: None, code: "CPT-CTHEAD", dose_range: None },
    SampleItem { item_type: "Consult", name: "Cardiology Consult", generic_name: None, code: "CONS-CARDIO", dose_range: None },
    SampleItem { item_type: "Consult", name: "Nephrology Consult", generic_name: None, code: "CONS-NEPHRO", dose_range: None },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_role_permission_exists_in_catalog() {
        let catalog: HashSet<&str> = PERMISSIONS.iter().map(|(name, _)| *name).collect();
        for role in BUILT_IN_ROLES {
            for perm in role_permissions(role) {
                assert!(catalog.contains(perm), "{} grants unknown {}", role, perm);
            }
        }
    }

    #[test]
    fn catalog_has_no_duplicates() {
        let mut seen = HashSet::new();
        for (name, _) in PERMISSIONS {
            assert!(seen.insert(*name), "duplicate permission {}", name);
        }
    }

    #[test]
    fn system_admin_gets_everything_and_unknown_role_nothing() {
        assert_eq!(role_permissions(SYSTEM_ADMIN_ROLE).len(), PERMISSIONS.len());
        assert!(role_permissions("Janitor").is_empty());
    }

    #[test]
    fn clinical_roles_can_use_their_session() {
        for role in ["Nurse", "Pharmacist", "CaseManager"] {
            let perms = role_permissions(role);
            assert!(perms.contains(&"user:logout"));
            assert!(perms.contains(&"notification:read"));
        }
        assert!(role_permissions("Nurse").contains(&"medication:administer"));
    }
}
