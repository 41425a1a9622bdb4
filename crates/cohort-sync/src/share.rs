use cohort_storage::{Cohort, CohortId};

/// Canonical join link: `<origin>/cohort/<id>`.
pub fn join_url(origin: &str, cohort_id: &CohortId) -> String {
    format!("{}/cohort/{}", origin.trim_end_matches('/'), cohort_id)
}

pub fn share_text(cohort: &Cohort) -> String {
    format!("Join my accountability group: {}", cohort.name)
}
