//! Student account record created by the enrollment workflow.

use crate::model::cohort::UserId;
use crate::model::identity::AcademicIdentity;
use serde::{Deserialize, Serialize};

/// Verified student with the identity decoded at enrollment time.
///
/// The stored identity is used for cohort repair, so later repairs place the
/// student in the same cohorts regardless of the calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub user_id: UserId,
    pub college_email: String,
    pub name: String,
    pub identity: AcademicIdentity,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}
