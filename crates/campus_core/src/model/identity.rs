//! Academic identity value object.

use serde::{Deserialize, Serialize};

/// Academic attributes decoded from an institutional email local part.
///
/// Ephemeral: recomputed on demand, persisted only as part of a
/// [`StudentRecord`](crate::model::student::StudentRecord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicIdentity {
    /// Raw 2-character program code, lowercase.
    pub program_code: String,
    /// Resolved program label, e.g. `BTech`.
    pub class_name: String,
    /// Raw 3-character branch code, lowercase.
    pub branch_code: String,
    /// Resolved branch label, or the uppercased raw code when unknown.
    pub branch: String,
    /// Raw 2-digit admission year code.
    pub admission_year_code: String,
    /// Four-digit admission year.
    pub admission_year: i32,
    /// Current year of study, clamped to the configured window.
    pub academic_year: u8,
    /// Single uppercase section letter.
    pub section: char,
    /// Trailing roll number; may be empty.
    pub roll_number: String,
}
