//! Student record repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `college_email` is stored lowercase and is unique.
//! - The stored identity round-trips to the one decoded at enrollment.

use crate::model::cohort::UserId;
use crate::model::identity::AcademicIdentity;
use crate::model::student::StudentRecord;
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const STUDENT_SELECT_SQL: &str = "SELECT
    user_uuid,
    college_email,
    name,
    program_code,
    class_name,
    branch_code,
    branch,
    admission_year_code,
    admission_year,
    academic_year,
    section,
    roll_number,
    created_at
FROM students";

/// Repository interface for student records.
pub trait StudentRepository {
    fn create_student(
        &self,
        user_id: UserId,
        college_email: &str,
        name: &str,
        identity: &AcademicIdentity,
    ) -> RepoResult<StudentRecord>;
    fn get_student(&self, user_id: UserId) -> RepoResult<Option<StudentRecord>>;
    fn find_by_email(&self, college_email: &str) -> RepoResult<Option<StudentRecord>>;
}

/// SQLite-backed student repository.
pub struct SqliteStudentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_one(&self, filter: &str, value: String) -> RepoResult<Option<StudentRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} WHERE {filter} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_student_row(row)?)),
            None => Ok(None),
        }
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn create_student(
        &self,
        user_id: UserId,
        college_email: &str,
        name: &str,
        identity: &AcademicIdentity,
    ) -> RepoResult<StudentRecord> {
        self.conn.execute(
            "INSERT INTO students (
                user_uuid,
                college_email,
                name,
                program_code,
                class_name,
                branch_code,
                branch,
                admission_year_code,
                admission_year,
                academic_year,
                section,
                roll_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                user_id.to_string(),
                college_email.trim().to_ascii_lowercase(),
                name.trim(),
                identity.program_code.as_str(),
                identity.class_name.as_str(),
                identity.branch_code.as_str(),
                identity.branch.as_str(),
                identity.admission_year_code.as_str(),
                identity.admission_year,
                identity.academic_year,
                identity.section.to_string(),
                identity.roll_number.as_str(),
            ],
        )?;

        self.get_student(user_id)?
            .ok_or_else(|| RepoError::NotFound(format!("student {user_id} after insert")))
    }

    fn get_student(&self, user_id: UserId) -> RepoResult<Option<StudentRecord>> {
        self.query_one("user_uuid", user_id.to_string())
    }

    fn find_by_email(&self, college_email: &str) -> RepoResult<Option<StudentRecord>> {
        self.query_one("college_email", college_email.trim().to_ascii_lowercase())
    }
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<StudentRecord> {
    let uuid_text: String = row.get("user_uuid")?;
    let section_text: String = row.get("section")?;
    let mut section_chars = section_text.chars();
    let section = match (section_chars.next(), section_chars.next()) {
        (Some(ch), None) if ch.is_ascii_uppercase() => ch,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "invalid section `{section_text}` in students.section"
            )));
        }
    };
    let academic_year: i64 = row.get("academic_year")?;
    let academic_year = u8::try_from(academic_year).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid academic year `{academic_year}` in students.academic_year"
        ))
    })?;

    Ok(StudentRecord {
        user_id: parse_uuid(&uuid_text, "students.user_uuid")?,
        college_email: row.get("college_email")?,
        name: row.get("name")?,
        identity: AcademicIdentity {
            program_code: row.get("program_code")?,
            class_name: row.get("class_name")?,
            branch_code: row.get("branch_code")?,
            branch: row.get("branch")?,
            admission_year_code: row.get("admission_year_code")?,
            admission_year: row.get("admission_year")?,
            academic_year,
            section,
            roll_number: row.get("roll_number")?,
        },
        created_at: row.get("created_at")?,
    })
}
