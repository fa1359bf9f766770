//! Student enrollment use-case service.
//!
//! # Responsibility
//! - Decode the institutional email before any record is written.
//! - Persist the student record, then attach cohort groups.
//! - Re-run cohort assignment for existing students on demand.
//!
//! # Invariants
//! - An invalid email never produces a student record.
//! - Cohort assignment failure never undoes a created student record.

use crate::db::DbError;
use crate::identity::{IdentityParseError, IdentityParser};
use crate::model::cohort::UserId;
use crate::model::identity::AcademicIdentity;
use crate::model::student::StudentRecord;
use crate::repo::student_repo::StudentRepository;
use crate::repo::{RepoError, RepoResult};
use crate::service::cohort_assigner::{
    AssignmentReport, CohortAssigner, CohortStore, PartialAssignmentFailure,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from enrollment use-cases.
#[derive(Debug)]
pub enum EnrollmentError {
    /// Email does not decode into an academic identity.
    InvalidEmail(IdentityParseError),
    /// Display name is blank after trim.
    InvalidName,
    /// A student with this email already exists.
    AlreadyRegistered(String),
    /// Target student does not exist.
    StudentNotFound(UserId),
    /// Repair could not complete every cohort level.
    CohortAssignment(PartialAssignmentFailure),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for EnrollmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(err) => write!(f, "{err}"),
            Self::InvalidName => write!(f, "student name must not be blank"),
            Self::AlreadyRegistered(email) => write!(f, "account already exists: {email}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::CohortAssignment(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EnrollmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEmail(err) => Some(err),
            Self::CohortAssignment(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentityParseError> for EnrollmentError {
    fn from(value: IdentityParseError) -> Self {
        Self::InvalidEmail(value)
    }
}

impl From<RepoError> for EnrollmentError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Cohort side of a completed enrollment.
#[derive(Debug)]
pub enum CohortStatus {
    Assigned(AssignmentReport),
    /// Enrollment stands; `repair_cohorts` can finish the job later.
    Partial(PartialAssignmentFailure),
}

impl CohortStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }
}

/// Result of a successful enrollment.
#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub student: StudentRecord,
    pub cohorts: CohortStatus,
}

/// Enrollment facade over parser, student storage and cohort assignment.
pub struct EnrollmentService<R: StudentRepository, S: CohortStore> {
    parser: IdentityParser,
    students: R,
    assigner: CohortAssigner<S>,
}

impl<R: StudentRepository, S: CohortStore> EnrollmentService<R, S> {
    pub fn new(parser: IdentityParser, students: R, assigner: CohortAssigner<S>) -> Self {
        Self {
            parser,
            students,
            assigner,
        }
    }

    /// Decodes `email` without writing anything.
    pub fn preview(&self, email: &str) -> Result<AcademicIdentity, EnrollmentError> {
        Ok(self.parser.parse(email)?)
    }

    /// Creates a verified student and attaches their cohort groups.
    ///
    /// # Errors
    /// - `InvalidEmail` / `InvalidName` before anything is written.
    /// - `AlreadyRegistered` when the email is taken.
    /// - `Repo` when the student record cannot be stored.
    ///
    /// Cohort failures are returned inside the outcome, not as an error.
    pub fn enroll(&self, email: &str, name: &str) -> Result<EnrollmentOutcome, EnrollmentError> {
        let identity = self.parser.parse(email)?;
        self.enroll_with_identity(email, name, identity)
    }

    /// Same as [`enroll`](Self::enroll) with a pinned calendar year.
    pub fn enroll_at(
        &self,
        email: &str,
        name: &str,
        current_year: i32,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let identity = self.parser.parse_at(email, current_year)?;
        self.enroll_with_identity(email, name, identity)
    }

    fn enroll_with_identity(
        &self,
        email: &str,
        name: &str,
        identity: AcademicIdentity,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        if name.trim().is_empty() {
            return Err(EnrollmentError::InvalidName);
        }
        let normalized_email = email.trim().to_ascii_lowercase();
        if self.students.find_by_email(&normalized_email)?.is_some() {
            return Err(EnrollmentError::AlreadyRegistered(normalized_email));
        }

        let user_id = Uuid::new_v4();
        let student = self
            .students
            .create_student(user_id, &normalized_email, name, &identity)
            .map_err(|err| {
                if is_unique_violation(&err) {
                    EnrollmentError::AlreadyRegistered(normalized_email.clone())
                } else {
                    EnrollmentError::Repo(err)
                }
            })?;
        info!("event=student_enroll module=service status=ok user={user_id}");

        let cohorts = match self.assigner.assign_all(user_id, &student.identity) {
            Ok(report) => CohortStatus::Assigned(report),
            Err(failure) => {
                warn!(
                    "event=student_enroll module=service status=partial user={user_id} error={failure}"
                );
                CohortStatus::Partial(failure)
            }
        };

        Ok(EnrollmentOutcome { student, cohorts })
    }

    /// Re-runs cohort assignment from the stored identity.
    pub fn repair_cohorts(&self, user_id: UserId) -> Result<AssignmentReport, EnrollmentError> {
        let student = self
            .students
            .get_student(user_id)?
            .ok_or(EnrollmentError::StudentNotFound(user_id))?;
        let report = self
            .assigner
            .assign_all(user_id, &student.identity)
            .map_err(EnrollmentError::CohortAssignment)?;
        info!(
            "event=cohort_repair module=service status=ok user={user_id} memberships_created={}",
            report.memberships_created()
        );
        Ok(report)
    }

    pub fn get_student(&self, user_id: UserId) -> RepoResult<Option<StudentRecord>> {
        self.students.get_student(user_id)
    }
}

fn is_unique_violation(err: &RepoError) -> bool {
    matches!(
        err,
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(code, _)))
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
