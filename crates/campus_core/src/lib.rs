//! Core domain logic for the campus network.
//!
//! Decodes institutional student emails into academic identities and keeps
//! students attached to their auto-assigned cohort groups.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, AssignerConfig, CampusConfig, ConfigError, FanOutMode, ParserConfig};
pub use db::{open_db, open_db_in_memory, DbError, SqliteStore};
pub use identity::{parse_student_email, IdentityParseError, IdentityParser, InvalidFormatReason};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cohort::{
    CohortGroup, CohortKey, CohortLevel, Ensured, GroupId, GroupKind, Membership, MembershipRole,
    UserId,
};
pub use model::identity::AcademicIdentity;
pub use model::student::StudentRecord;
pub use repo::cohort_repo::{CohortRepository, NewGroup, SqliteCohortRepository};
pub use repo::student_repo::{SqliteStudentRepository, StudentRepository};
pub use repo::{RepoError, RepoResult};
pub use service::cohort_assigner::{
    AssignError, AssignmentReport, CohortAssigner, CohortStore, LevelAssignment, LevelFailure,
    PartialAssignmentFailure,
};
pub use service::enrollment_service::{
    CohortStatus, EnrollmentError, EnrollmentOutcome, EnrollmentService,
};
pub use service::group_service::{CreateGroupRequest, GroupService, GroupServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
