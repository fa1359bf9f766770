//! Cohort auto-assignment.
//!
//! # Responsibility
//! - Ensure the four hierarchical cohort groups of an identity exist.
//! - Attach the user to each of them exactly once.
//! - Report per-level outcomes, including partial failure.
//!
//! # Invariants
//! - Each level is an independent ensure-operation; one failing level never
//!   rolls back or blocks another.
//! - Repeating `assign_all` with the same arguments writes nothing new.
//! - Race safety comes from atomic upserts in the store, not from ordering.

use crate::config::{AssignerConfig, FanOutMode};
use crate::db::SqliteStore;
use crate::model::cohort::{
    CohortGroup, CohortKey, CohortLevel, Ensured, GroupId, Membership, MembershipRole, UserId,
};
use crate::model::identity::AcademicIdentity;
use crate::repo::cohort_repo::{CohortRepository, SqliteCohortRepository};
use crate::repo::{RepoError, RepoResult};
use log::{debug, info, warn};
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

/// Storage seam used by the assigner.
///
/// Implementations must be safe to call from several threads at once and
/// must make both operations atomic find-or-create primitives.
pub trait CohortStore: Sync {
    fn ensure_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>>;
    /// Creates a `member` membership when absent; existing roles are untouched.
    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> RepoResult<Ensured<Membership>>;
}

impl<S: CohortStore + ?Sized> CohortStore for &S {
    fn ensure_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>> {
        (**self).ensure_group(key)
    }

    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> RepoResult<Ensured<Membership>> {
        (**self).ensure_membership(user_id, group_id)
    }
}

impl CohortStore for SqliteStore {
    fn ensure_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>> {
        let conn = self.checkout()?;
        SqliteCohortRepository::try_new(&conn)?.ensure_cohort_group(key)
    }

    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> RepoResult<Ensured<Membership>> {
        let conn = self.checkout()?;
        SqliteCohortRepository::try_new(&conn)?.ensure_membership(
            user_id,
            group_id,
            MembershipRole::Member,
        )
    }
}

/// Successful outcome of one level's ensure-operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelAssignment {
    pub level: CohortLevel,
    pub group: CohortGroup,
    pub group_created: bool,
    pub membership_created: bool,
}

/// Outcome of a fully successful `assign_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentReport {
    pub user_id: UserId,
    /// One entry per level, broadest first.
    pub assignments: Vec<LevelAssignment>,
}

impl AssignmentReport {
    pub fn groups_created(&self) -> usize {
        self.assignments
            .iter()
            .filter(|assignment| assignment.group_created)
            .count()
    }

    pub fn memberships_created(&self) -> usize {
        self.assignments
            .iter()
            .filter(|assignment| assignment.membership_created)
            .count()
    }

    /// `true` when the call found everything already in place.
    pub fn is_noop(&self) -> bool {
        self.groups_created() == 0 && self.memberships_created() == 0
    }

    pub fn group(&self, level: CohortLevel) -> Option<&CohortGroup> {
        self.assignments
            .iter()
            .find(|assignment| assignment.level == level)
            .map(|assignment| &assignment.group)
    }
}

/// Cause of one level's failure.
#[derive(Debug)]
pub enum AssignError {
    Repo(RepoError),
    /// The worker running this level panicked.
    Panicked(String),
}

impl Display for AssignError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Panicked(message) => write!(f, "worker panicked: {message}"),
        }
    }
}

impl Error for AssignError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

/// Failed level and its cause.
#[derive(Debug)]
pub struct LevelFailure {
    pub level: CohortLevel,
    pub error: AssignError,
}

/// One or more levels failed; successful levels stay committed.
#[derive(Debug)]
pub struct PartialAssignmentFailure {
    pub user_id: UserId,
    pub succeeded: Vec<LevelAssignment>,
    pub failed: Vec<LevelFailure>,
}

impl PartialAssignmentFailure {
    pub fn failed_levels(&self) -> Vec<CohortLevel> {
        self.failed.iter().map(|failure| failure.level).collect()
    }

    pub fn total_levels(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl Display for PartialAssignmentFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cohort assignment for user {} incomplete: {} of {} levels assigned; failed:",
            self.user_id,
            self.succeeded.len(),
            self.total_levels()
        )?;
        for failure in &self.failed {
            write!(f, " {} ({})", failure.level, failure.error)?;
        }
        Ok(())
    }
}

impl Error for PartialAssignmentFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.failed
            .first()
            .map(|failure| &failure.error as &(dyn Error + 'static))
    }
}

/// Fans an identity out into its four cohort groups.
pub struct CohortAssigner<S: CohortStore> {
    store: S,
    fan_out: FanOutMode,
}

impl<S: CohortStore> CohortAssigner<S> {
    pub fn new(store: S, config: &AssignerConfig) -> Self {
        Self {
            store,
            fan_out: config.fan_out,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ensures the group for `key` exists and `user_id` is a member of it.
    ///
    /// Idempotent: a repeat call returns the same group with both
    /// `*_created` flags false.
    pub fn ensure_group(&self, user_id: UserId, key: &CohortKey) -> RepoResult<LevelAssignment> {
        let level = key.level();
        let group = self.store.ensure_group(key)?;
        let membership = self.store.ensure_membership(user_id, group.value.id)?;
        debug!(
            "event=cohort_group_ensure module=service status=ok level={} group={} group_created={} membership_created={}",
            level, group.value.id, group.created, membership.created
        );
        Ok(LevelAssignment {
            level,
            group: group.value,
            group_created: group.created,
            membership_created: membership.created,
        })
    }

    /// Ensures branch, class, year and section membership for `user_id`.
    ///
    /// # Errors
    /// Returns `PartialAssignmentFailure` when any level fails; the other
    /// levels' writes are kept and listed in `succeeded`.
    pub fn assign_all(
        &self,
        user_id: UserId,
        identity: &AcademicIdentity,
    ) -> Result<AssignmentReport, PartialAssignmentFailure> {
        let started_at = Instant::now();
        let keys: Vec<CohortKey> = CohortLevel::ALL
            .iter()
            .map(|level| CohortKey::for_level(*level, identity))
            .collect();

        let outcomes = match self.fan_out {
            FanOutMode::Sequential => self.ensure_sequentially(user_id, &keys),
            FanOutMode::Concurrent => self.ensure_concurrently(user_id, &keys),
        };

        let mut succeeded = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (level, outcome) in outcomes {
            match outcome {
                Ok(assignment) => succeeded.push(assignment),
                Err(error) => failed.push(LevelFailure { level, error }),
            }
        }

        if failed.is_empty() {
            let report = AssignmentReport {
                user_id,
                assignments: succeeded,
            };
            info!(
                "event=cohort_assign module=service status=ok user={} levels_ok={} groups_created={} memberships_created={} duration_ms={}",
                user_id,
                report.assignments.len(),
                report.groups_created(),
                report.memberships_created(),
                started_at.elapsed().as_millis()
            );
            return Ok(report);
        }

        let failure = PartialAssignmentFailure {
            user_id,
            succeeded,
            failed,
        };
        warn!(
            "event=cohort_assign module=service status=partial user={} levels_ok={} levels_failed={} duration_ms={}",
            user_id,
            failure.succeeded.len(),
            failure.failed.len(),
            started_at.elapsed().as_millis()
        );
        Err(failure)
    }

    fn ensure_sequentially(
        &self,
        user_id: UserId,
        keys: &[CohortKey],
    ) -> Vec<(CohortLevel, Result<LevelAssignment, AssignError>)> {
        keys.iter()
            .map(|key| {
                let attempt =
                    panic::catch_unwind(AssertUnwindSafe(|| self.ensure_group(user_id, key)));
                (key.level(), level_result(attempt))
            })
            .collect()
    }

    fn ensure_concurrently(
        &self,
        user_id: UserId,
        keys: &[CohortKey],
    ) -> Vec<(CohortLevel, Result<LevelAssignment, AssignError>)> {
        thread::scope(|scope| {
            let handles: Vec<_> = keys
                .iter()
                .map(|key| {
                    let handle = scope.spawn(move || self.ensure_group(user_id, key));
                    (key.level(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(level, handle)| (level, level_result(handle.join())))
                .collect()
        })
    }
}

fn level_result(
    attempt: thread::Result<RepoResult<LevelAssignment>>,
) -> Result<LevelAssignment, AssignError> {
    match attempt {
        Ok(result) => result.map_err(AssignError::Repo),
        Err(payload) => Err(AssignError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
