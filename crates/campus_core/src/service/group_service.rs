//! Group use-case service.
//!
//! # Responsibility
//! - Validate and create manually curated groups.
//! - Serve membership read models.
//!
//! # Invariants
//! - Manually created groups are never auto-assigned and carry no cohort key.
//! - The creator becomes the group's `admin` member.

use crate::model::cohort::{
    CohortGroup, CohortKey, GroupId, GroupKind, Membership, MembershipRole, UserId,
};
use crate::repo::cohort_repo::{CohortRepository, NewGroup};
use crate::repo::{RepoError, RepoResult};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DESCRIPTION_MAX_CHARS: usize = 300;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Errors from group service operations.
#[derive(Debug)]
pub enum GroupServiceError {
    /// Name is blank after trim.
    InvalidName,
    /// Description exceeds the character limit.
    DescriptionTooLong { max: usize, actual: usize },
    /// Year outside 1..=5.
    InvalidYear(u8),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for GroupServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "group name is required"),
            Self::DescriptionTooLong { max, actual } => {
                write!(f, "description has {actual} characters, limit is {max}")
            }
            Self::InvalidYear(year) => write!(f, "year must be between 1 and 5, got {year}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GroupServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GroupServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for a manually created group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupRequest {
    pub kind: GroupKind,
    pub name: String,
    pub branch: Option<String>,
    pub class_name: Option<String>,
    pub year: Option<u8>,
    pub section: Option<String>,
    pub description: Option<String>,
    pub created_by: UserId,
}

impl CreateGroupRequest {
    pub fn new(kind: GroupKind, name: impl Into<String>, created_by: UserId) -> Self {
        Self {
            kind,
            name: name.into(),
            branch: None,
            class_name: None,
            year: None,
            section: None,
            description: None,
            created_by,
        }
    }
}

/// Group service facade over repository implementations.
pub struct GroupService<R: CohortRepository> {
    repo: R,
}

impl<R: CohortRepository> GroupService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one group and makes the creator its admin.
    pub fn create_group(
        &self,
        request: CreateGroupRequest,
    ) -> Result<CohortGroup, GroupServiceError> {
        let name = normalize_name(request.name.as_str()).ok_or(GroupServiceError::InvalidName)?;
        let description = non_blank(request.description);
        if let Some(description) = description.as_deref() {
            let actual = description.chars().count();
            if actual > DESCRIPTION_MAX_CHARS {
                return Err(GroupServiceError::DescriptionTooLong {
                    max: DESCRIPTION_MAX_CHARS,
                    actual,
                });
            }
        }
        if let Some(year) = request.year {
            if !(1..=5).contains(&year) {
                return Err(GroupServiceError::InvalidYear(year));
            }
        }

        let group = self.repo.create_group(&NewGroup {
            kind: request.kind,
            name,
            branch: non_blank(request.branch).map(|value| value.to_ascii_uppercase()),
            class_name: non_blank(request.class_name),
            year: request.year,
            section: non_blank(request.section).map(|value| value.to_ascii_uppercase()),
            description,
            created_by: Some(request.created_by),
        })?;
        self.repo
            .ensure_membership(request.created_by, group.id, MembershipRole::Admin)?;

        info!(
            "event=group_create module=service status=ok group={} kind={} creator={}",
            group.id,
            group.kind.as_str(),
            request.created_by
        );
        Ok(group)
    }

    pub fn get_group(&self, group_id: GroupId) -> RepoResult<Option<CohortGroup>> {
        self.repo.get_group(group_id)
    }

    pub fn find_cohort_group(&self, key: &CohortKey) -> RepoResult<Option<CohortGroup>> {
        self.repo.find_cohort_group(key)
    }

    pub fn list_groups_for_user(&self, user_id: UserId) -> RepoResult<Vec<CohortGroup>> {
        self.repo.list_groups_for_user(user_id)
    }

    pub fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<Membership>> {
        self.repo.list_members(group_id)
    }
}

fn normalize_name(value: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{non_blank, normalize_name};

    #[test]
    fn normalize_name_collapses_whitespace() {
        assert_eq!(
            normalize_name("  Robotics \t  Club\n").as_deref(),
            Some("Robotics Club")
        );
        assert_eq!(normalize_name(" \n "), None);
    }

    #[test]
    fn non_blank_drops_whitespace_only_values() {
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(Some(" a ".to_string())).as_deref(), Some("a"));
    }
}
