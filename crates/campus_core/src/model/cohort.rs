//! Cohort group and membership records.
//!
//! # Invariants
//! - `CohortKey` fields beyond its level are always `None`.
//! - `CohortKey::storage_key` is unique per distinct key tuple.

use crate::model::identity::AcademicIdentity;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a group.
pub type GroupId = Uuid;

/// Stable identifier of a user, owned by the external account system.
pub type UserId = Uuid;

/// Group category. Auto-assigned groups are always `Cohort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Cohort,
    Club,
    Department,
    Custom,
}

impl GroupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cohort => "cohort",
            Self::Club => "club",
            Self::Department => "department",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cohort" => Some(Self::Cohort),
            "club" => Some(Self::Club),
            "department" => Some(Self::Department),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Level in the cohort containment hierarchy, broadest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortLevel {
    Branch,
    Class,
    Year,
    Section,
}

impl CohortLevel {
    /// All levels, broadest first.
    pub const ALL: [CohortLevel; 4] = [
        CohortLevel::Branch,
        CohortLevel::Class,
        CohortLevel::Year,
        CohortLevel::Section,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Class => "class",
            Self::Year => "year",
            Self::Section => "section",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "branch" => Some(Self::Branch),
            "class" => Some(Self::Class),
            "year" => Some(Self::Year),
            "section" => Some(Self::Section),
            _ => None,
        }
    }

    /// Display-name and description templates rendered at creation time.
    ///
    /// Placeholders: `{branch}`, `{class}`, `{year}`, `{section}`.
    pub fn templates(self) -> (&'static str, &'static str) {
        match self {
            Self::Branch => ("{branch} Branch", "All students from {branch} department"),
            Self::Class => (
                "{class} {branch}",
                "All {class} students from {branch} department",
            ),
            Self::Year => (
                "{class} {branch} Year {year}",
                "{class} {branch} students in Year {year}",
            ),
            Self::Section => (
                "{branch} {class} Y{year} Sec-{section}",
                "{class} {branch} Year {year} Section {section}",
            ),
        }
    }
}

impl Display for CohortLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminating key `(branch, className, year, section)` of one cohort group.
///
/// Fields below the key's level are fixed to `None`; construct through
/// [`CohortKey::for_level`] or the per-level constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortKey {
    level: CohortLevel,
    branch: String,
    class_name: Option<String>,
    year: Option<u8>,
    section: Option<char>,
}

impl CohortKey {
    pub fn branch(branch: impl Into<String>) -> Self {
        Self {
            level: CohortLevel::Branch,
            branch: branch.into(),
            class_name: None,
            year: None,
            section: None,
        }
    }

    pub fn class(branch: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            level: CohortLevel::Class,
            class_name: Some(class_name.into()),
            ..Self::branch(branch)
        }
    }

    pub fn year(branch: impl Into<String>, class_name: impl Into<String>, year: u8) -> Self {
        Self {
            level: CohortLevel::Year,
            year: Some(year),
            ..Self::class(branch, class_name)
        }
    }

    pub fn section(
        branch: impl Into<String>,
        class_name: impl Into<String>,
        year: u8,
        section: char,
    ) -> Self {
        Self {
            level: CohortLevel::Section,
            section: Some(section.to_ascii_uppercase()),
            ..Self::year(branch, class_name, year)
        }
    }

    /// Projects an identity onto the key of one hierarchy level.
    pub fn for_level(level: CohortLevel, identity: &AcademicIdentity) -> Self {
        let branch = identity.branch.as_str();
        let class_name = identity.class_name.as_str();
        match level {
            CohortLevel::Branch => Self::branch(branch),
            CohortLevel::Class => Self::class(branch, class_name),
            CohortLevel::Year => Self::year(branch, class_name, identity.academic_year),
            CohortLevel::Section => Self::section(
                branch,
                class_name,
                identity.academic_year,
                identity.section,
            ),
        }
    }

    pub fn level(&self) -> CohortLevel {
        self.level
    }

    pub fn branch_label(&self) -> &str {
        self.branch.as_str()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn academic_year(&self) -> Option<u8> {
        self.year
    }

    pub fn section_letter(&self) -> Option<char> {
        self.section
    }

    /// Canonical unique string for the key tuple.
    ///
    /// Unused levels render empty so that the storage uniqueness constraint
    /// never has to compare NULLs. Components are escaped, so labels that
    /// contain `:` cannot collide with a different tuple.
    pub fn storage_key(&self) -> String {
        let year = self.year.map(|year| year.to_string()).unwrap_or_default();
        let section = self.section.map(String::from).unwrap_or_default();
        let components = [
            self.branch.as_str(),
            self.class_name.as_deref().unwrap_or_default(),
            year.as_str(),
            section.as_str(),
        ];

        let mut key = String::from(self.level.as_str());
        for component in components {
            key.push(':');
            push_escaped(&mut key, component);
        }
        key
    }

    /// Renders the level's name and description templates for this key.
    pub fn render_name_and_description(&self) -> (String, String) {
        let (name, description) = self.level.templates();
        (self.render(name), self.render(description))
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{branch}", &self.branch)
            .replace("{class}", self.class_name.as_deref().unwrap_or_default())
            .replace(
                "{year}",
                &self.year.map(|year| year.to_string()).unwrap_or_default(),
            )
            .replace(
                "{section}",
                &self.section.map(String::from).unwrap_or_default(),
            )
    }
}

fn push_escaped(out: &mut String, component: &str) {
    for ch in component.chars() {
        if matches!(ch, ':' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Persisted group record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortGroup {
    pub id: GroupId,
    pub kind: GroupKind,
    /// Present for auto-assigned cohort groups only.
    pub key: Option<CohortKey>,
    pub name: String,
    pub branch: Option<String>,
    pub class_name: Option<String>,
    pub year: Option<u8>,
    pub section: Option<String>,
    pub description: Option<String>,
    pub auto_assigned: bool,
    pub created_by: Option<UserId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl CohortGroup {
    pub fn level(&self) -> Option<CohortLevel> {
        self.key.as_ref().map(CohortKey::level)
    }
}

/// Role held by a user inside a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    #[default]
    Member,
    Moderator,
    Admin,
}

impl MembershipRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Join record of one user and one group. `(user_id, group_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub group_id: GroupId,
    pub role: MembershipRole,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Result of a find-or-create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured<T> {
    pub value: T,
    /// `true` when this call inserted the row.
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::{CohortKey, CohortLevel};

    #[test]
    fn storage_keys_are_distinct_per_level() {
        let keys = [
            CohortKey::branch("CSE"),
            CohortKey::class("CSE", "BTech"),
            CohortKey::year("CSE", "BTech", 2),
            CohortKey::section("CSE", "BTech", 2, 'a'),
        ];
        let rendered: std::collections::HashSet<_> =
            keys.iter().map(CohortKey::storage_key).collect();
        assert_eq!(rendered.len(), 4);
        assert_eq!(keys[0].storage_key(), "branch:CSE:::");
        assert_eq!(keys[3].storage_key(), "section:CSE:BTech:2:A");
    }

    #[test]
    fn separator_inside_labels_does_not_collide() {
        let left = CohortKey::class("A:B", "C");
        let right = CohortKey::class("A", "B:C");
        assert_ne!(left.storage_key(), right.storage_key());
        assert_eq!(left.storage_key(), r"class:A\:B:C::");
        assert_ne!(
            CohortKey::branch(r"A\").storage_key(),
            CohortKey::branch(r"A\:").storage_key()
        );
    }

    #[test]
    fn section_key_renders_source_naming() {
        let key = CohortKey::section("ECE", "BTech", 3, 'B');
        let (name, description) = key.render_name_and_description();
        assert_eq!(name, "ECE BTech Y3 Sec-B");
        assert_eq!(description, "BTech ECE Year 3 Section B");
        assert_eq!(key.level(), CohortLevel::Section);
    }

    #[test]
    fn branch_key_leaves_lower_levels_unset() {
        let key = CohortKey::branch("MECH");
        assert_eq!(key.class_name(), None);
        assert_eq!(key.academic_year(), None);
        assert_eq!(key.section_letter(), None);
        let (name, _) = key.render_name_and_description();
        assert_eq!(name, "MECH Branch");
    }
}
