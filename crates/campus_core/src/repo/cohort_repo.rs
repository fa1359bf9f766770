//! Cohort group/membership repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Find-or-create cohort groups by their discriminating key.
//! - Create memberships with create-if-absent semantics.
//! - Serve group and membership read models.
//!
//! # Invariants
//! - At most one group row exists per `CohortKey::storage_key`.
//! - At most one membership row exists per `(user, group)`.
//! - Existing membership roles are never rewritten by `ensure_membership`.

use crate::model::cohort::{
    CohortGroup, CohortKey, CohortLevel, Ensured, GroupId, GroupKind, Membership, MembershipRole,
    UserId,
};
use crate::repo::{bool_to_int, ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const GROUP_SELECT_SQL: &str = "SELECT
    g.group_uuid,
    g.kind,
    g.cohort_level,
    g.cohort_key,
    g.name,
    g.branch,
    g.class_name,
    g.year,
    g.section,
    g.description,
    g.is_auto_assigned,
    g.created_by,
    g.created_at
FROM groups g";

const LEVEL_ORDER_SQL: &str = "CASE g.cohort_level
        WHEN 'branch' THEN 0
        WHEN 'class' THEN 1
        WHEN 'year' THEN 2
        WHEN 'section' THEN 3
        ELSE 4
    END";

/// Input for manually created (non auto-assigned) groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub kind: GroupKind,
    pub name: String,
    pub branch: Option<String>,
    pub class_name: Option<String>,
    pub year: Option<u8>,
    pub section: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<UserId>,
}

/// Repository interface for cohort groups and memberships.
pub trait CohortRepository {
    /// Returns the group for `key`, inserting it when absent.
    fn ensure_cohort_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>>;
    /// Returns the `(user, group)` membership, inserting it with `role` when absent.
    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
        role: MembershipRole,
    ) -> RepoResult<Ensured<Membership>>;
    fn find_cohort_group(&self, key: &CohortKey) -> RepoResult<Option<CohortGroup>>;
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<CohortGroup>>;
    /// Inserts a manually created group with a fresh id.
    fn create_group(&self, group: &NewGroup) -> RepoResult<CohortGroup>;
    /// Groups of one user, broadest cohort level first, then by name.
    fn list_groups_for_user(&self, user_id: UserId) -> RepoResult<Vec<CohortGroup>>;
    /// Members of one group in join order.
    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<Membership>>;
}

/// SQLite-backed cohort repository.
pub struct SqliteCohortRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCohortRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn get_membership(&self, user_id: UserId, group_id: GroupId) -> RepoResult<Option<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_uuid, group_uuid, role, created_at
             FROM memberships
             WHERE user_uuid = ?1 AND group_uuid = ?2;",
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), group_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_membership_row(row)?)),
            None => Ok(None),
        }
    }
}

impl CohortRepository for SqliteCohortRepository<'_> {
    fn ensure_cohort_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>> {
        let (name, description) = key.render_name_and_description();
        let inserted = self.conn.execute(
            "INSERT INTO groups (
                group_uuid,
                kind,
                cohort_level,
                cohort_key,
                name,
                branch,
                class_name,
                year,
                section,
                description,
                is_auto_assigned
            ) VALUES (?1, 'cohort', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
            ON CONFLICT (cohort_key) DO NOTHING;",
            params![
                Uuid::new_v4().to_string(),
                key.level().as_str(),
                key.storage_key(),
                name,
                key.branch_label(),
                key.class_name(),
                key.academic_year(),
                key.section_letter().map(String::from),
                description,
            ],
        )?;

        let group = self.find_cohort_group(key)?.ok_or_else(|| {
            RepoError::NotFound(format!("cohort group `{}` after upsert", key.storage_key()))
        })?;
        Ok(Ensured {
            value: group,
            created: inserted == 1,
        })
    }

    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
        role: MembershipRole,
    ) -> RepoResult<Ensured<Membership>> {
        let inserted = self.conn.execute(
            "INSERT INTO memberships (user_uuid, group_uuid, role)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_uuid, group_uuid) DO NOTHING;",
            params![user_id.to_string(), group_id.to_string(), role.as_str()],
        )?;

        let membership = self.get_membership(user_id, group_id)?.ok_or_else(|| {
            RepoError::NotFound(format!("membership {user_id}/{group_id} after upsert"))
        })?;
        Ok(Ensured {
            value: membership,
            created: inserted == 1,
        })
    }

    fn find_cohort_group(&self, key: &CohortKey) -> RepoResult<Option<CohortGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE g.cohort_key = ?1;"))?;
        let mut rows = stmt.query([key.storage_key()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_group_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<CohortGroup>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE g.group_uuid = ?1;"))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_group_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_group(&self, group: &NewGroup) -> RepoResult<CohortGroup> {
        let group_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO groups (
                group_uuid,
                kind,
                name,
                branch,
                class_name,
                year,
                section,
                description,
                is_auto_assigned,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                group_id.to_string(),
                group.kind.as_str(),
                group.name.as_str(),
                group.branch.as_deref(),
                group.class_name.as_deref(),
                group.year,
                group.section.as_deref(),
                group.description.as_deref(),
                bool_to_int(false),
                group.created_by.map(|id| id.to_string()),
            ],
        )?;

        self.get_group(group_id)?
            .ok_or_else(|| RepoError::NotFound(format!("group {group_id} after insert")))
    }

    fn list_groups_for_user(&self, user_id: UserId) -> RepoResult<Vec<CohortGroup>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GROUP_SELECT_SQL}
             JOIN memberships m ON m.group_uuid = g.group_uuid
             WHERE m.user_uuid = ?1
             ORDER BY {LEVEL_ORDER_SQL}, g.name ASC, g.group_uuid ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_uuid, group_uuid, role, created_at
             FROM memberships
             WHERE group_uuid = ?1
             ORDER BY created_at ASC, user_uuid ASC;",
        )?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_membership_row(row)?);
        }
        Ok(members)
    }
}

/// Counts stored groups for one cohort level.
pub fn count_cohort_groups(conn: &Connection, level: CohortLevel) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM groups WHERE cohort_level = ?1;",
        [level.as_str()],
        |row| row.get(0),
    )?;
    Ok(count.unsigned_abs())
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<CohortGroup> {
    let uuid_text: String = row.get("group_uuid")?;
    let id = parse_uuid(&uuid_text, "groups.group_uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = GroupKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid group kind `{kind_text}` in groups.kind"))
    })?;

    let branch: Option<String> = row.get("branch")?;
    let class_name: Option<String> = row.get("class_name")?;
    let section: Option<String> = row.get("section")?;
    let year = match row.get::<_, Option<i64>>("year")? {
        Some(value) => Some(u8::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("invalid year `{value}` in groups.year"))
        })?),
        None => None,
    };

    let key = match row.get::<_, Option<String>>("cohort_level")? {
        Some(level_text) => {
            let level = CohortLevel::parse(&level_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid cohort level `{level_text}` in groups.cohort_level"
                ))
            })?;
            let stored_key: Option<String> = row.get("cohort_key")?;
            let key = rebuild_key(
                level,
                branch.as_deref(),
                class_name.as_deref(),
                year,
                section.as_deref(),
            )?;
            if stored_key.as_deref() != Some(key.storage_key().as_str()) {
                return Err(RepoError::InvalidData(format!(
                    "groups.cohort_key does not match tuple for group {id}"
                )));
            }
            Some(key)
        }
        None => None,
    };

    let auto_assigned = match row.get::<_, i64>("is_auto_assigned")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_auto_assigned value `{other}` in groups.is_auto_assigned"
            )));
        }
    };

    let created_by = match row.get::<_, Option<String>>("created_by")? {
        Some(value) => Some(parse_uuid(&value, "groups.created_by")?),
        None => None,
    };

    Ok(CohortGroup {
        id,
        kind,
        key,
        name: row.get("name")?,
        branch,
        class_name,
        year,
        section,
        description: row.get("description")?,
        auto_assigned,
        created_by,
        created_at: row.get("created_at")?,
    })
}

fn rebuild_key(
    level: CohortLevel,
    branch: Option<&str>,
    class_name: Option<&str>,
    year: Option<u8>,
    section: Option<&str>,
) -> RepoResult<CohortKey> {
    let missing = |column: &str| {
        RepoError::InvalidData(format!(
            "cohort group at level `{level}` is missing groups.{column}"
        ))
    };
    let branch = branch.ok_or_else(|| missing("branch"))?;
    if level == CohortLevel::Branch {
        return Ok(CohortKey::branch(branch));
    }
    let class_name = class_name.ok_or_else(|| missing("class_name"))?;
    if level == CohortLevel::Class {
        return Ok(CohortKey::class(branch, class_name));
    }
    let year = year.ok_or_else(|| missing("year"))?;
    if level == CohortLevel::Year {
        return Ok(CohortKey::year(branch, class_name, year));
    }
    let section = section
        .and_then(|value| value.chars().next())
        .ok_or_else(|| missing("section"))?;
    Ok(CohortKey::section(branch, class_name, year, section))
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<Membership> {
    let user_text: String = row.get("user_uuid")?;
    let group_text: String = row.get("group_uuid")?;
    let role_text: String = row.get("role")?;
    let role = MembershipRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in memberships.role"))
    })?;

    Ok(Membership {
        user_id: parse_uuid(&user_text, "memberships.user_uuid")?,
        group_id: parse_uuid(&group_text, "memberships.group_uuid")?,
        role,
        created_at: row.get("created_at")?,
    })
}
