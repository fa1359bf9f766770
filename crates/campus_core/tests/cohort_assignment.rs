use campus_core::repo::cohort_repo::count_cohort_groups;
use campus_core::{
    AcademicIdentity, AssignError, AssignerConfig, CohortAssigner, CohortGroup, CohortKey,
    CohortLevel, CohortRepository, CohortStore, Ensured, FanOutMode, GroupId, IdentityParser,
    Membership, MembershipRole, RepoError, RepoResult, SqliteCohortRepository, SqliteStore,
    UserId,
};
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

fn identity(email: &str) -> AcademicIdentity {
    IdentityParser::default().parse_at(email, 2025).unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn open_store(dir: &Path) -> SqliteStore {
    SqliteStore::open(dir.join("campus.db")).unwrap()
}

/// Fails every call for one level and delegates the rest.
struct FailingLevelStore<'a> {
    inner: &'a SqliteStore,
    failing: CohortLevel,
}

impl CohortStore for FailingLevelStore<'_> {
    fn ensure_group(&self, key: &CohortKey) -> RepoResult<Ensured<CohortGroup>> {
        if key.level() == self.failing {
            return Err(RepoError::InvalidData("simulated storage fault".to_string()));
        }
        self.inner.ensure_group(key)
    }

    fn ensure_membership(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> RepoResult<Ensured<Membership>> {
        self.inner.ensure_membership(user_id, group_id)
    }
}

#[test]
fn assign_all_creates_four_named_groups() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let assigner = CohortAssigner::new(&store, &AssignerConfig::default());
    let user_id = Uuid::new_v4();

    let report = assigner
        .assign_all(user_id, &identity("sm24csb0a77@student.nitw.ac.in"))
        .unwrap();

    assert_eq!(report.groups_created(), 4);
    assert_eq!(report.memberships_created(), 4);
    let names: Vec<_> = CohortLevel::ALL
        .iter()
        .map(|level| report.group(*level).unwrap().name.clone())
        .collect();
    assert_eq!(
        names,
        vec![
            "CSE Branch".to_string(),
            "BTech CSE".to_string(),
            "BTech CSE Year 2".to_string(),
            "CSE BTech Y2 Sec-A".to_string(),
        ]
    );
    for assignment in &report.assignments {
        assert!(assignment.group.auto_assigned);
        assert_eq!(assignment.group.level(), Some(assignment.level));
    }

    let branch = report.group(CohortLevel::Branch).unwrap();
    assert_eq!(branch.class_name, None);
    assert_eq!(branch.year, None);
    assert_eq!(branch.section, None);
    assert_eq!(
        branch.description.as_deref(),
        Some("All students from CSE department")
    );
}

#[test]
fn assign_all_twice_is_a_noop() {
    for fan_out in [FanOutMode::Concurrent, FanOutMode::Sequential] {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let assigner = CohortAssigner::new(&store, &AssignerConfig { fan_out });
        let user_id = Uuid::new_v4();
        let identity = identity("sm24csb0a77@student.nitw.ac.in");

        let first = assigner.assign_all(user_id, &identity).unwrap();
        let second = assigner.assign_all(user_id, &identity).unwrap();
        assert!(second.is_noop());
        for level in CohortLevel::ALL {
            assert_eq!(
                first.group(level).map(|group| group.id),
                second.group(level).map(|group| group.id)
            );
        }

        let conn = store.checkout().unwrap();
        assert_eq!(count(&conn, "groups"), 4);
        assert_eq!(count(&conn, "memberships"), 4);
    }
}

#[test]
fn concurrent_users_in_same_cohort_share_one_group_per_level() {
    const USERS: usize = 64;
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let assigner = CohortAssigner::new(&store, &AssignerConfig::default());
    let identity = identity("sm24csb0a77@student.nitw.ac.in");
    let users: Vec<UserId> = (0..USERS).map(|_| Uuid::new_v4()).collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = users
            .iter()
            .map(|user_id| {
                let assigner = &assigner;
                let identity = &identity;
                scope.spawn(move || assigner.assign_all(*user_id, identity))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    });

    let conn = store.checkout().unwrap();
    for level in CohortLevel::ALL {
        assert_eq!(count_cohort_groups(&conn, level).unwrap(), 1, "{level}");
    }
    assert_eq!(count(&conn, "groups"), 4);
    assert_eq!(count(&conn, "memberships"), (USERS * 4) as i64);

    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    let section = repo
        .find_cohort_group(&CohortKey::section("CSE", "BTech", 2, 'A'))
        .unwrap()
        .unwrap();
    assert_eq!(repo.list_members(section.id).unwrap().len(), USERS);
}

#[test]
fn concurrent_repeats_for_same_user_do_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let assigner = CohortAssigner::new(&store, &AssignerConfig::default());
    let identity = identity("sm23ecbb12@student.nitw.ac.in");
    let user_id = Uuid::new_v4();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| scope.spawn(|| assigner.assign_all(user_id, &identity)))
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    });

    let conn = store.checkout().unwrap();
    assert_eq!(count(&conn, "groups"), 4);
    assert_eq!(count(&conn, "memberships"), 4);
}

#[test]
fn different_sections_share_broader_levels() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let assigner = CohortAssigner::new(&store, &AssignerConfig::default());

    let a = assigner
        .assign_all(Uuid::new_v4(), &identity("sm24csb0a1@student.nitw.ac.in"))
        .unwrap();
    let b = assigner
        .assign_all(Uuid::new_v4(), &identity("sm24csb0b2@student.nitw.ac.in"))
        .unwrap();
    let mech = assigner
        .assign_all(Uuid::new_v4(), &identity("sm24meb0a3@student.nitw.ac.in"))
        .unwrap();

    assert_eq!(b.groups_created(), 1);
    assert_eq!(mech.groups_created(), 4);
    for level in [CohortLevel::Branch, CohortLevel::Class, CohortLevel::Year] {
        assert_eq!(a.group(level).unwrap().id, b.group(level).unwrap().id);
    }
    assert_ne!(
        a.group(CohortLevel::Section).unwrap().id,
        b.group(CohortLevel::Section).unwrap().id
    );

    let conn = store.checkout().unwrap();
    assert_eq!(count(&conn, "groups"), 9);
}

#[test]
fn failing_section_level_keeps_other_levels() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let faulty = FailingLevelStore {
        inner: &store,
        failing: CohortLevel::Section,
    };
    let assigner = CohortAssigner::new(faulty, &AssignerConfig::default());
    let user_id = Uuid::new_v4();
    let identity = identity("sm24csb0a77@student.nitw.ac.in");

    let failure = assigner.assign_all(user_id, &identity).unwrap_err();
    assert_eq!(failure.failed_levels(), vec![CohortLevel::Section]);
    assert_eq!(failure.succeeded.len(), 3);
    assert!(matches!(
        failure.failed[0].error,
        AssignError::Repo(RepoError::InvalidData(_))
    ));
    assert!(failure.to_string().contains("3 of 4 levels assigned"));

    let conn = store.checkout().unwrap();
    assert_eq!(count(&conn, "groups"), 3);
    assert_eq!(count(&conn, "memberships"), 3);
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    let groups = repo.list_groups_for_user(user_id).unwrap();
    let levels: Vec<_> = groups.iter().filter_map(CohortGroup::level).collect();
    assert_eq!(
        levels,
        vec![CohortLevel::Branch, CohortLevel::Class, CohortLevel::Year]
    );
    drop(conn);

    let healthy = CohortAssigner::new(&store, &AssignerConfig::default());
    let repaired = healthy.assign_all(user_id, &identity).unwrap();
    assert_eq!(repaired.groups_created(), 1);
    assert_eq!(repaired.memberships_created(), 1);
}

#[test]
fn ensure_membership_never_changes_existing_role() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let user_id = Uuid::new_v4();
    let conn = store.checkout().unwrap();
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();

    let group = repo
        .ensure_cohort_group(&CohortKey::branch("EEE"))
        .unwrap()
        .value;
    let first = repo
        .ensure_membership(user_id, group.id, MembershipRole::Moderator)
        .unwrap();
    assert!(first.created);

    let again = store.ensure_membership(user_id, group.id).unwrap();
    assert!(!again.created);
    assert_eq!(again.value.role, MembershipRole::Moderator);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteCohortRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection { actual: 0, .. }
    ));
}

#[test]
fn labels_containing_separator_get_distinct_groups() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let assigner = CohortAssigner::new(&store, &AssignerConfig::default());
    let mut first = identity("sm24csb0a77@student.nitw.ac.in");
    first.branch = "A:B".to_string();
    first.class_name = "C".to_string();
    let mut second = first.clone();
    second.branch = "A".to_string();
    second.class_name = "B:C".to_string();

    let first_report = assigner.assign_all(Uuid::new_v4(), &first).unwrap();
    let second_report = assigner.assign_all(Uuid::new_v4(), &second).unwrap();

    let first_class = first_report.group(CohortLevel::Class).unwrap();
    let second_class = second_report.group(CohortLevel::Class).unwrap();
    assert_ne!(first_class.id, second_class.id);
    assert_eq!(second_class.branch.as_deref(), Some("A"));
    assert_eq!(second_class.class_name.as_deref(), Some("B:C"));

    let conn = store.checkout().unwrap();
    assert_eq!(count(&conn, "groups"), 8);
}
