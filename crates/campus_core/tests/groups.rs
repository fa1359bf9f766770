use campus_core::db::open_db_in_memory;
use campus_core::{
    CohortKey, CohortRepository, CreateGroupRequest, GroupKind, GroupService, GroupServiceError,
    MembershipRole, SqliteCohortRepository,
};
use uuid::Uuid;

#[test]
fn create_group_normalizes_fields_and_adds_admin() {
    let conn = open_db_in_memory().unwrap();
    let service = GroupService::new(SqliteCohortRepository::try_new(&conn).unwrap());
    let creator = Uuid::new_v4();

    let mut request = CreateGroupRequest::new(GroupKind::Club, "  Robotics   Club ", creator);
    request.branch = Some(" cse ".to_string());
    request.section = Some("b".to_string());
    request.description = Some("  Builds rovers  ".to_string());

    let group = service.create_group(request).unwrap();
    assert_eq!(group.name, "Robotics Club");
    assert_eq!(group.kind, GroupKind::Club);
    assert_eq!(group.branch.as_deref(), Some("CSE"));
    assert_eq!(group.section.as_deref(), Some("B"));
    assert_eq!(group.description.as_deref(), Some("Builds rovers"));
    assert!(!group.auto_assigned);
    assert_eq!(group.key, None);
    assert_eq!(group.created_by, Some(creator));

    let members = service.list_members(group.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, creator);
    assert_eq!(members[0].role, MembershipRole::Admin);
}

#[test]
fn create_group_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let service = GroupService::new(SqliteCohortRepository::try_new(&conn).unwrap());
    let creator = Uuid::new_v4();

    let blank = CreateGroupRequest::new(GroupKind::Custom, "   ", creator);
    assert!(matches!(
        service.create_group(blank),
        Err(GroupServiceError::InvalidName)
    ));

    let mut long = CreateGroupRequest::new(GroupKind::Custom, "Notes", creator);
    long.description = Some("x".repeat(301));
    assert!(matches!(
        service.create_group(long),
        Err(GroupServiceError::DescriptionTooLong {
            max: 300,
            actual: 301
        })
    ));

    let mut bad_year = CreateGroupRequest::new(GroupKind::Department, "Dept", creator);
    bad_year.year = Some(6);
    assert!(matches!(
        service.create_group(bad_year),
        Err(GroupServiceError::InvalidYear(6))
    ));
}

#[test]
fn manual_group_with_cohort_fields_does_not_collide_with_auto_group() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    let auto = repo
        .ensure_cohort_group(&CohortKey::branch("CSE"))
        .unwrap()
        .value;

    let service = GroupService::new(SqliteCohortRepository::try_new(&conn).unwrap());
    let mut request = CreateGroupRequest::new(GroupKind::Cohort, "CSE Branch", Uuid::new_v4());
    request.branch = Some("CSE".to_string());
    let manual = service.create_group(request).unwrap();

    assert_ne!(auto.id, manual.id);
    let found = service
        .find_cohort_group(&CohortKey::branch("CSE"))
        .unwrap()
        .unwrap();
    assert_eq!(found.id, auto.id);
    assert!(found.auto_assigned);
}

#[test]
fn list_groups_for_user_orders_levels_then_names() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    let user_id = Uuid::new_v4();

    let keys = [
        CohortKey::section("ECE", "BTech", 1, 'C'),
        CohortKey::branch("ECE"),
        CohortKey::year("ECE", "BTech", 1),
        CohortKey::class("ECE", "BTech"),
    ];
    for key in &keys {
        let group = repo.ensure_cohort_group(key).unwrap().value;
        repo.ensure_membership(user_id, group.id, MembershipRole::Member)
            .unwrap();
    }
    let service = GroupService::new(repo);
    let club = service
        .create_group(CreateGroupRequest::new(GroupKind::Club, "Astronomy", user_id))
        .unwrap();

    let names: Vec<_> = service
        .list_groups_for_user(user_id)
        .unwrap()
        .into_iter()
        .map(|group| group.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "ECE Branch",
            "BTech ECE",
            "BTech ECE Year 1",
            "ECE BTech Y1 Sec-C",
            "Astronomy",
        ]
    );
    assert_eq!(service.get_group(club.id).unwrap().unwrap().name, "Astronomy");
}

#[test]
fn get_missing_group_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    assert!(repo.get_group(Uuid::new_v4()).unwrap().is_none());
}
