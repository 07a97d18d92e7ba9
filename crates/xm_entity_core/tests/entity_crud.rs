use xm_entity_core::db::open_db_in_memory;
use xm_entity_core::{
    CompositionKind, EntityRepository, EntityService, NewCalendarEvent, NewChild, NewVote,
    RepoError, SqliteEntityRepository,
};
use uuid::Uuid;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn create_and_get_entity_starts_at_version_zero() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());

    let created = service.create_entity("ACC-1", "ACCOUNT", "Account").unwrap();
    assert_eq!(created.version, 0);
    assert!(created.created_at > 0);

    let loaded = service.get_entity(created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert!(service.exists(created.id).unwrap());
    assert!(!service.exists(Uuid::new_v4()).unwrap());
}

#[test]
fn rename_increments_version_and_rejects_stale_copy() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let created = service.create_entity("ACC-1", "ACCOUNT", "Account").unwrap();

    let renamed = service.rename_entity(&created, "Renamed").unwrap();
    assert_eq!(renamed.version, 1);
    assert_eq!(renamed.name, "Renamed");

    let err = service.rename_entity(&created, "Stale").unwrap_err();
    match err {
        RepoError::VersionConflict {
            id,
            expected,
            actual,
        } => {
            assert_eq!(id, created.id);
            assert_eq!(expected, 0);
            assert_eq!(actual, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn update_of_missing_entity_returns_not_found() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let detached = xm_entity_core::XmEntity::new("GHOST", "ACCOUNT", "Ghost");

    let err = service.update_entity(&detached).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == detached.id));
}

#[test]
fn create_rejects_blank_type_key() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());

    let err = service.create_entity("K", "  ", "Name").unwrap_err();
    assert!(matches!(err, RepoError::InvalidEntity(_)));
}

#[test]
fn link_requires_existing_endpoints_and_bumps_source_version() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let source = service.create_entity("S", "ACCOUNT", "Source").unwrap();
    let target = service.create_entity("T", "ACCOUNT", "Target").unwrap();

    let link = service.link(source.id, "owns", target.id).unwrap();
    assert_eq!(link.source_id, source.id);
    assert_eq!(link.target_id, target.id);

    assert_eq!(service.get_entity(source.id).unwrap().unwrap().version, 1);
    assert_eq!(service.get_entity(target.id).unwrap().unwrap().version, 0);
    assert_eq!(service.links_from(source.id).unwrap(), vec![link.clone()]);
    assert_eq!(service.links_to(target.id).unwrap(), vec![link]);

    let missing = Uuid::new_v4();
    let err = service.link(source.id, "owns", missing).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
    assert_eq!(service.links_from(source.id).unwrap().len(), 1);
}

#[test]
fn self_link_is_allowed() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let entity = service.create_entity("S", "ACCOUNT", "Self").unwrap();

    let link = service.link(entity.id, "self", entity.id).unwrap();
    assert!(link.is_self_link());
}

#[test]
fn children_are_counted_per_kind_and_bump_owner_version() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let owner = service.create_entity("O", "ACCOUNT", "Owner").unwrap();

    let refs = service
        .add_children(
            owner.id,
            &[
                NewChild::Tag {
                    type_key: "TAG".to_string(),
                    name: "red".to_string(),
                },
                NewChild::Calendar {
                    type_key: "CAL".to_string(),
                    name: "Main".to_string(),
                    events: vec![NewCalendarEvent {
                        type_key: "EVENT".to_string(),
                        title: "Kickoff".to_string(),
                    }],
                },
                NewChild::Rating {
                    type_key: "STARS".to_string(),
                    votes: vec![NewVote {
                        user_key: "alice".to_string(),
                        value: 4.5,
                        message: None,
                    }],
                },
            ],
        )
        .unwrap();

    assert_eq!(refs.len(), 3);
    assert!(refs.iter().all(|child| child.owner_id == owner.id));
    assert_eq!(repo.count_children(owner.id, CompositionKind::Tag).unwrap(), 1);
    assert_eq!(
        repo.count_children(owner.id, CompositionKind::Calendar)
            .unwrap(),
        1
    );
    assert_eq!(
        repo.count_children(owner.id, CompositionKind::Comment)
            .unwrap(),
        0
    );
    assert_eq!(service.count_all_children(owner.id).unwrap(), 3);
    assert_eq!(service.get_entity(owner.id).unwrap().unwrap().version, 3);

    let events: i64 = conn
        .query_row("SELECT COUNT(*) FROM calendar_event;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(events, 1);
}

#[test]
fn add_child_to_missing_owner_returns_not_found() {
    let conn = setup();
    let service = EntityService::new(SqliteEntityRepository::try_new(&conn).unwrap());
    let missing = Uuid::new_v4();

    let err = service
        .add_child(
            missing,
            &NewChild::Comment {
                user_key: "bob".to_string(),
                message: "hello".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();

    let err = SqliteEntityRepository::try_new(&conn)
        .err()
        .expect("unmigrated connection must be rejected");
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}
