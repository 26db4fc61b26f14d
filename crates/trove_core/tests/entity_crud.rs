use rusqlite::Connection;
use trove_core::db::open_db_in_memory;
use trove_core::{
    EntityDraft, EntityKind, EntityListQuery, EntityRef, EntityRepository, FieldPatch, KindFields,
    SqliteEntityRepository, StoreError, TodoStatus, ValidationError,
};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn create_and_get_roundtrip_per_kind() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let place = repo
        .create(&EntityDraft::Place {
            title: "Harbor".to_string(),
            lat: 45.4375,
            lng: 12.3358,
        })
        .unwrap();
    let loaded = repo.get(place.entity_ref()).unwrap().unwrap();
    assert_eq!(loaded.title, "Harbor");
    assert!(matches!(loaded.fields, KindFields::Place { lat, lng } if lat == 45.4375 && lng == 12.3358));
    assert!(loaded.created_at > 0);

    let note = repo
        .create(&EntityDraft::Note {
            title: "Packing list".to_string(),
            content: "passport, charger".to_string(),
        })
        .unwrap();
    let loaded = repo.get(note.entity_ref()).unwrap().unwrap();
    assert!(matches!(loaded.fields, KindFields::Note { content } if content == "passport, charger"));

    let todo = repo
        .create(&EntityDraft::Todo {
            title: "Book tickets".to_string(),
        })
        .unwrap();
    let loaded = repo.get(todo.entity_ref()).unwrap().unwrap();
    assert!(matches!(
        loaded.fields,
        KindFields::Todo {
            status: TodoStatus::Incomplete
        }
    ));
}

#[test]
fn ids_are_not_shared_across_kinds() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let person = repo
        .create(&EntityDraft::Person {
            title: "Ada".to_string(),
        })
        .unwrap();

    // The same id under another kind addresses nothing.
    let wrong_kind = EntityRef::new(EntityKind::Note, person.id);
    assert!(repo.get(wrong_kind).unwrap().is_none());
    assert!(repo.exists(person.entity_ref()).unwrap());
    assert!(!repo.exists(wrong_kind).unwrap());
}

#[test]
fn create_normalizes_custom_object_type() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let created = repo
        .create(&EntityDraft::CustomObject {
            title: "Catan".to_string(),
            object_type: "Board  Games".to_string(),
            mood: 4,
        })
        .unwrap();

    assert!(matches!(
        created.fields,
        KindFields::CustomObject { object_type, mood } if object_type == "board-games" && mood == 4
    ));
}

#[test]
fn create_rejects_invalid_drafts() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let err = repo
        .create(&EntityDraft::Person {
            title: "".to_string(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::EmptyTitle)
    ));

    let err = repo
        .create(&EntityDraft::Place {
            title: "Bad".to_string(),
            lat: 12.0,
            lng: 200.0,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::CoordinateOutOfRange { .. })
    ));
}

#[test]
fn list_orders_newest_first_with_id_tiebreak() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let a = repo
        .create(&EntityDraft::Person { title: "a".to_string() })
        .unwrap();
    let b = repo
        .create(&EntityDraft::Person { title: "b".to_string() })
        .unwrap();
    let c = repo
        .create(&EntityDraft::Person { title: "c".to_string() })
        .unwrap();

    set_created_at(&conn, "people", a.id, 1_000);
    set_created_at(&conn, "people", b.id, 3_000);
    set_created_at(&conn, "people", c.id, 2_000);

    let listed = repo
        .list(EntityKind::Person, &EntityListQuery::default())
        .unwrap();
    let titles: Vec<_> = listed.iter().map(|entity| entity.title.as_str()).collect();
    assert_eq!(titles, ["b", "c", "a"]);
}

#[test]
fn list_pagination_with_limit_and_offset_is_stable() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    for (title, stamp) in [("one", 1_000), ("two", 2_000), ("three", 3_000), ("four", 4_000)] {
        let created = repo
            .create(&EntityDraft::Person { title: title.to_string() })
            .unwrap();
        set_created_at(&conn, "people", created.id, stamp);
    }

    let page = repo
        .list(
            EntityKind::Person,
            &EntityListQuery {
                limit: Some(2),
                offset: 1,
                ..EntityListQuery::default()
            },
        )
        .unwrap();
    let titles: Vec<_> = page.iter().map(|entity| entity.title.as_str()).collect();
    assert_eq!(titles, ["three", "two"]);
}

#[test]
fn todo_list_pins_incomplete_oldest_first() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let old_open = repo
        .create(&EntityDraft::Todo { title: "old open".to_string() })
        .unwrap();
    let new_open = repo
        .create(&EntityDraft::Todo { title: "new open".to_string() })
        .unwrap();
    let old_done = repo
        .create(&EntityDraft::Todo { title: "old done".to_string() })
        .unwrap();
    let new_done = repo
        .create(&EntityDraft::Todo { title: "new done".to_string() })
        .unwrap();

    set_created_at(&conn, "todos", old_open.id, 1_000);
    set_created_at(&conn, "todos", new_open.id, 4_000);
    set_created_at(&conn, "todos", old_done.id, 2_000);
    set_created_at(&conn, "todos", new_done.id, 3_000);
    for done in [&old_done, &new_done] {
        repo.update_field(done.entity_ref(), &FieldPatch::Status(TodoStatus::Complete))
            .unwrap();
    }

    let listed = repo
        .list(EntityKind::Todo, &EntityListQuery::default())
        .unwrap();
    let titles: Vec<_> = listed.iter().map(|entity| entity.title.as_str()).collect();
    assert_eq!(titles, ["old open", "new open", "new done", "old done"]);
}

#[test]
fn custom_object_list_filters_by_type_membership() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    for (title, object_type) in [("Catan", "board-games"), ("Merlot", "wine"), ("Risk", "board-games")] {
        repo.create(&EntityDraft::CustomObject {
            title: title.to_string(),
            object_type: object_type.to_string(),
            mood: 3,
        })
        .unwrap();
    }

    let filtered = repo
        .list(
            EntityKind::CustomObject,
            &EntityListQuery {
                object_types: vec!["board-games".to_string()],
                ..EntityListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|entity| matches!(
        &entity.fields,
        KindFields::CustomObject { object_type, .. } if object_type == "board-games"
    )));

    // The filter only applies to custom objects.
    repo.create(&EntityDraft::Person { title: "Ada".to_string() })
        .unwrap();
    let people = repo
        .list(
            EntityKind::Person,
            &EntityListQuery {
                object_types: vec!["board-games".to_string()],
                ..EntityListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(people.len(), 1);
}

#[test]
fn recent_listing_pins_incomplete_todos_regardless_of_age() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let todo = repo
        .create(&EntityDraft::Todo { title: "ancient todo".to_string() })
        .unwrap();
    let note = repo
        .create(&EntityDraft::Note {
            title: "fresh note".to_string(),
            content: "text".to_string(),
        })
        .unwrap();
    let done = repo
        .create(&EntityDraft::Todo { title: "finished".to_string() })
        .unwrap();

    set_created_at(&conn, "todos", todo.id, 1_000);
    set_created_at(&conn, "notes", note.id, 9_000);
    set_created_at(&conn, "todos", done.id, 5_000);
    repo.update_field(done.entity_ref(), &FieldPatch::Status(TodoStatus::Complete))
        .unwrap();

    let recent = repo.list_recent(10, 0).unwrap();
    let titles: Vec<_> = recent.iter().map(|item| item.title.as_str()).collect();
    assert_eq!(titles, ["ancient todo", "fresh note", "finished"]);
    assert_eq!(recent[0].status, Some(TodoStatus::Incomplete));
}

#[test]
fn update_field_enforces_the_whitelist() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let note = repo
        .create(&EntityDraft::Note {
            title: "draft".to_string(),
            content: "v1".to_string(),
        })
        .unwrap();
    let todo = repo
        .create(&EntityDraft::Todo { title: "task".to_string() })
        .unwrap();

    repo.update_field(note.entity_ref(), &FieldPatch::Title("renamed".to_string()))
        .unwrap();
    repo.update_field(note.entity_ref(), &FieldPatch::Content("v2".to_string()))
        .unwrap();
    repo.update_field(todo.entity_ref(), &FieldPatch::Status(TodoStatus::Complete))
        .unwrap();

    let err = repo
        .update_field(note.entity_ref(), &FieldPatch::Status(TodoStatus::Complete))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidField {
            kind: EntityKind::Note,
            field: "status"
        }
    ));

    let err = repo
        .update_field(todo.entity_ref(), &FieldPatch::Content("nope".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidField {
            kind: EntityKind::Todo,
            field: "content"
        }
    ));

    let err = repo
        .update_field(note.entity_ref(), &FieldPatch::Title("  ".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::EmptyTitle)
    ));

    let loaded = repo.get(note.entity_ref()).unwrap().unwrap();
    assert_eq!(loaded.title, "renamed");
    assert!(matches!(loaded.fields, KindFields::Note { content } if content == "v2"));
}

#[test]
fn update_and_delete_of_missing_rows_return_not_found() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let missing = EntityRef::new(EntityKind::Person, Uuid::new_v4());
    assert!(matches!(
        repo.update_field(missing, &FieldPatch::Title("x".to_string())),
        Err(StoreError::NotFound(entity)) if entity == missing
    ));
    assert!(matches!(
        repo.delete_row(missing),
        Err(StoreError::NotFound(entity)) if entity == missing
    ));
}

#[test]
fn count_and_distinct_types_cover_all_kinds() {
    let conn = setup();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    assert_eq!(repo.count_all().unwrap(), 0);

    repo.create(&EntityDraft::Person { title: "Ada".to_string() })
        .unwrap();
    repo.create(&EntityDraft::CustomObject {
        title: "Catan".to_string(),
        object_type: "board-games".to_string(),
        mood: 5,
    })
    .unwrap();
    repo.create(&EntityDraft::CustomObject {
        title: "Merlot".to_string(),
        object_type: "wine".to_string(),
        mood: 4,
    })
    .unwrap();

    assert_eq!(repo.count_all().unwrap(), 3);
    assert_eq!(
        repo.distinct_custom_object_types().unwrap(),
        vec!["board-games".to_string(), "wine".to_string()]
    );
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteEntityRepository::try_new(&conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_missing_required_tables() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "PRAGMA user_version = {};",
        trove_core::db::migrations::latest_version()
    ))
    .unwrap();

    assert!(matches!(
        SqliteEntityRepository::try_new(&conn),
        Err(StoreError::MissingRequiredTable("places"))
    ));
}

fn set_created_at(conn: &Connection, table: &str, id: Uuid, stamp: i64) {
    conn.execute(
        &format!("UPDATE {table} SET created_at = ?1 WHERE id = ?2;"),
        rusqlite::params![stamp, id.to_string()],
    )
    .unwrap();
}
