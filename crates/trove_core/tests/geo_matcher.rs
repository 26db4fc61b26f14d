use rusqlite::Connection;
use trove_core::db::open_db_in_memory;
use trove_core::{
    Entity, EntityDraft, EntityKind, EntityRepository, GeoMatcher, KindFields,
    SqliteEntityRepository,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_place(conn: &Connection, title: &str, lat: f64, lng: f64) -> Entity {
    let repo = SqliteEntityRepository::try_new(conn).unwrap();
    repo.create(&EntityDraft::Place {
        title: title.to_string(),
        lat,
        lng,
    })
    .unwrap()
}

fn place_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM places;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn empty_place_set_always_creates() {
    let conn = setup();
    let matcher = GeoMatcher::default();

    let matched = matcher
        .match_or_create(&conn, 46.0, 9.0, "trip.jpg")
        .unwrap();

    assert!(matched.created);
    assert_eq!(matched.place.title, "trip.jpg");
    assert_eq!(matched.place.kind, EntityKind::Place);
    assert!(matches!(
        matched.place.fields,
        KindFields::Place { lat, lng } if lat == 46.0 && lng == 9.0
    ));
    assert_eq!(place_count(&conn), 1);
}

#[test]
fn candidate_within_tolerance_attaches_to_existing_place() {
    let conn = setup();
    let matcher = GeoMatcher::default();
    let existing = create_place(&conn, "Piazza", 45.0, 9.0);

    // Roughly 1.5 meters away.
    let matched = matcher
        .match_or_create(&conn, 45.000010, 9.000010, "photo.jpg")
        .unwrap();

    assert!(!matched.created);
    assert_eq!(matched.place.id, existing.id);
    assert_eq!(place_count(&conn), 1);
}

#[test]
fn distant_candidate_creates_a_new_place() {
    let conn = setup();
    let matcher = GeoMatcher::default();
    let existing = create_place(&conn, "Piazza", 45.0, 9.0);

    // One degree of latitude is about 111 km.
    let matched = matcher
        .match_or_create(&conn, 46.0, 9.0, "far-away.jpg")
        .unwrap();

    assert!(matched.created);
    assert_ne!(matched.place.id, existing.id);
    assert_eq!(matched.place.title, "far-away.jpg");
    assert_eq!(place_count(&conn), 2);
}

#[test]
fn nearest_of_several_places_wins() {
    let conn = setup();
    let matcher = GeoMatcher::default();
    create_place(&conn, "Far", 45.1, 9.0);
    let near = create_place(&conn, "Near", 45.0, 9.0);

    let matched = matcher
        .match_or_create(&conn, 45.00001, 9.00001, "photo.jpg")
        .unwrap();

    assert!(!matched.created);
    assert_eq!(matched.place.id, near.id);
}

#[test]
fn equidistant_minimum_attaches_without_creating() {
    let conn = setup();
    let matcher = GeoMatcher::default();
    let first = create_place(&conn, "Twin A", 45.0, 9.0);
    let second = create_place(&conn, "Twin B", 45.0, 9.0);

    let matched = matcher
        .match_or_create(&conn, 45.0, 9.0, "photo.jpg")
        .unwrap();

    // Which twin wins is unspecified; what matters is that no third row
    // appears.
    assert!(!matched.created);
    assert!(matched.place.id == first.id || matched.place.id == second.id);
    assert_eq!(place_count(&conn), 2);
}

#[test]
fn boundary_just_inside_tolerance_attaches() {
    let conn = setup();
    let matcher = GeoMatcher::default();
    let existing = create_place(&conn, "Corner", 45.0, 9.0);

    // ~40 m north: inside the 50 m radius.
    let matched = matcher
        .match_or_create(&conn, 45.00036, 9.0, "photo.jpg")
        .unwrap();
    assert!(!matched.created);
    assert_eq!(matched.place.id, existing.id);

    // ~67 m north: outside the radius, so a new place appears.
    let matched = matcher
        .match_or_create(&conn, 45.0006, 9.0, "photo.jpg")
        .unwrap();
    assert!(matched.created);
    assert_eq!(place_count(&conn), 2);
}
