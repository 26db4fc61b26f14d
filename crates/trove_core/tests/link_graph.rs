use rusqlite::Connection;
use trove_core::db::open_db_in_memory;
use trove_core::{
    EntityDraft, EntityRef, EntityRepository, LinkRepository, SqliteEntityRepository,
    SqliteLinkRepository, DEFAULT_EXPANSION_DEPTH,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_note(conn: &Connection, title: &str) -> EntityRef {
    let repo = SqliteEntityRepository::try_new(conn).unwrap();
    repo.create(&EntityDraft::Note {
        title: title.to_string(),
        content: String::new(),
    })
    .unwrap()
    .entity_ref()
}

fn edge_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM links;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn add_edge_is_symmetric() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");

    assert!(repo.add_edge(a, b).unwrap());

    assert_eq!(repo.neighbors(a).unwrap(), vec![b]);
    assert_eq!(repo.neighbors(b).unwrap(), vec![a]);
}

#[test]
fn add_edge_twice_in_either_direction_keeps_one_row() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");

    assert!(repo.add_edge(a, b).unwrap());
    assert!(!repo.add_edge(a, b).unwrap());
    assert!(!repo.add_edge(b, a).unwrap());

    assert_eq!(edge_count(&conn), 1);
    assert_eq!(repo.neighbors(a).unwrap().len(), 1);
}

#[test]
fn self_edges_are_silently_ignored() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");

    assert!(!repo.add_edge(a, a).unwrap());

    assert_eq!(edge_count(&conn), 0);
    assert!(repo.neighbors(a).unwrap().is_empty());
}

#[test]
fn remove_edge_works_regardless_of_recorded_direction() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");

    repo.add_edge(a, b).unwrap();
    assert!(repo.remove_edge(b, a).unwrap());
    assert!(!repo.remove_edge(b, a).unwrap());

    assert!(repo.neighbors(a).unwrap().is_empty());
    assert!(repo.neighbors(b).unwrap().is_empty());
}

#[test]
fn link_then_unlink_leaves_no_neighbors() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");

    repo.add_edge(a, b).unwrap();
    repo.remove_edge(a, b).unwrap();

    assert!(repo.neighbors(a).unwrap().is_empty());
}

#[test]
fn expand_never_contains_the_origin() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");
    let c = create_note(&conn, "c");

    repo.add_edge(a, b).unwrap();
    repo.add_edge(b, c).unwrap();
    repo.add_edge(c, a).unwrap();

    let expanded = repo.expand(a, DEFAULT_EXPANSION_DEPTH).unwrap();
    assert!(!expanded.contains(&a));
}

#[test]
fn chain_expansion_reaches_two_hops() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");
    let c = create_note(&conn, "c");
    let d = create_note(&conn, "d");

    repo.add_edge(a, b).unwrap();
    repo.add_edge(b, c).unwrap();
    repo.add_edge(c, d).unwrap();

    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(repo.expand(a, 2).unwrap(), expected);
}

#[test]
fn expansion_depth_is_honored() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");
    let c = create_note(&conn, "c");

    repo.add_edge(a, b).unwrap();
    repo.add_edge(b, c).unwrap();

    assert_eq!(repo.expand(a, 1).unwrap(), vec![b]);

    let mut two_hops = vec![b, c];
    two_hops.sort();
    assert_eq!(repo.expand(a, 2).unwrap(), two_hops);
    assert!(repo.expand(a, 0).unwrap().is_empty());
}

#[test]
fn multi_path_targets_appear_once() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");
    let c = create_note(&conn, "c");
    let d = create_note(&conn, "d");

    // Diamond: d is reachable through both b and c.
    repo.add_edge(a, b).unwrap();
    repo.add_edge(a, c).unwrap();
    repo.add_edge(b, d).unwrap();
    repo.add_edge(c, d).unwrap();

    let expanded = repo.expand(a, 2).unwrap();
    let mut expected = vec![b, c, d];
    expected.sort();
    assert_eq!(expanded, expected);
}

#[test]
fn remove_all_for_clears_every_touching_edge() {
    let conn = setup();
    let repo = SqliteLinkRepository::try_new(&conn).unwrap();
    let a = create_note(&conn, "a");
    let b = create_note(&conn, "b");
    let c = create_note(&conn, "c");

    repo.add_edge(a, b).unwrap();
    repo.add_edge(b, c).unwrap();
    repo.add_edge(a, c).unwrap();

    assert_eq!(repo.remove_all_for(b).unwrap(), 2);
    assert_eq!(edge_count(&conn), 1);
    assert_eq!(repo.neighbors(a).unwrap(), vec![c]);
}
