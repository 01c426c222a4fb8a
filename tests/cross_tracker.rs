//! End-to-end tests: TQL text through parsing, cross-tracker compilation
//! and execution against an in-memory SQLite artifact store.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use tql::catalog::{Catalog, FieldDef, FieldKind, ListBind, Semantics, TrackerSchema};
use tql::compiler::CrossTrackerCompiler;
use tql::error::QueryError;
use tql::executor::{QueryExecutor, QueryResult};
use tql::parser::parse;

fn ts(s: &str) -> i64 {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap()
        .and_utc()
        .timestamp()
}

/// Two trackers sharing the `status` and `description` semantics but with
/// different underlying fields and bind values; only the bug tracker has
/// a `priority` field.
fn catalog() -> Catalog {
    Catalog {
        trackers: vec![
            TrackerSchema {
                id: 1,
                name: "bugs".to_string(),
                semantics: Semantics {
                    title: None,
                    description: Some(110),
                    status: Some(111),
                },
                fields: vec![
                    FieldDef { id: 110, name: "details".to_string(), kind: FieldKind::Text },
                    FieldDef {
                        id: 111,
                        name: "state".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 1, label: "open".to_string() },
                                ListBind { id: 2, label: "closed".to_string() },
                            ],
                        },
                    },
                    FieldDef {
                        id: 112,
                        name: "priority".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 3, label: "high".to_string() },
                                ListBind { id: 4, label: "urgent".to_string() },
                                ListBind { id: 5, label: "low".to_string() },
                            ],
                        },
                    },
                ],
            },
            TrackerSchema {
                id: 2,
                name: "tasks".to_string(),
                semantics: Semantics {
                    title: None,
                    description: Some(210),
                    status: Some(211),
                },
                fields: vec![
                    FieldDef { id: 210, name: "notes".to_string(), kind: FieldKind::Text },
                    FieldDef {
                        id: 211,
                        name: "state".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 6, label: "open".to_string() },
                                ListBind { id: 7, label: "done".to_string() },
                            ],
                        },
                    },
                ],
            },
        ],
    }
}

fn seeded_store() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE artifact (
             id INTEGER PRIMARY KEY,
             tracker_id INTEGER NOT NULL,
             submitted_by INTEGER NOT NULL,
             submitted_on INTEGER NOT NULL,
             last_updated_on INTEGER NOT NULL
         );
         CREATE TABLE artifact_value_text (
             artifact_id INTEGER NOT NULL,
             field_id INTEGER NOT NULL,
             value TEXT
         );
         CREATE TABLE artifact_value_int (
             artifact_id INTEGER NOT NULL,
             field_id INTEGER NOT NULL,
             value INTEGER
         );
         CREATE TABLE artifact_value_float (
             artifact_id INTEGER NOT NULL,
             field_id INTEGER NOT NULL,
             value REAL
         );
         CREATE TABLE artifact_value_date (
             artifact_id INTEGER NOT NULL,
             field_id INTEGER NOT NULL,
             value INTEGER
         );
         CREATE TABLE artifact_value_list (
             artifact_id INTEGER NOT NULL,
             field_id INTEGER NOT NULL,
             bind_value_id INTEGER NOT NULL
         );",
    )
    .unwrap();

    let artifact = |id: i64, tracker: i64, submitted_on: i64| {
        conn.execute(
            "INSERT INTO artifact (id, tracker_id, submitted_by, submitted_on, last_updated_on)
             VALUES (?1, ?2, 10, ?3, ?3)",
            [id, tracker, submitted_on],
        )
        .unwrap();
    };
    let text = |artifact_id: i64, field_id: i64, value: &str| {
        conn.execute(
            "INSERT INTO artifact_value_text (artifact_id, field_id, value) VALUES (?1, ?2, ?3)",
            rusqlite::params![artifact_id, field_id, value],
        )
        .unwrap();
    };
    let list = |artifact_id: i64, field_id: i64, bind_id: i64| {
        conn.execute(
            "INSERT INTO artifact_value_list (artifact_id, field_id, bind_value_id)
             VALUES (?1, ?2, ?3)",
            [artifact_id, field_id, bind_id],
        )
        .unwrap();
    };

    // Bug tracker: three open, two closed
    artifact(1, 1, ts("2020-01-01 23:59:59"));
    artifact(2, 1, ts("2020-01-02 00:00:01"));
    artifact(3, 1, ts("2019-12-01 10:00:00"));
    artifact(4, 1, ts("2019-12-01 10:00:00"));
    artifact(5, 1, ts("2019-12-01 10:00:00"));
    list(1, 111, 1);
    list(2, 111, 1);
    list(3, 111, 1);
    list(4, 111, 2);
    list(5, 111, 2);
    // Descriptions: three with text, one empty, one missing entirely
    text(1, 110, "Crash when saving");
    text(2, 110, "Wrong totals in report");
    text(3, 110, "Slow startup");
    text(4, 110, "");
    list(1, 112, 3); // high
    list(2, 112, 4); // urgent
    list(3, 112, 5); // low

    // Task tracker: one open, one done
    artifact(6, 2, ts("2020-03-01 09:00:00"));
    artifact(7, 2, ts("2020-03-01 09:00:00"));
    list(6, 211, 6);
    list(7, 211, 7);
    text(6, 210, "Printer on fire");

    conn
}

fn run(conn: &Connection, tql: &str, tracker_ids: &[u32]) -> QueryResult {
    run_paged(conn, tql, tracker_ids, 50, 0)
}

fn run_paged(
    conn: &Connection,
    tql: &str,
    tracker_ids: &[u32],
    limit: u64,
    offset: u64,
) -> QueryResult {
    let catalog = catalog();
    let ast = parse(tql).unwrap();
    let compiled = CrossTrackerCompiler::new(&catalog)
        .compile(ast.as_ref(), tracker_ids, limit, offset)
        .unwrap();
    QueryExecutor::new(conn).execute(&compiled).unwrap()
}

#[test]
fn test_status_equal_open_matches_the_three_open_bugs() {
    let conn = seeded_store();
    let result = run(&conn, "status = 'open'", &[1]);
    assert_eq!(result.matched_ids, vec![1, 2, 3]);
    assert_eq!(result.total_count, 3);
}

#[test]
fn test_description_not_empty_ignores_null_and_empty_values() {
    let conn = seeded_store();
    // Artifact 4 has an empty description, artifact 5 none at all
    let result = run(&conn, "description != ''", &[1]);
    assert_eq!(result.matched_ids, vec![1, 2, 3]);
}

#[test]
fn test_description_equal_empty_matches_null_and_empty_values() {
    let conn = seeded_store();
    let result = run(&conn, "description = ''", &[1]);
    assert_eq!(result.matched_ids, vec![4, 5]);
}

#[test]
fn test_date_lesser_or_equal_covers_the_whole_day() {
    let conn = seeded_store();
    let result = run(&conn, "submitted_on <= '2020-01-01'", &[1]);
    // 2020-01-01 23:59:59 matches, 2020-01-02 00:00:01 does not
    assert!(result.matched_ids.contains(&1));
    assert!(!result.matched_ids.contains(&2));
    assert_eq!(result.matched_ids, vec![1, 3, 4, 5]);
}

#[test]
fn test_date_equal_matches_only_that_day() {
    let conn = seeded_store();
    let result = run(&conn, "submitted_on = '2020-01-01'", &[1]);
    assert_eq!(result.matched_ids, vec![1]);
}

#[test]
fn test_priority_clause_only_contributes_from_trackers_that_have_it() {
    let conn = seeded_store();
    let result = run(
        &conn,
        "(priority = 'high' OR priority = 'urgent') AND status = 'open'",
        &[1, 2],
    );
    // The task tracker has no priority field, so only bugs match
    assert_eq!(result.matched_ids, vec![1, 2]);
}

#[test]
fn test_absent_field_never_matches_unless_negated() {
    let conn = seeded_store();

    let positive = run(&conn, "priority = 'high'", &[1, 2]);
    assert_eq!(positive.matched_ids, vec![1]);

    // Records without the field trivially satisfy the negation: all task
    // tracker artifacts, plus every bug that is not high priority
    let negated = run(&conn, "NOT priority = 'high'", &[1, 2]);
    assert_eq!(negated.matched_ids, vec![2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_status_resolves_per_tracker_schema() {
    let conn = seeded_store();
    // 'open' is bind 1 on bugs and bind 6 on tasks
    let result = run(&conn, "status = 'open'", &[1, 2]);
    assert_eq!(result.matched_ids, vec![1, 2, 3, 6]);
}

#[test]
fn test_de_morgan_equivalence_on_fixed_data() {
    let conn = seeded_store();
    let pairs = [
        ("status = 'open'", "priority = 'high'"),
        ("description != ''", "submitted_on <= '2020-01-01'"),
        ("status = 'closed'", "status = 'open'"),
    ];
    for (a, b) in pairs {
        let negated_conjunction =
            run(&conn, &format!("NOT ({a} AND {b})"), &[1, 2]).matched_ids;
        let disjoined_negations =
            run(&conn, &format!("(NOT {a}) OR (NOT {b})"), &[1, 2]).matched_ids;
        assert_eq!(
            negated_conjunction, disjoined_negations,
            "De Morgan mismatch for A={a:?} B={b:?}"
        );
    }
}

#[test]
fn test_double_negation_restores_the_match_set() {
    let conn = seeded_store();
    let plain = run(&conn, "status = 'open'", &[1, 2]).matched_ids;
    let doubled = run(&conn, "NOT NOT status = 'open'", &[1, 2]).matched_ids;
    assert_eq!(plain, doubled);
}

#[test]
fn test_pagination_bounds_ids_but_not_total() {
    let conn = seeded_store();
    let result = run_paged(&conn, "status = 'open'", &[1, 2], 2, 1);
    assert_eq!(result.matched_ids, vec![2, 3]);
    assert_eq!(result.total_count, 4);
}

#[test]
fn test_empty_query_matches_every_artifact_of_selected_trackers() {
    let conn = seeded_store();
    let result = run(&conn, "", &[1, 2]);
    assert_eq!(result.matched_ids, vec![1, 2, 3, 4, 5, 6, 7]);
    let only_tasks = run(&conn, "", &[2]);
    assert_eq!(only_tasks.matched_ids, vec![6, 7]);
}

#[test]
fn test_text_comparison_is_substring_match() {
    let conn = seeded_store();
    let result = run(&conn, "description = 'totals'", &[1]);
    assert_eq!(result.matched_ids, vec![2]);
}

#[test]
fn test_unknown_field_is_a_typed_error() {
    let catalog = catalog();
    let ast = parse("story_points > 3").unwrap();
    let err = CrossTrackerCompiler::new(&catalog)
        .compile(ast.as_ref(), &[1, 2], 50, 0)
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownField(name) if name == "story_points"));
}

#[test]
fn test_priority_in_list_matches_either_value() {
    let conn = seeded_store();
    let result = run(&conn, "priority IN('high', 'urgent')", &[1]);
    assert_eq!(result.matched_ids, vec![1, 2]);
}

#[test]
fn test_priority_equal_empty_matches_bugs_without_priority() {
    let conn = seeded_store();
    let result = run(&conn, "priority = ''", &[1]);
    assert_eq!(result.matched_ids, vec![4, 5]);
}

#[test]
fn test_like_wildcards_in_user_input_are_escaped() {
    let conn = seeded_store();
    // '%' must not act as a wildcard: nothing contains a literal percent
    let result = run(&conn, "description = '%'", &[1]);
    assert!(result.matched_ids.is_empty());
}
