//! Runs generated SQL against an in-memory SQLite database and checks that
//! pages served from seek-accelerated cache entries hold the same rows as
//! plain `LIMIT`/`OFFSET` pages.

use objstore_sql::metadata::{AttributeType, ClassDescriptor, FieldDescriptor, Model};
use objstore_sql::platform::Platform;
use objstore_sql::query::{Query, QueryClass, QueryEvaluable, QueryField, SimpleConstraint, SimpleOp};
use objstore_sql::sql::SqlGenerator;
use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};

const ROWS: i64 = 60;
const PAGE: usize = 10;

fn model() -> Model {
    Model::new(
        "staff",
        vec![ClassDescriptor::new(
            "Employee",
            vec![],
            vec![
                FieldDescriptor::attribute("name", AttributeType::String),
                FieldDescriptor::attribute("age", AttributeType::Integer),
            ],
        )],
    )
    .unwrap()
}

fn database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE Employee (OBJECT TEXT, id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
        .unwrap();
    for id in 1..=ROWS {
        let name = format!("emp{:03}", (id * 37) % 101);
        conn.execute(
            "INSERT INTO Employee (OBJECT, id, name, age) VALUES (?1, ?2, ?3, ?4)",
            params![format!("<Employee {id}>"), id, name, 20 + (id * 7) % 40],
        )
        .unwrap();
    }
    conn
}

/// The OBJECT column and the given seek column of every row.
fn rows(conn: &Connection, sql: &str, seek_column: &str) -> Vec<(String, rusqlite::types::Value)> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |row| Ok((row.get("a1_")?, row.get(seek_column)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn objects(conn: &Connection, sql: &str) -> Vec<String> {
    rows(conn, sql, "a1_").into_iter().map(|(object, _)| object).collect()
}

fn employees(model: &Model) -> (Query, QueryClass) {
    let qc = QueryClass::new(model, "Employee").unwrap();
    let mut q = Query::new();
    q.add_from(&qc).add_to_select(&qc).set_constraint(SimpleConstraint::new(
        QueryField::new(&qc, "age", model).unwrap(),
        SimpleOp::GreaterThanEquals,
        QueryEvaluable::value(25),
    ));
    (q, qc)
}

/// Registers seek entries at `offsets`, each keyed on the seek column value
/// of the preceding row, then compares every page with the plain query.
fn assert_pages_match(model: &Model, q: &Query, seek_column: &str, offsets: &[usize]) {
    let conn = database();
    let generator = SqlGenerator::new(model, Platform::SQLite).with_offset_tolerance(0);
    let reference = q.clone();
    let total = objects(&conn, &generator.generate(&reference, 0, Some(1000)).unwrap()).len();
    assert!(total > 30);

    for &start in offsets {
        let sql = generator.generate(&reference, start - 1, Some(1)).unwrap();
        let (_, seek) = rows(&conn, &sql, seek_column).remove(0);
        match seek {
            rusqlite::types::Value::Integer(v) => generator.register_offset(q, start, v),
            rusqlite::types::Value::Text(v) => generator.register_offset(q, start, v),
            other => panic!("unexpected seek value {other:?}"),
        }
    }
    let mut expected_offsets = vec![0];
    expected_offsets.extend_from_slice(offsets);
    generator.generate(q, 0, Some(1)).unwrap();
    assert_eq!(q.cached_offsets(), expected_offsets);

    for start in (0..total).step_by(3) {
        let accelerated = generator.generate(q, start, Some(PAGE)).unwrap();
        let plain = generator.generate(&reference, start, Some(PAGE)).unwrap();
        assert_eq!(objects(&conn, &accelerated), objects(&conn, &plain), "page at {start}");
    }
}

#[test]
fn test_seek_on_id_matches_offset_pagination() {
    let model = model();
    let (q, _) = employees(&model);
    assert_pages_match(&model, &q, "a1_id", &[12, 25]);
}

#[test]
fn test_seek_on_order_by_field_matches_offset_pagination() {
    let model = model();
    let (mut q, qc) = employees(&model);
    q.add_to_order_by(QueryField::new(&qc, "name", &model).unwrap());
    assert_pages_match(&model, &q, "orderbyfield0", &[10, 21]);
}

#[test]
fn test_cached_sql_runs_unchanged() {
    let model = model();
    let (q, _) = employees(&model);
    let conn = database();
    let generator = SqlGenerator::new(&model, Platform::SQLite);
    let first = objects(&conn, &generator.generate(&q, 0, Some(PAGE)).unwrap());
    let again = objects(&conn, &generator.generate(&q, 0, Some(PAGE)).unwrap());
    assert_eq!(first.len(), PAGE);
    assert_eq!(first, again);
}
