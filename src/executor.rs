//! Executes a [`CompiledQuery`] against the artifact store.
//!
//! The final SELECT is assembled with sea-query: the fragment's WHERE text
//! and bind values are injected as one custom expression, the fragment's
//! join list becomes structured LEFT JOINs, and the whole statement is
//! built into `(sql, values)` with positional placeholders. User values
//! are bound through the driver, never interpolated; the only literals in
//! the SQL text are internal table, column and alias names. Internal
//! integer ids (tracker ids, field ids) travel as parameters too, which
//! keeps the binding path uniform.

use rusqlite::{params_from_iter, Connection};
use sea_query::{
    Alias, Expr, Func, Iden, JoinType, Order, Query, SelectStatement, SqliteQueryBuilder, Value,
    Values,
};
use tracing::{debug, error};

use crate::compiler::CompiledQuery;
use crate::error::QueryError;

/// The artifact table every query selects from.
enum Artifact {
    Table,
    Id,
}

impl Iden for Artifact {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Artifact::Table => "artifact",
            Artifact::Id => "id",
        };
        write!(s, "{}", name).unwrap();
    }
}

/// Result of one executed query: the bounded id page and the unbounded
/// total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub matched_ids: Vec<i64>,
    pub total_count: u64,
}

pub struct QueryExecutor<'a> {
    conn: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Runs the compiled query with its LIMIT/OFFSET window and computes
    /// the total match count with a second statement over the same
    /// fragment.
    pub fn execute(&self, query: &CompiledQuery) -> Result<QueryResult, QueryError> {
        let (sql, values) = page_select(query).build(SqliteQueryBuilder);
        debug!(sql = sql.as_str(), params = values.0.len(), "executing match query");
        let matched_ids = self.fetch_ids(&sql, &values)?;

        let (count_sql, count_values) = count_select(query).build(SqliteQueryBuilder);
        let total_count = self.fetch_count(&count_sql, &count_values)?;

        Ok(QueryResult { matched_ids, total_count })
    }

    fn fetch_ids(&self, sql: &str, values: &Values) -> Result<Vec<i64>, QueryError> {
        let mut statement = self.conn.prepare(sql).map_err(map_engine_error)?;
        let rows = statement
            .query_map(params_from_iter(values.0.iter().map(bind_value)), |row| row.get(0))
            .map_err(map_engine_error)?;
        rows.collect::<Result<Vec<i64>, _>>().map_err(map_engine_error)
    }

    fn fetch_count(&self, sql: &str, values: &Values) -> Result<u64, QueryError> {
        let count: i64 = self
            .conn
            .query_row(sql, params_from_iter(values.0.iter().map(bind_value)), |row| row.get(0))
            .map_err(map_engine_error)?;
        Ok(count.max(0) as u64)
    }
}

/// SELECT DISTINCT artifact.id ... ORDER BY artifact.id LIMIT ? OFFSET ?
fn page_select(query: &CompiledQuery) -> SelectStatement {
    let mut select = base_select(query);
    select
        .expr(Expr::col((Artifact::Table, Artifact::Id)))
        .distinct()
        .order_by((Artifact::Table, Artifact::Id), Order::Asc)
        .limit(query.limit)
        .offset(query.offset);
    select
}

/// SELECT COUNT(DISTINCT artifact.id) ... over the same fragment.
fn count_select(query: &CompiledQuery) -> SelectStatement {
    let mut select = base_select(query);
    select.expr(Func::count_distinct(Expr::col((Artifact::Table, Artifact::Id))));
    select
}

fn base_select(query: &CompiledQuery) -> SelectStatement {
    let mut select = Query::select();
    select.from(Artifact::Table);

    for join in query.fragment.joins() {
        let alias = Alias::new(&join.alias);
        // Value joins are LEFT JOINs: artifacts without a value row must
        // survive into the predicate (as NULL) for negation to see them
        let on = Expr::col((alias.clone(), Alias::new("artifact_id")))
            .equals((Artifact::Table, Artifact::Id))
            .and(Expr::col((alias.clone(), Alias::new("field_id"))).eq(join.field_id as i64));
        select.join_as(
            JoinType::LeftJoin,
            Alias::new(join.table.table_name()),
            alias,
            on,
        );
    }

    select.and_where(Expr::cust_with_values(
        query.fragment.where_sql(),
        query.fragment.params().to_vec(),
    ));
    select
}

/// Converts a sea-query bind value into the driver's value type. Only the
/// variants the builders emit are mapped.
fn bind_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match value {
        Value::Bool(Some(b)) => SqlValue::Integer(*b as i64),
        Value::TinyInt(Some(n)) => SqlValue::Integer(*n as i64),
        Value::SmallInt(Some(n)) => SqlValue::Integer(*n as i64),
        Value::Int(Some(n)) => SqlValue::Integer(*n as i64),
        Value::BigInt(Some(n)) => SqlValue::Integer(*n),
        Value::TinyUnsigned(Some(n)) => SqlValue::Integer(*n as i64),
        Value::SmallUnsigned(Some(n)) => SqlValue::Integer(*n as i64),
        Value::Unsigned(Some(n)) => SqlValue::Integer(*n as i64),
        Value::BigUnsigned(Some(n)) => SqlValue::Integer(*n as i64),
        Value::Float(Some(x)) => SqlValue::Real(*x as f64),
        Value::Double(Some(x)) => SqlValue::Real(*x),
        Value::String(Some(s)) => SqlValue::Text(s.as_ref().clone()),
        Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
        Value::Bytes(Some(b)) => SqlValue::Blob(b.as_ref().clone()),
        _ => SqlValue::Null,
    }
}

/// Timeouts surface as such; everything else is logged in full and
/// surfaced as a generic execution failure so engine internals never
/// reach the caller.
fn map_engine_error(err: rusqlite::Error) -> QueryError {
    use rusqlite::ErrorCode;
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if matches!(
            failure.code,
            ErrorCode::DatabaseBusy | ErrorCode::OperationInterrupted
        ) {
            error!(error = %err, "query execution timed out");
            return QueryError::ExecutionTimeout;
        }
    }
    error!(error = %err, "query execution failed");
    QueryError::Execution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldDef, FieldKind, ListBind, Semantics, TrackerSchema};
    use crate::compiler::CrossTrackerCompiler;
    use crate::parser::parse;

    fn open_store() -> Connection {
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
        conn
    }

    fn catalog() -> Catalog {
        Catalog {
            trackers: vec![TrackerSchema {
                id: 1,
                name: "bugs".to_string(),
                semantics: Semantics { title: None, description: None, status: Some(11) },
                fields: vec![FieldDef {
                    id: 11,
                    name: "state".to_string(),
                    kind: FieldKind::List {
                        binds: vec![
                            ListBind { id: 1, label: "open".to_string() },
                            ListBind { id: 2, label: "closed".to_string() },
                        ],
                    },
                }],
            }],
        }
    }

    fn seed(conn: &Connection, artifact_id: i64, bind_id: i64) {
        conn.execute(
            "INSERT INTO artifact (id, tracker_id, submitted_by, submitted_on, last_updated_on)
             VALUES (?1, 1, 1, 0, 0)",
            [artifact_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO artifact_value_list (artifact_id, field_id, bind_value_id)
             VALUES (?1, 11, ?2)",
            [artifact_id, bind_id],
        )
        .unwrap();
    }

    fn run(conn: &Connection, tql: &str, limit: u64, offset: u64) -> QueryResult {
        let catalog = catalog();
        let ast = parse(tql).unwrap();
        let compiled = CrossTrackerCompiler::new(&catalog)
            .compile(ast.as_ref(), &[1], limit, offset)
            .unwrap();
        QueryExecutor::new(conn).execute(&compiled).unwrap()
    }

    #[test]
    fn test_generated_sql_uses_left_joins_and_placeholders() {
        let catalog = catalog();
        let ast = parse("status = 'open'").unwrap();
        let compiled = CrossTrackerCompiler::new(&catalog)
            .compile(ast.as_ref(), &[1], 10, 0)
            .unwrap();
        let (sql, values) = page_select(&compiled).build(SqliteQueryBuilder);
        assert!(sql.contains("LEFT JOIN \"artifact_value_list\" AS \"lv_11\""));
        assert!(sql.contains("SELECT DISTINCT"));
        assert!(sql.contains("\"field_id\" = ?"));
        // field id (join), tracker id, bind id, limit and offset all
        // travel as parameters
        assert_eq!(values.0.len(), 5);
        assert_eq!(sql.matches('?').count(), values.0.len());
    }

    #[test]
    fn test_execute_returns_ids_and_total() {
        let conn = open_store();
        seed(&conn, 1, 1);
        seed(&conn, 2, 2);
        seed(&conn, 3, 1);

        let result = run(&conn, "status = 'open'", 50, 0);
        assert_eq!(result.matched_ids, vec![1, 3]);
        assert_eq!(result.total_count, 2);
    }

    #[test]
    fn test_limit_and_offset_bound_the_page_not_the_count() {
        let conn = open_store();
        for id in 1..=5 {
            seed(&conn, id, 1);
        }

        let result = run(&conn, "status = 'open'", 2, 1);
        assert_eq!(result.matched_ids, vec![2, 3]);
        assert_eq!(result.total_count, 5);
    }

    #[test]
    fn test_multivalued_list_field_does_not_duplicate_ids() {
        let conn = open_store();
        seed(&conn, 1, 1);
        // second selected value on the same field
        conn.execute(
            "INSERT INTO artifact_value_list (artifact_id, field_id, bind_value_id)
             VALUES (1, 11, 2)",
            [],
        )
        .unwrap();

        let result = run(&conn, "status != ''", 50, 0);
        assert_eq!(result.matched_ids, vec![1]);
        assert_eq!(result.total_count, 1);
    }

    #[test]
    fn test_empty_query_matches_all_artifacts_of_the_tracker() {
        let conn = open_store();
        seed(&conn, 1, 1);
        seed(&conn, 2, 2);

        let result = run(&conn, "", 50, 0);
        assert_eq!(result.matched_ids, vec![1, 2]);
        assert_eq!(result.total_count, 2);
    }
}
