//! Interactive demo: type TQL, see the compiled SQL fragment and the
//! matching artifacts of a small seeded store.

use anyhow::Result;
use rusqlite::Connection;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use tql::catalog::Catalog;
use tql::compiler::CrossTrackerCompiler;
use tql::config;
use tql::executor::QueryExecutor;
use tql::parser::parse;

/// Loads the catalog from catalog.json, falling back to the built-in demo
/// catalog when the file is missing or broken.
fn load_catalog_with_fallback() -> Catalog {
    match config::load_catalog("catalog.json") {
        Ok(catalog) => {
            println!("Loaded catalog.json ({} trackers)", catalog.trackers.len());
            catalog
        }
        Err(e) => {
            println!("Using built-in demo catalog ({})", e);
            config::demo_catalog()
        }
    }
}

/// In-memory artifact store with a few rows in both demo trackers.
fn seeded_store() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
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
         );

         -- bugs tracker (id 1)
         INSERT INTO artifact VALUES (1, 1, 10, 1577911199, 1577911199);
         INSERT INTO artifact VALUES (2, 1, 11, 1580515200, 1580515200);
         INSERT INTO artifact VALUES (3, 1, 10, 1583020800, 1583020800);
         INSERT INTO artifact_value_text VALUES (1, 101, 'Crash on startup');
         INSERT INTO artifact_value_text VALUES (2, 101, 'Wrong totals in report');
         INSERT INTO artifact_value_text VALUES (3, 101, 'Login button unresponsive');
         INSERT INTO artifact_value_list VALUES (1, 103, 1);
         INSERT INTO artifact_value_list VALUES (2, 103, 1);
         INSERT INTO artifact_value_list VALUES (3, 103, 2);
         INSERT INTO artifact_value_list VALUES (1, 104, 3);
         INSERT INTO artifact_value_list VALUES (2, 104, 5);
         INSERT INTO artifact_value_float VALUES (1, 105, 3.5);

         -- support tracker (id 2)
         INSERT INTO artifact VALUES (4, 2, 12, 1585699200, 1585699200);
         INSERT INTO artifact VALUES (5, 2, 12, 1588291200, 1588291200);
         INSERT INTO artifact_value_text VALUES (4, 201, 'Cannot export CSV');
         INSERT INTO artifact_value_text VALUES (5, 201, 'Feature request: dark mode');
         INSERT INTO artifact_value_list VALUES (4, 202, 6);
         INSERT INTO artifact_value_list VALUES (5, 202, 8);
         INSERT INTO artifact_value_int VALUES (4, 203, 2);",
    )?;
    Ok(conn)
}

fn run_query(line: &str, catalog: &Catalog, conn: &Connection) {
    let ast = match parse(line) {
        Ok(ast) => ast,
        Err(e) => {
            match e.span {
                Some(span) => println!("syntax error at {}..{}: {}", span.start, span.end, e),
                None => println!("syntax error: {}", e),
            }
            return;
        }
    };

    let tracker_ids: Vec<_> = catalog.trackers.iter().map(|t| t.id).collect();
    let compiled = match CrossTrackerCompiler::new(catalog).compile(ast.as_ref(), &tracker_ids, 50, 0)
    {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("query error: {}", e);
            return;
        }
    };

    println!("WHERE {}", compiled.fragment.where_sql());
    println!(
        "joins: {}, bind values: {}",
        compiled.fragment.joins().len(),
        compiled.fragment.params().len()
    );

    match QueryExecutor::new(conn).execute(&compiled) {
        Ok(result) => {
            println!(
                "matched {} artifact(s) of {} total: {:?}",
                result.matched_ids.len(),
                result.total_count,
                result.matched_ids
            );
        }
        Err(e) => println!("query error: {}", e),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("--- TQL: cross-tracker query compiler ---");
    let catalog = load_catalog_with_fallback();
    let conn = seeded_store()?;

    println!("Trackers:");
    for tracker in &catalog.trackers {
        println!("  {} -> {} ({} fields)", tracker.id, tracker.name, tracker.fields.len());
    }
    println!("Type a query (e.g. status = 'open' AND priority IN('high', 'urgent')), or 'quit'.");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("tql> ") {
            Ok(line) => {
                let line = line.trim();
                if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                run_query(line, &catalog, &conn);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
