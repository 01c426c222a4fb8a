//! # tql
//!
//! Compiles the Tracker Query Language — a small boolean query language
//! over artifact fields — into parametrized SQL executed against a
//! relational artifact store, selecting matching artifacts across several
//! heterogeneous tracker schemas at once.
//!
//! The pipeline is a straight line of immutable values:
//!
//! ```text
//! text ──parse──► AST ──per tracker──► fragments ──union──► CompiledQuery ──execute──► QueryResult
//! ```
//!
//! ```
//! use tql::{parse, CrossTrackerCompiler};
//!
//! let catalog = tql::config::demo_catalog();
//! let ast = parse("status = 'open' AND submitted_on >= '2024-01-01'").unwrap();
//! let compiled = CrossTrackerCompiler::new(&catalog)
//!     .compile(ast.as_ref(), &[1, 2], 50, 0)
//!     .unwrap();
//! assert_eq!(compiled.tracker_ids, vec![1, 2]);
//! ```

pub mod ast;
pub mod builders;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Expr;
pub use compiler::{CompiledQuery, CrossTrackerCompiler, MissingFieldPolicy};
pub use error::QueryError;
pub use executor::{QueryExecutor, QueryResult};
pub use fragment::ParametrizedFromWhere;
pub use parser::{parse, SyntaxError};
