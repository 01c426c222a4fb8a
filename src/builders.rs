//! Comparison builders: one rule per (field kind, operator) combination.
//!
//! [`build_comparison`] is the single dispatch entry. The match over
//! resolved field kind and condition shape is closed and exhaustive, so an
//! unsupported combination fails fast with a typed error instead of
//! producing SQL that the engine rejects at runtime.
//!
//! All predicates over value-table columns are written *total*: they carry
//! explicit `IS NULL` / `IS NOT NULL` arms and never evaluate to SQL NULL,
//! even for artifacts that have no value row behind the LEFT JOIN. That is
//! what makes the plain `NOT (...)` combinator correct.

use chrono::{NaiveDate, NaiveDateTime};
use sea_query::Value;

use crate::ast::{CompOp, Condition, Literal};
use crate::catalog::{ListBind, ResolvedField, ValueKind};
use crate::error::QueryError;
use crate::fragment::{JoinFragment, ParametrizedFromWhere, ValueTable};

/// Escapes user text for use inside a LIKE pattern. The escaped text is
/// still bound as a parameter; escaping only neutralizes the wildcard
/// characters, not quoting.
pub trait Escaper {
    fn escape_like(&self, value: &str) -> String;
}

/// Escapes `\`, `%` and `_` with a backslash, matching the `ESCAPE '\'`
/// clause emitted next to every LIKE predicate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LikeEscaper;

impl Escaper for LikeEscaper {
    fn escape_like(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(c, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }
}

/// Passes text through untouched. Test-only substitute.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEscaper;

impl Escaper for NoopEscaper {
    fn escape_like(&self, value: &str) -> String {
        value.to_string()
    }
}

/// Builds the SQL fragment for one comparison of the AST against one
/// resolved field. `field_name` is only used in error messages.
pub fn build_comparison(
    field_name: &str,
    resolved: &ResolvedField<'_>,
    condition: &Condition,
    escaper: &dyn Escaper,
) -> Result<ParametrizedFromWhere, QueryError> {
    match resolved {
        ResolvedField::Column(column) => {
            let col = format!("artifact.{}", column.column_name());
            if column.is_date() {
                // Artifact timestamps are NOT NULL by schema
                build_date(field_name, &col, None, false, condition)
            } else {
                build_numeric(field_name, &col, None, false, ValueKind::Int, condition)
            }
        }
        ResolvedField::Value { field_id, kind: ValueKind::Text } => {
            let join = JoinFragment::new(ValueTable::Text, *field_id);
            build_text(field_name, join, condition, escaper)
        }
        ResolvedField::Value { field_id, kind: kind @ (ValueKind::Int | ValueKind::Float) } => {
            let table = match kind {
                ValueKind::Int => ValueTable::Int,
                _ => ValueTable::Float,
            };
            let join = JoinFragment::new(table, *field_id);
            let col = join.value_ref();
            build_numeric(field_name, &col, Some(join), true, *kind, condition)
        }
        ResolvedField::Value { field_id, kind: ValueKind::Date } => {
            let join = JoinFragment::new(ValueTable::Date, *field_id);
            let col = join.value_ref();
            build_date(field_name, &col, Some(join), true, condition)
        }
        ResolvedField::List { field_id, binds } => {
            let join = JoinFragment::new(ValueTable::List, *field_id);
            build_list(field_name, join, binds, condition)
        }
        // The orchestrator substitutes before building; reaching this arm
        // means the caller skipped the absence policy.
        ResolvedField::Absent => Err(QueryError::UnknownField(field_name.to_string())),
    }
}

fn incompatible(field: &str, condition: &Condition) -> QueryError {
    QueryError::IncompatibleOperator {
        field: field.to_string(),
        operator: operator_name(condition),
    }
}

fn operator_name(condition: &Condition) -> String {
    match condition {
        Condition::Compare(op, _) => op.to_string(),
        Condition::Between(..) => "BETWEEN".to_string(),
        Condition::In(_) => "IN".to_string(),
    }
}

fn is_empty_string(literal: &Literal) -> bool {
    matches!(literal, Literal::String(s) if s.is_empty())
}

fn assemble(
    join: Option<JoinFragment>,
    where_sql: String,
    params: Vec<Value>,
) -> ParametrizedFromWhere {
    match join {
        Some(join) => ParametrizedFromWhere::with_join(join, where_sql, params),
        None => ParametrizedFromWhere::new(where_sql, params),
    }
}

// ---------------------------------------------------------------------------
// Text fields

fn build_text(
    field: &str,
    join: JoinFragment,
    condition: &Condition,
    escaper: &dyn Escaper,
) -> Result<ParametrizedFromWhere, QueryError> {
    let col = join.value_ref();
    match condition {
        // NULL and '' both count as "no value"
        Condition::Compare(CompOp::Eq, value) if is_empty_string(value) => {
            let sql = format!("({col} IS NULL OR {col} = '')");
            Ok(assemble(Some(join), sql, Vec::new()))
        }
        Condition::Compare(CompOp::NotEq, value) if is_empty_string(value) => {
            let sql = format!("({col} IS NOT NULL AND {col} <> '')");
            Ok(assemble(Some(join), sql, Vec::new()))
        }
        Condition::Compare(CompOp::Eq, Literal::String(s)) => {
            let sql = format!("({col} IS NOT NULL AND {col} LIKE ? ESCAPE '\\')");
            let pattern = format!("%{}%", escaper.escape_like(s));
            Ok(assemble(Some(join), sql, vec![pattern.into()]))
        }
        Condition::Compare(CompOp::NotEq, Literal::String(s)) => {
            let sql = format!("({col} IS NULL OR {col} NOT LIKE ? ESCAPE '\\')");
            let pattern = format!("%{}%", escaper.escape_like(s));
            Ok(assemble(Some(join), sql, vec![pattern.into()]))
        }
        Condition::Compare(CompOp::Eq | CompOp::NotEq, value) => Err(QueryError::InvalidLiteral {
            value: value.to_string(),
            expected: "string",
        }),
        _ => Err(incompatible(field, condition)),
    }
}

// ---------------------------------------------------------------------------
// Numeric fields (int/float value tables and plain artifact columns)

fn build_numeric(
    field: &str,
    col: &str,
    join: Option<JoinFragment>,
    nullable: bool,
    kind: ValueKind,
    condition: &Condition,
) -> Result<ParametrizedFromWhere, QueryError> {
    match condition {
        Condition::Compare(CompOp::Eq, value) if is_empty_string(value) && nullable => {
            Ok(assemble(join, format!("{col} IS NULL"), Vec::new()))
        }
        Condition::Compare(CompOp::NotEq, value) if is_empty_string(value) && nullable => {
            Ok(assemble(join, format!("{col} IS NOT NULL"), Vec::new()))
        }
        Condition::Compare(CompOp::NotEq, value) => {
            let bound = numeric_value(kind, value)?;
            let sql = if nullable {
                format!("({col} IS NULL OR {col} <> ?)")
            } else {
                format!("{col} <> ?")
            };
            Ok(assemble(join, sql, vec![bound]))
        }
        Condition::Compare(op, value) => {
            let bound = numeric_value(kind, value)?;
            let sql_op = numeric_op(*op);
            let sql = if nullable {
                format!("({col} IS NOT NULL AND {col} {sql_op} ?)")
            } else {
                format!("{col} {sql_op} ?")
            };
            Ok(assemble(join, sql, vec![bound]))
        }
        Condition::Between(low, high) => {
            let low = numeric_value(kind, low)?;
            let high = numeric_value(kind, high)?;
            let sql = if nullable {
                format!("({col} IS NOT NULL AND {col} >= ? AND {col} <= ?)")
            } else {
                format!("({col} >= ? AND {col} <= ?)")
            };
            Ok(assemble(join, sql, vec![low, high]))
        }
        Condition::In(values) => {
            if values.is_empty() {
                return Ok(ParametrizedFromWhere::always_false());
            }
            let bound: Vec<Value> = values
                .iter()
                .map(|v| numeric_value(kind, v))
                .collect::<Result<_, _>>()?;
            let placeholders = vec!["?"; bound.len()].join(", ");
            let sql = if nullable {
                format!("({col} IS NOT NULL AND {col} IN ({placeholders}))")
            } else {
                format!("{col} IN ({placeholders})")
            };
            Ok(assemble(join, sql, bound))
        }
    }
}

fn numeric_op(op: CompOp) -> &'static str {
    match op {
        CompOp::Eq => "=",
        CompOp::NotEq => "<>",
        CompOp::Gt => ">",
        CompOp::Lt => "<",
        CompOp::Gte => ">=",
        CompOp::Lte => "<=",
    }
}

fn numeric_value(kind: ValueKind, literal: &Literal) -> Result<Value, QueryError> {
    match (kind, literal) {
        (ValueKind::Int, Literal::Int(n)) => Ok((*n).into()),
        // Int fields reject fractional literals instead of truncating
        (ValueKind::Int, other) => Err(QueryError::InvalidLiteral {
            value: other.to_string(),
            expected: "integer",
        }),
        (ValueKind::Float, Literal::Int(n)) => Ok((*n as f64).into()),
        (ValueKind::Float, Literal::Float(x)) => Ok((*x).into()),
        (ValueKind::Float, other) => Err(QueryError::InvalidLiteral {
            value: other.to_string(),
            expected: "number",
        }),
        _ => unreachable!("numeric_value called with non-numeric kind"),
    }
}

// ---------------------------------------------------------------------------
// Date fields
//
// A date-only literal covers its whole day: the comparison operates on the
// half-open interval [floor, ceiling) of day boundaries. A literal with an
// explicit time compares exactly. Values are bound as epoch seconds.

#[derive(Debug, Clone, Copy)]
enum DateLiteral {
    Day { floor: i64, ceiling: i64 },
    Instant(i64),
}

fn parse_date_literal(literal: &Literal) -> Result<DateLiteral, QueryError> {
    let invalid = || QueryError::InvalidLiteral {
        value: literal.to_string(),
        expected: "date (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)",
    };
    let Literal::String(s) = literal else {
        return Err(invalid());
    };
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let floor = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        let ceiling = floor + chrono::Duration::days(1);
        return Ok(DateLiteral::Day {
            floor: floor.and_utc().timestamp(),
            ceiling: ceiling.and_utc().timestamp(),
        });
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateLiteral::Instant(datetime.and_utc().timestamp()));
    }
    Err(invalid())
}

fn build_date(
    field: &str,
    col: &str,
    join: Option<JoinFragment>,
    nullable: bool,
    condition: &Condition,
) -> Result<ParametrizedFromWhere, QueryError> {
    let guard = |pred: String, params: Vec<Value>| {
        let sql = if nullable {
            format!("({col} IS NOT NULL AND {pred})")
        } else {
            format!("({pred})")
        };
        (sql, params)
    };

    let (sql, params) = match condition {
        Condition::Compare(CompOp::Eq, value) if is_empty_string(value) && nullable => {
            (format!("{col} IS NULL"), Vec::new())
        }
        Condition::Compare(CompOp::NotEq, value) if is_empty_string(value) && nullable => {
            (format!("{col} IS NOT NULL"), Vec::new())
        }
        Condition::Compare(op, value) => {
            let date = parse_date_literal(value)?;
            match (op, date) {
                (CompOp::Eq, DateLiteral::Day { floor, ceiling }) => {
                    guard(format!("{col} >= ? AND {col} < ?"), vec![floor.into(), ceiling.into()])
                }
                (CompOp::Eq, DateLiteral::Instant(ts)) => {
                    guard(format!("{col} = ?"), vec![ts.into()])
                }
                (CompOp::NotEq, DateLiteral::Day { floor, ceiling }) => {
                    let sql = if nullable {
                        format!("({col} IS NULL OR {col} < ? OR {col} >= ?)")
                    } else {
                        format!("({col} < ? OR {col} >= ?)")
                    };
                    (sql, vec![floor.into(), ceiling.into()])
                }
                (CompOp::NotEq, DateLiteral::Instant(ts)) => {
                    let sql = if nullable {
                        format!("({col} IS NULL OR {col} <> ?)")
                    } else {
                        format!("{col} <> ?")
                    };
                    (sql, vec![ts.into()])
                }
                // A date-only bound rounds to the floor of the day for >=
                // and < ...
                (CompOp::Gte, DateLiteral::Day { floor, .. }) => {
                    guard(format!("{col} >= ?"), vec![floor.into()])
                }
                (CompOp::Lt, DateLiteral::Day { floor, .. }) => {
                    guard(format!("{col} < ?"), vec![floor.into()])
                }
                // ... and to the ceiling for <= and >, so `<= d` takes the
                // whole day d and `> d` starts right after it
                (CompOp::Lte, DateLiteral::Day { ceiling, .. }) => {
                    guard(format!("{col} < ?"), vec![ceiling.into()])
                }
                (CompOp::Gt, DateLiteral::Day { ceiling, .. }) => {
                    guard(format!("{col} >= ?"), vec![ceiling.into()])
                }
                (CompOp::Gte, DateLiteral::Instant(ts)) => {
                    guard(format!("{col} >= ?"), vec![ts.into()])
                }
                (CompOp::Gt, DateLiteral::Instant(ts)) => {
                    guard(format!("{col} > ?"), vec![ts.into()])
                }
                (CompOp::Lte, DateLiteral::Instant(ts)) => {
                    guard(format!("{col} <= ?"), vec![ts.into()])
                }
                (CompOp::Lt, DateLiteral::Instant(ts)) => {
                    guard(format!("{col} < ?"), vec![ts.into()])
                }
            }
        }
        Condition::Between(low, high) => {
            let lower = match parse_date_literal(low)? {
                DateLiteral::Day { floor, .. } => (">=", floor),
                DateLiteral::Instant(ts) => (">=", ts),
            };
            let upper = match parse_date_literal(high)? {
                DateLiteral::Day { ceiling, .. } => ("<", ceiling),
                DateLiteral::Instant(ts) => ("<=", ts),
            };
            guard(
                format!("{col} {} ? AND {col} {} ?", lower.0, upper.0),
                vec![lower.1.into(), upper.1.into()],
            )
        }
        Condition::In(_) => return Err(incompatible(field, condition)),
    };

    Ok(assemble(join, sql, params))
}

// ---------------------------------------------------------------------------
// List-bound fields

/// Looks up a label among the field's bind values. A non-string literal is
/// a kind mismatch and errors; a well-formed label the field simply does
/// not offer returns `None`, so the caller can degrade the same way the
/// orchestrator degrades absent fields — another tracker may well know
/// the label.
fn resolve_bind(binds: &[ListBind], literal: &Literal) -> Result<Option<i64>, QueryError> {
    let Literal::String(label) = literal else {
        return Err(QueryError::InvalidLiteral {
            value: literal.to_string(),
            expected: "list value",
        });
    };
    Ok(binds.iter().find(|b| b.label == *label).map(|b| b.id as i64))
}

fn build_list(
    field: &str,
    join: JoinFragment,
    binds: &[ListBind],
    condition: &Condition,
) -> Result<ParametrizedFromWhere, QueryError> {
    let col = join.value_ref();
    match condition {
        // '' on a list field means "no value selected"
        Condition::Compare(CompOp::Eq, value) if is_empty_string(value) => {
            Ok(assemble(Some(join), format!("{col} IS NULL"), Vec::new()))
        }
        Condition::Compare(CompOp::NotEq, value) if is_empty_string(value) => {
            Ok(assemble(Some(join), format!("{col} IS NOT NULL"), Vec::new()))
        }
        Condition::Compare(CompOp::Eq, value) => {
            match resolve_bind(binds, value)? {
                Some(bind_id) => {
                    let sql = format!("({col} IS NOT NULL AND {col} = ?)");
                    Ok(assemble(Some(join), sql, vec![bind_id.into()]))
                }
                // This field never holds that value on this tracker
                None => Ok(ParametrizedFromWhere::always_false()),
            }
        }
        Condition::Compare(CompOp::NotEq, value) => {
            match resolve_bind(binds, value)? {
                Some(bind_id) => {
                    let sql = format!("({col} IS NULL OR {col} <> ?)");
                    Ok(assemble(Some(join), sql, vec![bind_id.into()]))
                }
                // Trivially satisfied: no record carries the unknown value
                None => Ok(ParametrizedFromWhere::always_true()),
            }
        }
        Condition::In(values) => {
            if values.is_empty() {
                return Ok(ParametrizedFromWhere::always_false());
            }
            let mut bound = Vec::new();
            for value in values {
                if let Some(bind_id) = resolve_bind(binds, value)? {
                    bound.push(Value::from(bind_id));
                }
            }
            // Labels unknown to this tracker drop out of the list
            if bound.is_empty() {
                return Ok(ParametrizedFromWhere::always_false());
            }
            let placeholders = vec!["?"; bound.len()].join(", ");
            let sql = format!("({col} IS NOT NULL AND {col} IN ({placeholders}))");
            Ok(assemble(Some(join), sql, bound))
        }
        _ => Err(incompatible(field, condition)),
    }
}
