//! Composable parametrized SQL fragments.
//!
//! A [`ParametrizedFromWhere`] bundles the three things a compiled
//! comparison contributes to the final statement: the LEFT JOINs it needs,
//! a WHERE predicate with positional `?` placeholders, and the bind values
//! matching those placeholders left to right. Fragments are immutable;
//! combinators consume their inputs and produce new values, merging join
//! lists by alias so the same value-table join is never emitted twice.
//!
//! Invariant: the number of `?` placeholders in the WHERE string always
//! equals the number of bind values. Only internal identifiers (aliases,
//! table and column names, integer field ids) ever appear in the SQL text
//! itself; user input travels exclusively through the bind values.

use sea_query::Value;

use crate::catalog::FieldId;

/// The per-kind value tables an artifact's field values live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTable {
    Text,
    Int,
    Float,
    Date,
    List,
}

impl ValueTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            ValueTable::Text => "artifact_value_text",
            ValueTable::Int => "artifact_value_int",
            ValueTable::Float => "artifact_value_float",
            ValueTable::Date => "artifact_value_date",
            ValueTable::List => "artifact_value_list",
        }
    }

    /// Short prefix used to build the join alias for a field.
    fn alias_prefix(&self) -> &'static str {
        match self {
            ValueTable::Text => "tv",
            ValueTable::Int => "iv",
            ValueTable::Float => "fv",
            ValueTable::Date => "dv",
            ValueTable::List => "lv",
        }
    }

    /// The column of the value table a comparison reads.
    pub fn value_column(&self) -> &'static str {
        match self {
            ValueTable::List => "bind_value_id",
            _ => "value",
        }
    }
}

/// One LEFT JOIN from the artifact table to a value table, keyed by field
/// id. Two fragments referencing the same field produce identical aliases,
/// which is what makes alias-keyed deduplication collapse them.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinFragment {
    pub table: ValueTable,
    pub alias: String,
    pub field_id: FieldId,
}

impl JoinFragment {
    pub fn new(table: ValueTable, field_id: FieldId) -> Self {
        let alias = format!("{}_{}", table.alias_prefix(), field_id);
        Self { table, alias, field_id }
    }

    /// `alias.column` reference for use inside a WHERE predicate.
    pub fn value_ref(&self) -> String {
        format!("{}.{}", self.alias, self.table.value_column())
    }
}

/// An immutable SQL fragment: joins + WHERE predicate + ordered bind
/// values. See the module docs for the invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParametrizedFromWhere {
    joins: Vec<JoinFragment>,
    where_sql: String,
    params: Vec<Value>,
}

impl ParametrizedFromWhere {
    pub fn new(where_sql: impl Into<String>, params: Vec<Value>) -> Self {
        let fragment = Self {
            joins: Vec::new(),
            where_sql: where_sql.into(),
            params,
        };
        debug_assert_eq!(fragment.placeholder_count(), fragment.params.len());
        fragment
    }

    pub fn with_join(
        join: JoinFragment,
        where_sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        let fragment = Self {
            joins: vec![join],
            where_sql: where_sql.into(),
            params,
        };
        debug_assert_eq!(fragment.placeholder_count(), fragment.params.len());
        fragment
    }

    /// A predicate no row satisfies. Substituted for comparisons on fields
    /// a tracker does not have.
    pub fn always_false() -> Self {
        Self::new("1 = 0", Vec::new())
    }

    /// A predicate every row satisfies. Used for the empty query.
    pub fn always_true() -> Self {
        Self::new("1 = 1", Vec::new())
    }

    pub fn joins(&self) -> &[JoinFragment] {
        &self.joins
    }

    pub fn where_sql(&self) -> &str {
        &self.where_sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of positional placeholders in the WHERE text. The SQL text
    /// never contains a literal `?` outside a placeholder, since user
    /// values are always bound.
    pub fn placeholder_count(&self) -> usize {
        self.where_sql.matches('?').count()
    }

    /// Conjunction. Joins merge by alias, parameters concatenate in
    /// placeholder order.
    pub fn and(self, other: Self) -> Self {
        Self::combine(self, other, "AND")
    }

    /// Disjunction. Same join and parameter handling as [`Self::and`].
    pub fn or(self, other: Self) -> Self {
        Self::combine(self, other, "OR")
    }

    /// Negation. Joins and parameters pass through unchanged: every value
    /// join is a LEFT JOIN and every leaf predicate is total (never SQL
    /// NULL), so wrapping in NOT cannot lose rows that negation should
    /// include.
    pub fn not(self) -> Self {
        Self {
            joins: self.joins,
            where_sql: format!("NOT ({})", self.where_sql),
            params: self.params,
        }
    }

    fn combine(a: Self, b: Self, op: &str) -> Self {
        let mut joins = a.joins;
        for join in b.joins {
            if !joins.iter().any(|existing| existing.alias == join.alias) {
                joins.push(join);
            }
        }

        let mut params = a.params;
        params.extend(b.params);

        Self {
            joins,
            where_sql: format!("({}) {} ({})", a.where_sql, op, b.where_sql),
            params,
        }
    }
}
