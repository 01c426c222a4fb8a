//! The cross-tracker compiler: walks one query AST once per selected
//! tracker and unions the per-tracker fragments.
//!
//! Trackers disagree on schemas, so the same comparison can resolve to a
//! text field on one tracker and a list field on another, or to nothing at
//! all. Each tracker therefore gets its own bottom-up walk through
//! resolver, builders and combinators; the resulting fragment is wrapped
//! in its own `artifact.tracker_id = ?` predicate so a fragment built
//! against one schema can never match another tracker's rows, and the
//! wrapped fragments are unioned with OR.

use tracing::debug;

use crate::ast::{Expr, FieldRef};
use crate::builders::{build_comparison, Escaper, LikeEscaper};
use crate::catalog::{Catalog, ResolvedField, TrackerId, TrackerSchema};
use crate::error::QueryError;
use crate::fragment::ParametrizedFromWhere;

/// What to do with a tracker that cannot resolve a referenced field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFieldPolicy {
    /// Compile the comparison to an unconditionally false predicate for
    /// that tracker (under NOT it becomes unconditionally true). A field
    /// absent from every selected tracker is still an error.
    #[default]
    Substitute,
    /// Drop the tracker from the query entirely. When every tracker is
    /// dropped the compilation fails with `NoApplicableTracker`.
    SkipTracker,
}

/// The final compiled artifact: one fragment valid for the given trackers,
/// plus the pagination window. Consumed once by the executor.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub fragment: ParametrizedFromWhere,
    pub tracker_ids: Vec<TrackerId>,
    pub limit: u64,
    pub offset: u64,
}

pub struct CrossTrackerCompiler<'a> {
    catalog: &'a Catalog,
    escaper: &'a dyn Escaper,
    policy: MissingFieldPolicy,
}

impl<'a> CrossTrackerCompiler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            escaper: &LikeEscaper,
            policy: MissingFieldPolicy::default(),
        }
    }

    /// Substitutes the LIKE escaper, e.g. with a no-op one in tests.
    pub fn with_escaper(mut self, escaper: &'a dyn Escaper) -> Self {
        self.escaper = escaper;
        self
    }

    pub fn with_policy(mut self, policy: MissingFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compiles the AST against every selected tracker. `ast` is `None`
    /// for the empty query, which matches every artifact of the selected
    /// trackers.
    pub fn compile(
        &self,
        ast: Option<&Expr>,
        tracker_ids: &[TrackerId],
        limit: u64,
        offset: u64,
    ) -> Result<CompiledQuery, QueryError> {
        // Tracker ids with no schema in the catalog cannot contribute rows
        let trackers: Vec<&TrackerSchema> = tracker_ids
            .iter()
            .filter_map(|id| self.catalog.tracker(*id))
            .collect();
        if trackers.is_empty() {
            return Err(QueryError::NoApplicableTracker);
        }

        if let Some(expr) = ast {
            let referenced = collect_field_refs(expr);
            for field in &referenced {
                let absent_everywhere = trackers
                    .iter()
                    .all(|t| t.resolve(field) == ResolvedField::Absent);
                if absent_everywhere {
                    return Err(QueryError::UnknownField(field.0.clone()));
                }
            }

            let mut union: Option<ParametrizedFromWhere> = None;
            let mut applicable = Vec::new();
            for tracker in &trackers {
                if self.policy == MissingFieldPolicy::SkipTracker {
                    let missing = referenced
                        .iter()
                        .find(|f| tracker.resolve(f) == ResolvedField::Absent);
                    if let Some(field) = missing {
                        debug!(
                            tracker = tracker.name.as_str(),
                            field = field.as_str(),
                            "skipping tracker: field not resolvable"
                        );
                        continue;
                    }
                }

                let fragment = tracker_predicate(tracker.id).and(self.walk(expr, tracker)?);
                applicable.push(tracker.id);
                union = Some(match union {
                    Some(existing) => existing.or(fragment),
                    None => fragment,
                });
            }

            let Some(fragment) = union else {
                return Err(QueryError::NoApplicableTracker);
            };
            debug!(
                trackers = applicable.len(),
                params = fragment.params().len(),
                "query compiled"
            );
            Ok(CompiledQuery { fragment, tracker_ids: applicable, limit, offset })
        } else {
            // Empty query: tracker membership is the whole predicate
            let mut fragment: Option<ParametrizedFromWhere> = None;
            let mut applicable = Vec::new();
            for tracker in &trackers {
                applicable.push(tracker.id);
                let predicate = tracker_predicate(tracker.id);
                fragment = Some(match fragment {
                    Some(existing) => existing.or(predicate),
                    None => predicate,
                });
            }
            Ok(CompiledQuery {
                fragment: fragment.expect("at least one tracker"),
                tracker_ids: applicable,
                limit,
                offset,
            })
        }
    }

    /// Bottom-up walk of the AST for a single tracker's schema.
    fn walk(
        &self,
        expr: &Expr,
        tracker: &TrackerSchema,
    ) -> Result<ParametrizedFromWhere, QueryError> {
        match expr {
            Expr::Comparison { field, condition } => {
                match tracker.resolve(field) {
                    // Records of this tracker never match a clause about a
                    // field they do not have; NOT above us flips this to
                    // always-true, which is the required semantics.
                    ResolvedField::Absent => Ok(ParametrizedFromWhere::always_false()),
                    resolved => build_comparison(field.as_str(), &resolved, condition, self.escaper),
                }
            }
            Expr::And(left, right) => {
                Ok(self.walk(left, tracker)?.and(self.walk(right, tracker)?))
            }
            Expr::Or(left, right) => {
                Ok(self.walk(left, tracker)?.or(self.walk(right, tracker)?))
            }
            Expr::Not(inner) => Ok(self.walk(inner, tracker)?.not()),
        }
    }
}

fn tracker_predicate(id: TrackerId) -> ParametrizedFromWhere {
    ParametrizedFromWhere::new("artifact.tracker_id = ?", vec![(id as i64).into()])
}

/// Field refs in AST order, deduplicated, for the absence checks.
fn collect_field_refs(expr: &Expr) -> Vec<FieldRef> {
    fn collect(expr: &Expr, out: &mut Vec<FieldRef>) {
        match expr {
            Expr::Comparison { field, .. } => {
                if !out.contains(field) {
                    out.push(field.clone());
                }
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                collect(left, out);
                collect(right, out);
            }
            Expr::Not(inner) => collect(inner, out),
        }
    }
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}
