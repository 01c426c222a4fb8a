//! The field catalog: tracker schemas and identifier resolution.
//!
//! A tracker describes one kind of artifact. Every tracker carries the same
//! fixed metadata (artifact id, submission/update timestamps, submitter),
//! an optional set of semantic roles (title, description, status) pointing
//! at one of its own fields, and a list of custom fields. Resolution walks
//! those three layers in order. Schemas may change between requests, so
//! resolution always reads the catalog fresh; nothing is cached.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::ast::FieldRef;

pub type TrackerId = u32;
pub type FieldId = u32;

/// Metadata names valid on every tracker.
pub const METADATA_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "status",
    "submitted_on",
    "last_updated_on",
    "submitted_by",
];

/// One allowed value of a list-bound field, with its internal id and the
/// label users write in queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListBind {
    pub id: u32,
    pub label: String,
}

/// Storage shape of a custom field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Int,
    Float,
    Date,
    List { binds: Vec<ListBind> },
}

/// A custom field definition. Field ids are unique across the whole
/// catalog, not just within one tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// The tracker's semantic roles, each mapped to one of its field ids.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Semantics {
    pub title: Option<FieldId>,
    pub description: Option<FieldId>,
    pub status: Option<FieldId>,
}

/// Schema of a single tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerSchema {
    pub id: TrackerId,
    pub name: String,
    #[serde(default)]
    pub semantics: Semantics,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// Columns that live directly on the artifact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactColumn {
    Id,
    SubmittedBy,
    SubmittedOn,
    LastUpdatedOn,
}

impl ArtifactColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            ArtifactColumn::Id => "id",
            ArtifactColumn::SubmittedBy => "submitted_by",
            ArtifactColumn::SubmittedOn => "submitted_on",
            ArtifactColumn::LastUpdatedOn => "last_updated_on",
        }
    }

    /// Timestamp columns get the date comparison semantics, the rest are
    /// plain numeric.
    pub fn is_date(&self) -> bool {
        matches!(self, ArtifactColumn::SubmittedOn | ArtifactColumn::LastUpdatedOn)
    }
}

/// Value kinds stored in the per-kind value tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Int,
    Float,
    Date,
}

/// Outcome of resolving one identifier against one tracker. `Absent` is an
/// internal signal, not an error; the orchestrator decides what it means.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedField<'a> {
    /// A column on the artifact table itself; no join needed.
    Column(ArtifactColumn),
    /// A value-table field, reached through a LEFT JOIN keyed by field id.
    Value { field_id: FieldId, kind: ValueKind },
    /// A list-bound field; comparisons go against bind value ids.
    List { field_id: FieldId, binds: &'a [ListBind] },
    /// The tracker has no such field.
    Absent,
}

impl TrackerSchema {
    /// Resolves an identifier: metadata first, then semantic roles, then
    /// custom fields by exact name.
    pub fn resolve(&self, field: &FieldRef) -> ResolvedField<'_> {
        let name = field.as_str();

        if name.eq_ignore_ascii_case("id") {
            return ResolvedField::Column(ArtifactColumn::Id);
        }
        if name.eq_ignore_ascii_case("submitted_by") {
            return ResolvedField::Column(ArtifactColumn::SubmittedBy);
        }
        if name.eq_ignore_ascii_case("submitted_on") {
            return ResolvedField::Column(ArtifactColumn::SubmittedOn);
        }
        if name.eq_ignore_ascii_case("last_updated_on") {
            return ResolvedField::Column(ArtifactColumn::LastUpdatedOn);
        }

        if name.eq_ignore_ascii_case("title") {
            return self.resolve_semantic(self.semantics.title);
        }
        if name.eq_ignore_ascii_case("description") {
            return self.resolve_semantic(self.semantics.description);
        }
        if name.eq_ignore_ascii_case("status") {
            return self.resolve_semantic(self.semantics.status);
        }

        match self.fields.iter().find(|f| f.name == name) {
            Some(def) => Self::resolved_from_def(def),
            None => ResolvedField::Absent,
        }
    }

    fn resolve_semantic(&self, target: Option<FieldId>) -> ResolvedField<'_> {
        let Some(field_id) = target else {
            return ResolvedField::Absent; // semantic not configured
        };
        match self.fields.iter().find(|f| f.id == field_id) {
            Some(def) => Self::resolved_from_def(def),
            // A semantic pointing at a missing field means the schema is
            // inconsistent; treat the role as absent rather than failing.
            None => ResolvedField::Absent,
        }
    }

    fn resolved_from_def(def: &FieldDef) -> ResolvedField<'_> {
        match &def.kind {
            FieldKind::Text => ResolvedField::Value { field_id: def.id, kind: ValueKind::Text },
            FieldKind::Int => ResolvedField::Value { field_id: def.id, kind: ValueKind::Int },
            FieldKind::Float => ResolvedField::Value { field_id: def.id, kind: ValueKind::Float },
            FieldKind::Date => ResolvedField::Value { field_id: def.id, kind: ValueKind::Date },
            FieldKind::List { binds } => ResolvedField::List { field_id: def.id, binds },
        }
    }
}

/// The full field catalog: every tracker schema known to the system.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Catalog {
    pub trackers: Vec<TrackerSchema>,
}

impl Catalog {
    pub fn tracker(&self, id: TrackerId) -> Option<&TrackerSchema> {
        self.trackers.iter().find(|t| t.id == id)
    }

    /// All identifiers valid on at least one of the given trackers.
    /// Consumed by autocompletion editors; the compiler itself does not
    /// use this.
    pub fn field_names(&self, tracker_ids: &[TrackerId]) -> BTreeSet<String> {
        let mut names: BTreeSet<String> =
            METADATA_FIELDS.iter().map(|s| s.to_string()).collect();
        for tracker in self.trackers.iter().filter(|t| tracker_ids.contains(&t.id)) {
            for field in &tracker.fields {
                names.insert(field.name.clone());
            }
        }
        names
    }
}
