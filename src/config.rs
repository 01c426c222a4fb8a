//! Loading the field catalog from a JSON configuration file.

use std::fs;
use std::path::Path;

use crate::catalog::{Catalog, FieldDef, FieldKind, ListBind, Semantics, TrackerSchema};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("catalog file not found: {0}")]
    NotFound(String),
    #[error("cannot read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse catalog file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads a catalog from a JSON file. The file holds the same structure
/// the [`Catalog`] type deserializes: a list of trackers with semantics
/// and fields.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog, ConfigError> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        return Err(ConfigError::NotFound(path_ref.display().to_string()));
    }

    let content = fs::read_to_string(path_ref).map_err(|e| ConfigError::Io {
        path: path_ref.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path_ref.display().to_string(),
        source: e,
    })
}

/// A small built-in catalog used as a fallback by the demo binary and by
/// the benchmarks: a bug tracker and a support tracker that share the
/// `status` semantic but disagree on everything else.
pub fn demo_catalog() -> Catalog {
    Catalog {
        trackers: vec![
            TrackerSchema {
                id: 1,
                name: "bugs".to_string(),
                semantics: Semantics {
                    title: Some(101),
                    description: Some(102),
                    status: Some(103),
                },
                fields: vec![
                    FieldDef { id: 101, name: "summary".to_string(), kind: FieldKind::Text },
                    FieldDef { id: 102, name: "details".to_string(), kind: FieldKind::Text },
                    FieldDef {
                        id: 103,
                        name: "state".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 1, label: "open".to_string() },
                                ListBind { id: 2, label: "closed".to_string() },
                            ],
                        },
                    },
                    FieldDef {
                        id: 104,
                        name: "priority".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 3, label: "high".to_string() },
                                ListBind { id: 4, label: "urgent".to_string() },
                                ListBind { id: 5, label: "low".to_string() },
                            ],
                        },
                    },
                    FieldDef { id: 105, name: "effort".to_string(), kind: FieldKind::Float },
                    FieldDef { id: 106, name: "due".to_string(), kind: FieldKind::Date },
                ],
            },
            TrackerSchema {
                id: 2,
                name: "support".to_string(),
                semantics: Semantics {
                    title: Some(201),
                    description: None,
                    status: Some(202),
                },
                fields: vec![
                    FieldDef { id: 201, name: "subject".to_string(), kind: FieldKind::Text },
                    FieldDef {
                        id: 202,
                        name: "state".to_string(),
                        kind: FieldKind::List {
                            binds: vec![
                                ListBind { id: 6, label: "open".to_string() },
                                ListBind { id: 7, label: "answered".to_string() },
                                ListBind { id: 8, label: "closed".to_string() },
                            ],
                        },
                    },
                    FieldDef { id: 203, name: "tickets".to_string(), kind: FieldKind::Int },
                ],
            },
        ],
    }
}
