//! Serde data model of the per-cycle root manifest.
//!
//! One manifest is written per cycle by the coordinating rank. It records
//! cycle, time, and domain count plus a relative path template and tags
//! for the mesh and every field, so a later run can rebuild the registry
//! from disk alone. Paths use a `%0Nd` per-rank placeholder and are
//! relative to the manifest's own location, keeping the tree relocatable.
//! Numeric tags are encoded as strings for backward compatibility with
//! older readers.

use crate::error::RestartError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level manifest document: `{ "dsets": { "main": { ... } } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootManifest {
    pub dsets: DatasetGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetGroup {
    pub main: MainDataset,
}

/// The one dataset a cycle describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainDataset {
    pub cycle: i64,
    pub time: f64,
    /// Total rank count of the writing run.
    pub domains: usize,
    pub mesh: MeshEntry,
    /// Omitted entirely when no fields are registered.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshEntry {
    /// Relative path template, e.g. `run_000003/mesh.%06d`.
    pub path: String,
    pub tags: MeshTags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshTags {
    pub spatial_dim: String,
    pub topo_dim: String,
    pub max_lods: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntry {
    /// Relative path template, e.g. `run_000003/pressure.%06d`.
    pub path: String,
    pub tags: FieldTags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTags {
    pub assoc: String,
    pub comps: String,
}

impl RootManifest {
    /// Render the document as pretty-printed JSON.
    pub fn to_json(&self, path: &str) -> Result<String, RestartError> {
        serde_json::to_string_pretty(self).map_err(|e| RestartError::ManifestParse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a manifest document; `path` is only used for diagnostics.
    pub fn from_json(path: &str, text: &str) -> Result<Self, RestartError> {
        serde_json::from_str(text).map_err(|e| RestartError::ManifestParse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

impl MainDataset {
    /// Recover the collection name from the mesh path template: the
    /// prefix up to the first `_`. A template without `_` is a malformed
    /// manifest. Collection names containing `_` therefore mis-parse;
    /// that fragility is part of the on-disk format.
    pub fn collection_name(&self) -> Option<&str> {
        self.mesh.path.split_once('_').map(|(name, _)| name)
    }
}

impl MeshTags {
    pub fn spatial_dim(&self) -> Result<i64, String> {
        int_tag(&self.spatial_dim, "spatial_dim")
    }

    pub fn topo_dim(&self) -> Result<i64, String> {
        int_tag(&self.topo_dim, "topo_dim")
    }

    pub fn max_lods(&self) -> Result<i64, String> {
        int_tag(&self.max_lods, "max_lods")
    }
}

impl FieldTags {
    pub fn comps(&self) -> Result<i64, String> {
        int_tag(&self.comps, "comps")
    }
}

fn int_tag(raw: &str, what: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("tag `{what}` is not an integer: `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RootManifest {
        let mut fields = BTreeMap::new();
        fields.insert(
            "pressure".to_string(),
            FieldEntry {
                path: "run_000003/pressure.%06d".into(),
                tags: FieldTags {
                    assoc: "nodes".into(),
                    comps: "1".into(),
                },
            },
        );
        RootManifest {
            dsets: DatasetGroup {
                main: MainDataset {
                    cycle: 3,
                    time: 1.5,
                    domains: 2,
                    mesh: MeshEntry {
                        path: "run_000003/mesh.%06d".into(),
                        tags: MeshTags {
                            spatial_dim: "3".into(),
                            topo_dim: "2".into(),
                            max_lods: "32".into(),
                        },
                    },
                    fields,
                },
            },
        }
    }

    #[test]
    fn document_round_trips_through_json() {
        let doc = sample();
        let json = doc.to_json("test.mesh_root").expect("serialize");
        let back = RootManifest::from_json("test.mesh_root", &json).expect("parse");
        assert_eq!(back.dsets.main.cycle, 3);
        assert_eq!(back.dsets.main.domains, 2);
        assert_eq!(back.dsets.main.fields["pressure"].tags.comps().unwrap(), 1);
        assert_eq!(back.dsets.main.mesh.tags.spatial_dim().unwrap(), 3);
    }

    #[test]
    fn empty_fields_map_is_omitted() {
        let mut doc = sample();
        doc.dsets.main.fields.clear();
        let json = doc.to_json("test.mesh_root").expect("serialize");
        assert!(!json.contains("\"fields\""));
        let back = RootManifest::from_json("test.mesh_root", &json).expect("parse");
        assert!(back.dsets.main.fields.is_empty());
    }

    #[test]
    fn collection_name_splits_at_first_underscore() {
        let doc = sample();
        assert_eq!(doc.dsets.main.collection_name(), Some("run"));

        let mut bad = sample();
        bad.dsets.main.mesh.path = "nounderscore/mesh.%06d".into();
        assert_eq!(bad.dsets.main.collection_name(), None);
    }

    #[test]
    fn non_integer_tags_are_rejected() {
        let mut doc = sample();
        doc.dsets.main.mesh.tags.topo_dim = "two".into();
        assert!(doc.dsets.main.mesh.tags.topo_dim().is_err());
    }

    #[test]
    fn malformed_json_reports_a_parse_error() {
        let err = RootManifest::from_json("x.mesh_root", "{ not json").unwrap_err();
        assert!(matches!(err, RestartError::ManifestParse { .. }));
    }
}
