//! Manifest-backed collection: self-describing checkpoints and restart.
//!
//! `IndexedCollection` wraps the base [`Collection`] and adds the per-cycle
//! root manifest that makes a checkpoint tree loadable without any prior
//! field registration. Unlike the base layer it always suffixes rank and
//! cycle, even in single-process runs, so the same tree can be read back
//! regardless of how the writing run was launched.

use crate::collection::{Collection, Ownership, Slot};
use crate::comm::Communicator;
use crate::error::{ErrorState, RestartError};
use crate::handles::{FieldHandle, MeshHandle};
use crate::manifest::{
    DatasetGroup, FieldEntry, FieldTags, MainDataset, MeshEntry, MeshTags, RootManifest,
};
use crate::naming;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::sync::Arc;

/// Default visualization detail-level hint recorded in the manifest.
pub const DEFAULT_MAX_DETAIL_LEVEL: i64 = 32;
/// Default association tag for registered fields.
pub const DEFAULT_ASSOCIATION: &str = "nodes";

/// Per-field manifest tags, kept in lockstep with the base registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Where on the mesh the field lives, e.g. `"nodes"`.
    pub association: String,
    /// Vector components per mesh point.
    pub components: i64,
}

/// A [`Collection`] whose cycles are indexed by a root manifest.
pub struct IndexedCollection<M, F> {
    base: Collection<M, F>,
    spatial_dim: i64,
    topo_dim: i64,
    max_detail_level: i64,
    field_info: BTreeMap<String, FieldInfo>,
}

impl<M: MeshHandle, F: FieldHandle<Mesh = M>> IndexedCollection<M, F> {
    /// Create an empty indexed collection. Rank suffixes and a cycle
    /// suffix are always used, so the cycle starts at 0 rather than -1.
    pub fn new(name: impl Into<String>, comm: Arc<dyn Communicator>) -> Self {
        let mut base = Collection::new(name, comm);
        base.serial = false;
        base.cycle = 0;
        Self {
            base,
            spatial_dim: 0,
            topo_dim: 0,
            max_detail_level: DEFAULT_MAX_DETAIL_LEVEL,
            field_info: BTreeMap::new(),
        }
    }

    /// Create an indexed collection with a caller-owned mesh attached.
    pub fn with_mesh(name: impl Into<String>, mesh: Arc<M>, comm: Arc<dyn Communicator>) -> Self {
        let mut collection = Self::new(name, comm);
        collection.set_mesh(mesh);
        collection
    }

    /// Attach a caller-owned mesh and cache its dimensional tags.
    pub fn set_mesh(&mut self, mesh: Arc<M>) {
        self.spatial_dim = mesh.spatial_dimension();
        self.topo_dim = mesh.topological_dimension();
        self.base.set_mesh(mesh);
        self.base.serial = false;
    }

    /// Register a caller-owned field and its manifest tags. Every field
    /// that will appear in a manifest must go through here so the tag
    /// registry stays synchronized with the base registry.
    pub fn register_field(&mut self, name: impl Into<String>, field: Arc<F>) {
        let name = name.into();
        self.field_info.insert(
            name.clone(),
            FieldInfo {
                association: DEFAULT_ASSOCIATION.to_string(),
                components: field.component_count(),
            },
        );
        self.base.register_field(name, field);
    }

    /// Manifest tags of a registered field.
    pub fn field_info(&self, name: &str) -> Option<&FieldInfo> {
        self.field_info.get(name)
    }

    /// Embedding dimension recorded for the manifest.
    pub fn spatial_dimension(&self) -> i64 {
        self.spatial_dim
    }

    /// Intrinsic mesh dimension recorded for the manifest.
    pub fn topological_dimension(&self) -> i64 {
        self.topo_dim
    }

    /// Set the visualization detail-level hint (correctness-neutral).
    pub fn set_max_detail_level(&mut self, levels: i64) {
        self.max_detail_level = levels;
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn cycle(&self) -> i64 {
        self.base.cycle()
    }

    /// Set the active checkpoint index. Indexed collections always
    /// suffix the cycle, so `cycle` must be non-negative.
    pub fn set_cycle(&mut self, cycle: i64) {
        debug_assert!(cycle >= 0, "indexed collections require a non-negative cycle");
        self.base.set_cycle(cycle);
    }

    pub fn time(&self) -> f64 {
        self.base.time()
    }

    pub fn set_time(&mut self, time: f64) {
        self.base.set_time(time);
    }

    pub fn set_precision(&mut self, precision: usize) {
        self.base.set_precision(precision);
    }

    pub fn set_pad_digits(&mut self, pad_digits: usize) {
        self.base.set_pad_digits(pad_digits);
    }

    pub fn set_prefix_path(&mut self, prefix: &str) {
        self.base.set_prefix_path(prefix);
    }

    pub fn rank(&self) -> usize {
        self.base.rank()
    }

    pub fn rank_count(&self) -> usize {
        self.base.rank_count()
    }

    pub fn ownership(&self) -> Ownership {
        self.base.ownership()
    }

    pub fn error_state(&self) -> ErrorState {
        self.base.error_state()
    }

    pub fn mesh(&self) -> Option<&M> {
        self.base.mesh()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.base.has_field(name)
    }

    pub fn field(&self, name: &str) -> Option<&F> {
        self.base.field(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.base.field_names()
    }

    pub fn save_field(&mut self, name: &str) -> Result<(), RestartError> {
        self.base.save_field(name)
    }

    pub fn delete_data(&mut self) {
        self.base.delete_data();
    }

    /// Release everything including field names and manifest tags.
    pub fn delete_all(&mut self) {
        self.field_info.clear();
        self.base.delete_all();
    }

    /// Save the data files for the current cycle, then write the root
    /// manifest on the coordinating rank. A directory-creation failure or
    /// a missing mesh skips the manifest, so no index is published for a
    /// cycle with no mesh files; independent per-entity write failures do
    /// not.
    pub fn save(&mut self) -> Result<(), RestartError> {
        let saved = self.base.save();
        if matches!(
            saved,
            Err(RestartError::CreateDirectory { .. }) | Err(RestartError::MissingMesh { .. })
        ) {
            return saved;
        }
        let root = self.save_root_file();
        saved.and(root)
    }

    /// Write the root manifest for the current cycle. Only rank 0 writes;
    /// every other rank returns immediately.
    pub fn save_root_file(&mut self) -> Result<(), RestartError> {
        if self.base.rank != 0 {
            return Ok(());
        }
        let path = naming::manifest_file(
            &self.base.prefix_path,
            &self.base.name,
            self.base.cycle,
            self.base.pad_digits,
        );
        let result = self
            .build_manifest()
            .to_json(&path)
            .and_then(|json| {
                fs::write(&path, json).map_err(|source| RestartError::ManifestWrite {
                    path: path.clone(),
                    source,
                })
            });
        if let Err(err) = result {
            self.base.record_failure(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Restore the collection from the manifest of `cycle`.
    ///
    /// Stage-ordered and fail-fast: manifest, then mesh, then fields.
    /// Any failure rolls back everything acquired so far, leaving the
    /// collection empty and borrowed with the sticky read error set.
    /// On success the collection owns the loaded mesh and fields.
    pub fn load(&mut self, cycle: i64) -> Result<(), RestartError> {
        self.delete_all();
        self.base.cycle = cycle;
        match self.load_stages() {
            Ok(()) => {
                self.base.ownership = Ownership::Owned;
                Ok(())
            }
            Err(err) => {
                self.base.record_failure(&err);
                self.field_info.clear();
                self.base.purge();
                Err(err)
            }
        }
    }

    fn load_stages(&mut self) -> Result<(), RestartError> {
        self.load_root_file()?;
        self.load_mesh()?;
        self.load_fields()
    }

    /// Read and parse the manifest, then repopulate the collection
    /// metadata from it. A failed read or parse leaves the name, dims,
    /// and registries untouched.
    fn load_root_file(&mut self) -> Result<(), RestartError> {
        let path = naming::manifest_file(
            &self.base.prefix_path,
            &self.base.name,
            self.base.cycle,
            self.base.pad_digits,
        );
        let text = fs::read_to_string(&path).map_err(|source| RestartError::ManifestRead {
            path: path.clone(),
            source,
        })?;
        let doc = RootManifest::from_json(&path, &text)?;
        let main = doc.dsets.main;

        // Parse everything before mutating any state.
        let name = main
            .collection_name()
            .ok_or_else(|| RestartError::ManifestParse {
                path: path.clone(),
                reason: "mesh path template has no `_` separator".into(),
            })?
            .to_string();
        let parse = |result: Result<i64, String>| {
            result.map_err(|reason| RestartError::ManifestParse {
                path: path.clone(),
                reason,
            })
        };
        let spatial_dim = parse(main.mesh.tags.spatial_dim())?;
        let topo_dim = parse(main.mesh.tags.topo_dim())?;
        let max_detail_level = parse(main.mesh.tags.max_lods())?;
        let mut field_info = BTreeMap::new();
        for (field_name, entry) in &main.fields {
            let components = parse(entry.tags.comps())?;
            field_info.insert(
                field_name.clone(),
                FieldInfo {
                    association: entry.tags.assoc.clone(),
                    components,
                },
            );
        }

        self.base.name = name;
        self.base.cycle = main.cycle;
        self.base.time = main.time;
        self.base.rank_count = main.domains;
        self.spatial_dim = spatial_dim;
        self.topo_dim = topo_dim;
        self.max_detail_level = max_detail_level;
        self.field_info = field_info;
        Ok(())
    }

    fn load_mesh(&mut self) -> Result<(), RestartError> {
        let dir = naming::cycle_directory(
            &self.base.prefix_path,
            &self.base.name,
            self.base.cycle,
            self.base.pad_digits,
        );
        let path = naming::entity_file(&dir, "mesh", self.base.rank, self.base.pad_digits, false);
        let file = File::open(&path).map_err(|source| RestartError::MeshRead {
            path: path.clone(),
            source,
        })?;
        let mesh = M::read_from(BufReader::new(file))
            .map_err(|source| RestartError::MeshRead { path, source })?;
        self.spatial_dim = mesh.spatial_dimension();
        self.topo_dim = mesh.topological_dimension();
        self.base.mesh = Some(Slot::Owned(Box::new(mesh)));
        Ok(())
    }

    fn load_fields(&mut self) -> Result<(), RestartError> {
        let dir = naming::cycle_directory(
            &self.base.prefix_path,
            &self.base.name,
            self.base.cycle,
            self.base.pad_digits,
        );
        let paths: Vec<(String, String)> = self
            .field_info
            .keys()
            .map(|name| {
                let path =
                    naming::entity_file(&dir, name, self.base.rank, self.base.pad_digits, false);
                (name.clone(), path)
            })
            .collect();

        let collection_name = self.base.name.clone();
        let Collection { mesh, fields, .. } = &mut self.base;
        let mesh = match mesh.as_ref() {
            Some(slot) => slot.get(),
            None => {
                return Err(RestartError::MissingMesh {
                    name: collection_name,
                });
            }
        };
        for (name, path) in paths {
            let file = File::open(&path).map_err(|source| RestartError::FieldRead {
                name: name.clone(),
                path: path.clone(),
                source,
            })?;
            let field =
                F::read_from(mesh, BufReader::new(file)).map_err(|source| {
                    RestartError::FieldRead {
                        name: name.clone(),
                        path,
                        source,
                    }
                })?;
            fields.insert(name, Some(Slot::Owned(Box::new(field))));
        }
        Ok(())
    }

    /// Build the manifest document for the current cycle. Paths are
    /// relative to the manifest itself, so the tree stays relocatable.
    fn build_manifest(&self) -> RootManifest {
        let dir = format!(
            "{}_{}/",
            self.base.name,
            naming::padded(self.base.cycle, self.base.pad_digits)
        );
        let template = naming::rank_template(self.base.pad_digits);

        let mesh = MeshEntry {
            path: format!("{dir}mesh{template}"),
            tags: MeshTags {
                spatial_dim: self.spatial_dim.to_string(),
                topo_dim: self.topo_dim.to_string(),
                max_lods: self.max_detail_level.to_string(),
            },
        };
        let fields: BTreeMap<String, FieldEntry> = self
            .field_info
            .iter()
            .map(|(name, info)| {
                (
                    name.clone(),
                    FieldEntry {
                        path: format!("{dir}{name}{template}"),
                        tags: FieldTags {
                            assoc: info.association.clone(),
                            comps: info.components.to_string(),
                        },
                    },
                )
            })
            .collect();

        RootManifest {
            dsets: DatasetGroup {
                main: MainDataset {
                    cycle: self.base.cycle,
                    time: self.base.time,
                    domains: self.base.rank_count,
                    mesh,
                    fields,
                },
            },
        }
    }
}
