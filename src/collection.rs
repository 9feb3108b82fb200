//! Base collection: named field registry, mesh slot, and the rank-aware
//! directory/file protocol for saving checkpoints.
//!
//! A `Collection` never interprets mesh or field bytes; it owns the naming
//! scheme, the coordinated directory creation, and the sticky error state,
//! and delegates (de)serialization to the [`MeshHandle`]/[`FieldHandle`]
//! collaborators. The manifest-backed specialization lives in
//! [`crate::indexed`].

use crate::comm::Communicator;
use crate::error::{ErrorState, RestartError};
use crate::handles::{FieldHandle, MeshHandle};
use crate::naming;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::Arc;

/// Default significant digits for numeric text output.
pub const DEFAULT_PRECISION: usize = 6;
/// Default zero-pad width for cycle and rank suffixes.
pub const DEFAULT_PAD_DIGITS: usize = 6;

/// How a collection holds one mesh or field object.
///
/// Caller-registered data is shared: the collection's handle can never
/// free the caller's object. Loaded data is owned and dropped when the
/// collection releases it.
#[derive(Debug)]
pub enum Slot<T> {
    /// Registered by the caller, who keeps their own handle alive.
    Shared(Arc<T>),
    /// Reconstructed by a load; released by the collection.
    Owned(Box<T>),
}

impl<T> Slot<T> {
    /// Borrow the underlying object regardless of ownership.
    pub fn get(&self) -> &T {
        match self {
            Slot::Shared(v) => v,
            Slot::Owned(v) => v,
        }
    }
}

/// Collection-level ownership tag.
///
/// `Owned` only after a successful load; every delete or failed load
/// returns the collection to `Borrowed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Mesh/fields belong to the caller.
    Borrowed,
    /// Mesh/fields were produced by a load and belong to the collection.
    Owned,
}

/// Registry of one mesh and zero or more named fields, with the directory
/// and per-rank file naming protocol for saving them.
pub struct Collection<M, F> {
    pub(crate) name: String,
    pub(crate) prefix_path: String,
    pub(crate) cycle: i64,
    pub(crate) time: f64,
    pub(crate) precision: usize,
    pub(crate) pad_digits: usize,
    pub(crate) rank: usize,
    pub(crate) rank_count: usize,
    pub(crate) serial: bool,
    pub(crate) ownership: Ownership,
    pub(crate) error_state: ErrorState,
    pub(crate) comm: Arc<dyn Communicator>,
    pub(crate) mesh: Option<Slot<M>>,
    // BTreeMap: field iteration order is the lexicographic name order,
    // which is also the manifest emission order.
    pub(crate) fields: BTreeMap<String, Option<Slot<F>>>,
}

impl<M: MeshHandle, F: FieldHandle<Mesh = M>> Collection<M, F> {
    /// Create an empty collection; rank and rank count are captured from
    /// the injected communicator.
    pub fn new(name: impl Into<String>, comm: Arc<dyn Communicator>) -> Self {
        let rank = comm.rank();
        let rank_count = comm.size();
        Self {
            name: name.into(),
            prefix_path: String::new(),
            cycle: -1,
            time: 0.0,
            precision: DEFAULT_PRECISION,
            pad_digits: DEFAULT_PAD_DIGITS,
            rank,
            rank_count,
            serial: rank_count == 1,
            ownership: Ownership::Borrowed,
            error_state: ErrorState::None,
            comm,
            mesh: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create a collection with a caller-owned mesh already attached.
    pub fn with_mesh(name: impl Into<String>, mesh: Arc<M>, comm: Arc<dyn Communicator>) -> Self {
        let mut collection = Self::new(name, comm);
        collection.set_mesh(mesh);
        collection
    }

    /// Collection name used in every directory and manifest path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active checkpoint index; `-1` means no cycle suffix.
    pub fn cycle(&self) -> i64 {
        self.cycle
    }

    /// Set the active checkpoint index.
    pub fn set_cycle(&mut self, cycle: i64) {
        self.cycle = cycle;
    }

    /// Simulation time associated with the current cycle.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Set the simulation time recorded in the manifest.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Set the significant-digit count forwarded to collaborators.
    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    /// Set the zero-pad width for cycle and rank suffixes.
    pub fn set_pad_digits(&mut self, pad_digits: usize) {
        self.pad_digits = pad_digits;
    }

    /// This process's rank within the mesh partitioning.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total rank count; updated from the manifest by a load.
    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    /// Whether this collection owns its mesh/field data (true only after
    /// a successful load).
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Sticky error state of the most recent failing operation.
    pub fn error_state(&self) -> ErrorState {
        self.error_state
    }

    /// Set the root directory all output nests under. Normalized to end
    /// in `/` when non-empty; an empty prefix means the working directory.
    pub fn set_prefix_path(&mut self, prefix: &str) {
        self.prefix_path = prefix.to_string();
        if !self.prefix_path.is_empty() && !self.prefix_path.ends_with('/') {
            self.prefix_path.push('/');
        }
    }

    /// Attach a caller-owned mesh, releasing any previously owned one.
    pub fn set_mesh(&mut self, mesh: Arc<M>) {
        self.mesh = Some(Slot::Shared(mesh));
    }

    /// Borrow the attached mesh, if any.
    pub fn mesh(&self) -> Option<&M> {
        self.mesh.as_ref().map(Slot::get)
    }

    /// Register a caller-owned field under a unique name. Re-registering
    /// an existing name releases the previous value.
    pub fn register_field(&mut self, name: impl Into<String>, field: Arc<F>) {
        self.fields.insert(name.into(), Some(Slot::Shared(field)));
    }

    /// Whether a field name is registered (its data may be deleted).
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Borrow a registered field's data, if present.
    pub fn field(&self, name: &str) -> Option<&F> {
        self.fields.get(name).and_then(|slot| slot.as_ref()).map(Slot::get)
    }

    /// Registered field names in lexicographic (= manifest) order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Save the mesh and every registered field for the current cycle.
    ///
    /// Directory-creation failures are fail-fast: nothing is written for
    /// this call. Mesh and per-field write failures are independent: each
    /// remaining entity is still attempted, the sticky state is set, and
    /// the first failure is returned after the loop.
    pub fn save(&mut self) -> Result<(), RestartError> {
        let dir = self.prepare_directories()?;

        let mut first_failure: Option<RestartError> = None;
        if let Err(err) = self.write_mesh_file(&dir) {
            self.record_failure(&err);
            first_failure.get_or_insert(err);
        }
        let names: Vec<String> = self.fields.keys().cloned().collect();
        for name in names {
            if let Err(err) = self.write_field_file(&dir, &name) {
                self.record_failure(&err);
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Write exactly one registered field's per-rank file. No-op for an
    /// unknown name. Assumes the cycle directory exists from a prior save.
    pub fn save_field(&mut self, name: &str) -> Result<(), RestartError> {
        if !self.fields.contains_key(name) {
            return Ok(());
        }
        let dir = naming::cycle_directory(&self.prefix_path, &self.name, self.cycle, self.pad_digits);
        if let Err(err) = self.write_field_file(&dir, name) {
            self.record_failure(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Release mesh and field data, preserving the field names. Owned
    /// objects are dropped here; shared ones only lose this collection's
    /// handle.
    pub fn delete_data(&mut self) {
        self.mesh = None;
        for value in self.fields.values_mut() {
            *value = None;
        }
        self.ownership = Ownership::Borrowed;
    }

    /// Release mesh and field data and forget the field names; also
    /// resets the sticky error state.
    pub fn delete_all(&mut self) {
        self.purge();
        self.error_state = ErrorState::None;
    }

    /// Like [`delete_all`](Self::delete_all) but preserves the sticky
    /// error state. Used to roll back a failed load.
    pub(crate) fn purge(&mut self) {
        self.delete_data();
        self.fields.clear();
    }

    pub(crate) fn record_failure(&mut self, err: &RestartError) {
        self.error_state = err.state();
        log::warn!("{err}");
    }

    /// Create the prefix directory (when configured) and the cycle
    /// directory, coordinated across ranks, and return the cycle
    /// directory path. Fail-fast: a failure here aborts the whole save.
    fn prepare_directories(&mut self) -> Result<String, RestartError> {
        if !self.prefix_path.is_empty() {
            let prefix = self.prefix_path.clone();
            if let Err(err) = self.create_directory(&prefix) {
                self.record_failure(&err);
                return Err(err);
            }
        }
        let dir = naming::cycle_directory(&self.prefix_path, &self.name, self.cycle, self.pad_digits);
        if let Err(err) = self.create_directory(&dir) {
            self.record_failure(&err);
            return Err(err);
        }
        Ok(dir)
    }

    /// Idempotent, rank-coordinated directory creation. With more than
    /// one rank, only rank 0 issues the syscall; every other rank blocks
    /// on the broadcast result instead of racing the creation.
    fn create_directory(&self, path: &str) -> Result<(), RestartError> {
        let err = if self.rank_count > 1 {
            if self.rank == 0 {
                let local = try_create(path);
                self.comm.broadcast_int(local, 0)
            } else {
                self.comm.broadcast_int(0, 0)
            }
        } else {
            try_create(path)
        };
        if err != 0 {
            return Err(RestartError::CreateDirectory {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn write_mesh_file(&self, dir: &str) -> Result<(), RestartError> {
        let mesh = match &self.mesh {
            Some(slot) => slot.get(),
            None => {
                return Err(RestartError::MissingMesh {
                    name: self.name.clone(),
                });
            }
        };
        let path = naming::entity_file(dir, "mesh", self.rank, self.pad_digits, self.serial);
        let file = File::create(&path).map_err(|source| RestartError::MeshWrite {
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        mesh.write_to(&mut out, self.precision)
            .and_then(|()| out.flush())
            .map_err(|source| RestartError::MeshWrite { path, source })
    }

    fn write_field_file(&self, dir: &str, name: &str) -> Result<(), RestartError> {
        let field = match self.fields.get(name).and_then(|slot| slot.as_ref()) {
            Some(slot) => slot.get(),
            // Name registered but data deleted: nothing to write.
            None => return Ok(()),
        };
        let path = naming::entity_file(dir, name, self.rank, self.pad_digits, self.serial);
        let file = File::create(&path).map_err(|source| RestartError::FieldWrite {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        field
            .write_to(&mut out, self.precision)
            .and_then(|()| out.flush())
            .map_err(|source| RestartError::FieldWrite {
                name: name.to_string(),
                path,
                source,
            })
    }
}

fn try_create(path: &str) -> i32 {
    match fs::create_dir(path) {
        Ok(()) => 0,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => 0,
        Err(_) => 1,
    }
}
