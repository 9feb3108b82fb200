//! # mesh-restart
//!
//! mesh-restart is the checkpoint/restart layer of a parallel mesh-based
//! simulation framework. It persists a mesh partition plus a set of named
//! field datasets to per-rank files at discrete cycles, and indexes each
//! cycle with a self-describing root manifest so a later, unrelated run
//! can rebuild the whole collection from disk alone.
//!
//! ## Features
//! - Deterministic, collision-free directory and file naming across
//!   cycles and ranks (fixed-width zero-padded suffixes)
//! - Rank-coordinated, idempotent directory creation: rank 0 creates,
//!   every other rank blocks on a broadcast of the result
//! - A self-describing JSON root manifest recording path templates and
//!   per-field type tags, relocatable with the checkpoint tree
//! - Explicit borrowed-vs-owned lifetimes for registered and loaded data
//! - Pluggable communicator backends (serial, in-process threads, MPI)
//!
//! Mesh and field types are external collaborators: they implement
//! [`handles::MeshHandle`] and [`handles::FieldHandle`] and keep full
//! control of their serialization format. This crate performs no
//! numerical computation and no mesh-topology validation.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-restart = "0.1"
//! # Optional: features = ["mpi-support"]
//! ```

pub mod collection;
pub mod comm;
pub mod error;
pub mod handles;
pub mod indexed;
pub mod manifest;
pub mod naming;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::collection::{Collection, Ownership, Slot};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, LocalComm, NoComm};
    pub use crate::error::{ErrorState, RestartError};
    pub use crate::handles::{FieldHandle, MeshHandle};
    pub use crate::indexed::{FieldInfo, IndexedCollection};
    pub use crate::manifest::RootManifest;
}
