//! RestartError: unified error type for mesh-restart public APIs.
//!
//! Every failure a collection can observe maps onto the write/read
//! taxonomy: directory creation and file writes during a save are write
//! errors, manifest and per-rank file reads during a load are read errors.
//! Collections additionally expose the most recent class as a sticky
//! [`ErrorState`] so callers can poll after multi-entity operations.

use thiserror::Error;

/// Unified error type for checkpoint/restart operations.
#[derive(Debug, Error)]
pub enum RestartError {
    /// Directory creation failed on this rank or, in a parallel run, on the
    /// coordinating rank (observed through the broadcast result).
    #[error("error creating directory `{path}`")]
    CreateDirectory { path: String },
    /// No mesh is attached to the collection at save time.
    #[error("no mesh registered in collection `{name}`")]
    MissingMesh { name: String },
    /// Serializing the mesh to its per-rank file failed.
    #[error("error writing mesh to `{path}`: {source}")]
    MeshWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Serializing one field to its per-rank file failed.
    #[error("error writing field `{name}` to `{path}`: {source}")]
    FieldWrite {
        name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Writing the root manifest failed on the coordinating rank.
    #[error("error writing root manifest `{path}`: {source}")]
    ManifestWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The root manifest could not be opened or read.
    #[error("unable to read root manifest `{path}`: {source}")]
    ManifestRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The root manifest was read but is not a valid document.
    #[error("unable to parse root manifest `{path}`: {reason}")]
    ManifestParse { path: String, reason: String },
    /// The per-rank mesh file could not be opened or deserialized.
    #[error("unable to read mesh from `{path}`: {source}")]
    MeshRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A per-rank field file could not be opened or deserialized.
    #[error("unable to read field `{name}` from `{path}`: {source}")]
    FieldRead {
        name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RestartError {
    /// Classify this error into the sticky state a collection records.
    pub fn state(&self) -> ErrorState {
        match self {
            RestartError::CreateDirectory { .. }
            | RestartError::MissingMesh { .. }
            | RestartError::MeshWrite { .. }
            | RestartError::FieldWrite { .. }
            | RestartError::ManifestWrite { .. } => ErrorState::Write,
            RestartError::ManifestRead { .. }
            | RestartError::ManifestParse { .. }
            | RestartError::MeshRead { .. }
            | RestartError::FieldRead { .. } => ErrorState::Read,
        }
    }
}

/// Sticky error state of a collection.
///
/// Set by the most recent failing save/load, never cleared implicitly;
/// only [`delete_all`](crate::collection::Collection::delete_all) and the
/// start of a fresh [`load`](crate::indexed::IndexedCollection::load)
/// reset it. A successful save after a failed one leaves the flag in
/// place, so callers must check after each relevant call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorState {
    /// No failure observed since the last reset.
    #[default]
    None,
    /// A directory creation or file write failed.
    Write,
    /// A manifest, mesh, or field read failed.
    Read,
}
