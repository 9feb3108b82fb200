//! Collaborator traits at the mesh/field boundary.
//!
//! The checkpoint layer never interprets mesh or field bytes itself: the
//! hosting framework's types implement these traits and keep full control
//! of their on-disk text format. `precision` is the significant-digit
//! count for numeric text output, forwarded unchanged from the collection
//! configuration.

use std::io::{Read, Write};

/// One spatial partition of the simulation mesh.
pub trait MeshHandle: Sized {
    /// Serialize this partition to `writer` using `precision` significant
    /// digits for floating-point values.
    fn write_to<W: Write>(&self, writer: W, precision: usize) -> std::io::Result<()>;

    /// Reconstruct a partition from `reader`.
    fn read_from<R: Read>(reader: R) -> std::io::Result<Self>;

    /// Dimension of the space the mesh is embedded in.
    fn spatial_dimension(&self) -> i64;

    /// Intrinsic dimension of the mesh elements.
    fn topological_dimension(&self) -> i64;
}

/// One named field (grid function) defined on a mesh partition.
pub trait FieldHandle: Sized {
    /// Mesh type this field is defined on.
    type Mesh: MeshHandle;

    /// Serialize this field to `writer` using `precision` significant
    /// digits for floating-point values.
    fn write_to<W: Write>(&self, writer: W, precision: usize) -> std::io::Result<()>;

    /// Reconstruct a field from `reader`, attached to `mesh`.
    fn read_from<R: Read>(mesh: &Self::Mesh, reader: R) -> std::io::Result<Self>;

    /// Number of vector components per mesh point.
    fn component_count(&self) -> i64;
}
