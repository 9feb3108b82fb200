//! Naming helpers shared by the collection layers.
//!
//! Every path in a checkpoint tree is a pure function of the prefix path,
//! the collection name, the cycle, the rank, and the pad-digit count, so
//! repeated calls always yield identical strings. Rank and cycle suffixes
//! are fixed-width zero-filled decimal, which makes lexicographic file
//! order equal numeric rank order for up to `10^pad_digits` ranks.

/// Extension of the per-cycle root manifest file.
pub const MANIFEST_EXT: &str = ".mesh_root";

/// Fixed-width, zero-filled decimal rendering of `value`.
pub fn padded(value: i64, digits: usize) -> String {
    format!("{value:0digits$}")
}

/// Directory holding the per-rank data files of one cycle.
///
/// `prefix` is either empty or already ends in a path separator. A cycle
/// of `-1` means "no cycle suffix".
pub fn cycle_directory(prefix: &str, name: &str, cycle: i64, pad_digits: usize) -> String {
    if cycle == -1 {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{name}_{}", padded(cycle, pad_digits))
    }
}

/// Per-rank file for an entity (`"mesh"` or a field name) inside `dir`.
///
/// Serial collections write a single unsuffixed file per entity.
pub fn entity_file(dir: &str, entity: &str, rank: usize, pad_digits: usize, serial: bool) -> String {
    if serial {
        format!("{dir}/{entity}")
    } else {
        format!("{dir}/{entity}.{}", padded(rank as i64, pad_digits))
    }
}

/// Path of the root manifest for one cycle. The manifest sits next to the
/// cycle directory, not inside it.
pub fn manifest_file(prefix: &str, name: &str, cycle: i64, pad_digits: usize) -> String {
    format!(
        "{prefix}{name}_{}{MANIFEST_EXT}",
        padded(cycle, pad_digits)
    )
}

/// `%0Nd`-style per-rank suffix placeholder used in manifest path
/// templates, e.g. `".%06d"` for six pad digits.
pub fn rank_template(pad_digits: usize) -> String {
    format!(".%0{pad_digits}d")
}
