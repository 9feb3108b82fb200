#![allow(dead_code)]
//! Shared test fixtures: a tiny text-format mesh and field implementing
//! the collaborator traits, with global drop counters for ownership
//! accounting.

use mesh_restart::handles::{FieldHandle, MeshHandle};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

pub static MESH_DROPS: AtomicUsize = AtomicUsize::new(0);
pub static FIELD_DROPS: AtomicUsize = AtomicUsize::new(0);

fn invalid(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

/// One partition of a toy mesh: dimensions plus a vertex list.
pub struct ProbeMesh {
    pub spatial_dim: i64,
    pub topo_dim: i64,
    pub vertices: Vec<[f64; 3]>,
}

impl ProbeMesh {
    pub fn unit_triangle() -> Self {
        Self {
            spatial_dim: 2,
            topo_dim: 2,
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }
}

impl Drop for ProbeMesh {
    fn drop(&mut self) {
        MESH_DROPS.fetch_add(1, Relaxed);
    }
}

impl MeshHandle for ProbeMesh {
    fn write_to<W: Write>(&self, mut w: W, precision: usize) -> std::io::Result<()> {
        writeln!(w, "probe-mesh {} {}", self.spatial_dim, self.topo_dim)?;
        writeln!(w, "{}", self.vertices.len())?;
        for v in &self.vertices {
            writeln!(w, "{:.p$} {:.p$} {:.p$}", v[0], v[1], v[2], p = precision)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(mut r: R) -> std::io::Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| invalid("empty mesh file"))?;
        let mut parts = header.split_whitespace();
        if parts.next() != Some("probe-mesh") {
            return Err(invalid("bad mesh header"));
        }
        let spatial_dim = parse_int(parts.next())?;
        let topo_dim = parse_int(parts.next())?;
        let count = parse_int(lines.next().map(str::trim))? as usize;
        let mut vertices = Vec::with_capacity(count);
        for _ in 0..count {
            let line = lines.next().ok_or_else(|| invalid("truncated vertex list"))?;
            let mut coords = line.split_whitespace().map(parse_float);
            vertices.push([
                coords.next().ok_or_else(|| invalid("missing coordinate"))??,
                coords.next().ok_or_else(|| invalid("missing coordinate"))??,
                coords.next().ok_or_else(|| invalid("missing coordinate"))??,
            ]);
        }
        Ok(Self {
            spatial_dim,
            topo_dim,
            vertices,
        })
    }

    fn spatial_dimension(&self) -> i64 {
        self.spatial_dim
    }

    fn topological_dimension(&self) -> i64 {
        self.topo_dim
    }
}

/// A toy nodal field: component count plus a flat value array.
pub struct ProbeField {
    pub components: i64,
    pub values: Vec<f64>,
}

impl ProbeField {
    pub fn scalar(values: &[f64]) -> Self {
        Self {
            components: 1,
            values: values.to_vec(),
        }
    }
}

impl Drop for ProbeField {
    fn drop(&mut self) {
        FIELD_DROPS.fetch_add(1, Relaxed);
    }
}

impl FieldHandle for ProbeField {
    type Mesh = ProbeMesh;

    fn write_to<W: Write>(&self, mut w: W, precision: usize) -> std::io::Result<()> {
        writeln!(w, "probe-field {}", self.components)?;
        writeln!(w, "{}", self.values.len())?;
        for v in &self.values {
            writeln!(w, "{v:.precision$}")?;
        }
        Ok(())
    }

    fn read_from<R: Read>(_mesh: &ProbeMesh, mut r: R) -> std::io::Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| invalid("empty field file"))?;
        let mut parts = header.split_whitespace();
        if parts.next() != Some("probe-field") {
            return Err(invalid("bad field header"));
        }
        let components = parse_int(parts.next())?;
        let count = parse_int(lines.next().map(str::trim))? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let line = lines.next().ok_or_else(|| invalid("truncated value list"))?;
            values.push(parse_float(line.trim())?);
        }
        Ok(Self { components, values })
    }

    fn component_count(&self) -> i64 {
        self.components
    }
}

fn parse_int(raw: Option<&str>) -> std::io::Result<i64> {
    raw.and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("expected an integer"))
}

fn parse_float(raw: &str) -> std::io::Result<f64> {
    raw.parse().map_err(|_| invalid("expected a float"))
}
