//! `.ebg` — edge-expanded edges

use std::path::Path;

use crate::ebg::EegEdge;
use crate::error::ArtifactError;
use crate::{EegNodeId, Weight};

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x4245_4D57; // "WMEB"

/// One edge record as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: EegNodeId,
    pub target: EegNodeId,
    pub weight: Weight,
    pub duration: Weight,
    pub forward: bool,
    pub backward: bool,
}

pub fn write(path: &Path, edges: &[EegEdge]) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u64(edges.len() as u64)?;
    for e in edges {
        w.u32(e.source)?;
        w.u32(e.target)?;
        w.i32(e.weight)?;
        w.i32(e.duration)?;
        w.u8(0b01)?; // forward-only records: turns are directed
    }
    w.finish()
}

pub fn read(path: &Path) -> Result<Vec<EdgeRecord>, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let count = r.u64()? as usize;
    let mut edges = Vec::with_capacity(count);
    for _ in 0..count {
        let source = r.u32()?;
        let target = r.u32()?;
        let weight = r.i32()?;
        let duration = r.i32()?;
        let flags = r.u8()?;
        edges.push(EdgeRecord {
            source,
            target,
            weight,
            duration,
            forward: flags & 0b01 != 0,
            backward: flags & 0b10 != 0,
        });
    }
    r.verify()?;
    Ok(edges)
}
