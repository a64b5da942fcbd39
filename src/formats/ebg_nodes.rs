//! `.ebg_nodes` — edge-expanded node table

use std::path::Path;

use crate::ebg::EegNode;
use crate::error::ArtifactError;
use crate::GeometryId;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x4E45_4D57; // "WMEN"

pub fn write(path: &Path, nodes: &[EegNode]) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(nodes.len() as u32)?;
    for n in nodes {
        w.u32(n.segment)?;
        w.u8(n.forward as u8)?;
    }
    w.finish()
}

/// Per node: (underlying geometry id, travels the stored orientation).
pub fn read(path: &Path) -> Result<(Vec<GeometryId>, Vec<bool>), ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let count = r.u32()? as usize;
    let mut segments = Vec::with_capacity(count);
    let mut forward = Vec::with_capacity(count);
    for _ in 0..count {
        segments.push(r.u32()?);
        forward.push(r.u8()? != 0);
    }
    r.verify()?;
    Ok((segments, forward))
}
