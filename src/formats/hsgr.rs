//! `.hsgr` — contraction hierarchy: levels and query edges

use std::path::Path;

use crate::error::ArtifactError;
use crate::{EegNodeId, Weight};

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x5348_4D57; // "WMHS"

/// One query edge: an original turn or a synthesised shortcut, stored once
/// per endpoint with direction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsgrEdge {
    pub target: EegNodeId,
    pub weight: Weight,
    pub duration: Weight,
    pub forward: bool,
    pub backward: bool,
    pub shortcut: bool,
    /// Contracted middle node for shortcuts, unused otherwise.
    pub middle: EegNodeId,
}

#[derive(Debug, Default)]
pub struct HsgrData {
    /// Identity of the edge-expanded graph this hierarchy was built from.
    pub checksum: u32,
    pub levels: Vec<u32>,
    /// First out-edge per node; length = node count + 1.
    pub first_edge: Vec<u32>,
    pub edges: Vec<HsgrEdge>,
}

pub fn write(path: &Path, data: &HsgrData) -> Result<(), ArtifactError> {
    let n = data.levels.len();
    debug_assert_eq!(data.first_edge.len(), n + 1);

    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(data.checksum)?;
    w.u32(n as u32)?;
    w.u64(data.edges.len() as u64)?;
    for i in 0..n {
        w.u32(data.first_edge[i])?;
        w.u32(data.levels[i])?;
    }
    for e in &data.edges {
        w.u32(e.target)?;
        w.i32(e.weight)?;
        w.i32(e.duration)?;
        let flags =
            (e.forward as u8) | ((e.backward as u8) << 1) | ((e.shortcut as u8) << 2);
        w.u8(flags)?;
        w.u32(e.middle)?;
    }
    w.finish()
}

pub fn read(path: &Path) -> Result<HsgrData, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let checksum = r.u32()?;
    let n = r.u32()? as usize;
    let n_edges = r.u64()? as usize;

    let mut first_edge = Vec::with_capacity(n + 1);
    let mut levels = Vec::with_capacity(n);
    for _ in 0..n {
        first_edge.push(r.u32()?);
        levels.push(r.u32()?);
    }
    first_edge.push(n_edges as u32);

    let mut edges = Vec::with_capacity(n_edges);
    for _ in 0..n_edges {
        let target = r.u32()?;
        let weight = r.i32()?;
        let duration = r.i32()?;
        let flags = r.u8()?;
        let middle = r.u32()?;
        edges.push(HsgrEdge {
            target,
            weight,
            duration,
            forward: flags & 0b001 != 0,
            backward: flags & 0b010 != 0,
            shortcut: flags & 0b100 != 0,
            middle,
        });
    }

    if first_edge.windows(2).any(|w| w[0] > w[1]) {
        return Err(r.corrupt("node offsets are not monotone"));
    }
    r.verify()?;

    Ok(HsgrData {
        checksum,
        levels,
        first_edge,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.hsgr");
        let data = HsgrData {
            checksum: 0xdead_beef,
            levels: vec![0, 1, crate::CORE_LEVEL],
            first_edge: vec![0, 2, 2, 3],
            edges: vec![
                HsgrEdge {
                    target: 1,
                    weight: 5,
                    duration: 5,
                    forward: true,
                    backward: false,
                    shortcut: false,
                    middle: 0,
                },
                HsgrEdge {
                    target: 2,
                    weight: 9,
                    duration: 9,
                    forward: true,
                    backward: false,
                    shortcut: true,
                    middle: 1,
                },
                HsgrEdge {
                    target: 0,
                    weight: 9,
                    duration: 9,
                    forward: false,
                    backward: true,
                    shortcut: true,
                    middle: 1,
                },
            ],
        };
        write(&path, &data).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.checksum, data.checksum);
        assert_eq!(back.levels, data.levels);
        assert_eq!(back.first_edge, data.first_edge);
        assert_eq!(back.edges, data.edges);
    }
}
