//! `.ramIndex` / `.fileIndex` — the two halves of the spatial index
//!
//! `.ramIndex` holds the block rectangles that stay resident; `.fileIndex`
//! holds the packed leaf records and may be memory-mapped at load.

use std::path::Path;

use crate::error::ArtifactError;
use crate::spatial::{LeafBlock, LeafRecord, LeafStore, LEAF_RECORD_BYTES};

use super::{ArtifactReader, ArtifactWriter, ScopedMmap};

const RAM_MAGIC: u32 = 0x4952_4D57; // "WMRI"
const FILE_MAGIC: u32 = 0x4946_4D57; // "WMFI"

/// Bytes before the first leaf record: fingerprint + magic + count.
const FILE_HEADER_BYTES: usize = 12;

pub fn write_ram(path: &Path, blocks: &[LeafBlock]) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, RAM_MAGIC)?;
    w.u32(blocks.len() as u32)?;
    for b in blocks {
        w.f64(b.min[0])?;
        w.f64(b.min[1])?;
        w.f64(b.max[0])?;
        w.f64(b.max[1])?;
        w.u32(b.start)?;
        w.u32(b.count)?;
    }
    w.finish()
}

pub fn read_ram(path: &Path) -> Result<Vec<LeafBlock>, ArtifactError> {
    let mut r = ArtifactReader::open(path, RAM_MAGIC)?;
    let count = r.u32()? as usize;
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let min = [r.f64()?, r.f64()?];
        let max = [r.f64()?, r.f64()?];
        blocks.push(LeafBlock {
            min,
            max,
            start: r.u32()?,
            count: r.u32()?,
        });
    }
    r.verify()?;
    Ok(blocks)
}

pub fn write_file(path: &Path, leaves: &[LeafRecord]) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, FILE_MAGIC)?;
    w.u32(leaves.len() as u32)?;
    let mut buf = Vec::with_capacity(LEAF_RECORD_BYTES);
    for leaf in leaves {
        buf.clear();
        leaf.write_to(&mut buf);
        w.bytes(&buf)?;
    }
    w.finish()
}

/// Read the leaf records. With `mapped`, the file stays on disk behind a
/// scoped mapping and the checksum is verified over the mapping; otherwise
/// the records stream through the reader as usual.
pub fn read_file(path: &Path, mapped: bool) -> Result<LeafStore, ArtifactError> {
    // Header validation happens through the reader either way
    let mut r = ArtifactReader::open(path, FILE_MAGIC)?;
    let count = r.u32()? as usize;

    if mapped {
        let map = ScopedMmap::open(path)?;
        let need = FILE_HEADER_BYTES + count * LEAF_RECORD_BYTES + 8;
        if map.as_slice().len() < need {
            return Err(r.corrupt(format!(
                "leaf file shorter than {need} bytes for {count} records"
            )));
        }
        super::verify_image(path, map.as_slice())?;
        Ok(LeafStore::Mapped {
            map,
            offset: FILE_HEADER_BYTES,
            count,
        })
    } else {
        let mut leaves = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = r.bytes(LEAF_RECORD_BYTES)?;
            leaves.push(LeafRecord::read_from(&raw));
        }
        r.verify()?;
        Ok(LeafStore::Ram(leaves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaves() -> Vec<LeafRecord> {
        (0..5)
            .map(|i| LeafRecord {
                bbox: [i * 1000, i * 1000, i * 1000 + 500, i * 1000 + 500],
                segment: i as u32,
                forward_node: i as u32 * 2,
                reverse_node: i as u32 * 2 + 1,
                tiny: i == 4,
            })
            .collect()
    }

    #[test]
    fn leaf_file_ram_and_mapped_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.fileIndex");
        let leaves = sample_leaves();
        write_file(&path, &leaves).unwrap();

        let ram = read_file(&path, false).unwrap();
        let mapped = read_file(&path, true).unwrap();
        assert_eq!(ram.len(), 5);
        assert_eq!(mapped.len(), 5);
        for i in 0..5 {
            assert_eq!(ram.get(i), leaves[i]);
            assert_eq!(mapped.get(i), leaves[i]);
        }
    }

    #[test]
    fn ram_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.ramIndex");
        let blocks = vec![LeafBlock {
            min: [4.0, 50.0],
            max: [4.5, 50.5],
            start: 0,
            count: 128,
        }];
        write_ram(&path, &blocks).unwrap();
        let back = read_ram(&path).unwrap();
        assert_eq!(back, blocks);
    }
}
