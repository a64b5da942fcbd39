//! `.enw` — per-node traversal costs of the edge-expanded graph

use std::path::Path;

use crate::error::ArtifactError;
use crate::Weight;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x574E_4D57; // "WMNW"

pub fn write(path: &Path, weights: &[Weight], durations: &[Weight]) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(weights.len() as u32)?;
    for (&weight, &duration) in weights.iter().zip(durations) {
        w.i32(weight)?;
        w.i32(duration)?;
    }
    w.finish()
}

pub fn read(path: &Path) -> Result<(Vec<Weight>, Vec<Weight>), ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let count = r.u32()? as usize;
    let mut weights = Vec::with_capacity(count);
    let mut durations = Vec::with_capacity(count);
    for _ in 0..count {
        weights.push(r.i32()?);
        durations.push(r.i32()?);
    }
    r.verify()?;
    Ok((weights, durations))
}
