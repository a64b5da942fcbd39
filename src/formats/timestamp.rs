//! `.timestamp` — dataset identity string written at extraction time

use std::path::Path;

use crate::error::ArtifactError;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x5354_4D57; // "WMTS"

pub fn write(path: &Path, stamp: &str) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(stamp.len() as u32)?;
    w.bytes(stamp.as_bytes())?;
    w.finish()
}

pub fn read(path: &Path) -> Result<String, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let len = r.u32()? as usize;
    let raw = r.bytes(len)?;
    let stamp =
        String::from_utf8(raw).map_err(|_| r.corrupt("timestamp is not valid utf-8"))?;
    r.verify()?;
    Ok(stamp)
}
