//! `.names` — interned street names with an offset table

use std::path::Path;

use crate::error::ArtifactError;
use crate::nbg::NameTable;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x414E_4D57; // "WMNA"

pub fn write(path: &Path, names: &NameTable) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(names.len() as u32)?;
    let mut offset = 0u32;
    w.u32(0)?;
    for name in names.names() {
        offset += name.len() as u32;
        w.u32(offset)?;
    }
    for name in names.names() {
        w.bytes(name.as_bytes())?;
    }
    w.finish()
}

pub fn read(path: &Path) -> Result<NameTable, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let count = r.u32()? as usize;
    let mut offsets = Vec::with_capacity(count + 1);
    for _ in 0..=count {
        offsets.push(r.u32()?);
    }
    let blob = r.bytes(*offsets.last().unwrap_or(&0) as usize)?;
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(r.corrupt("name offsets are not monotone"));
    }
    let mut names = Vec::with_capacity(count);
    for pair in offsets.windows(2) {
        let raw = &blob[pair[0] as usize..pair[1] as usize];
        let name = std::str::from_utf8(raw)
            .map_err(|_| r.corrupt("name table is not valid utf-8"))?;
        names.push(name.to_owned());
    }
    r.verify()?;
    Ok(NameTable::from_names(names))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.names");
        let mut table = NameTable::new();
        table.intern("Rue de la Loi");
        table.intern("Wetstraat");
        table.intern("");
        write(&path, &table).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.get(0), Some("Rue de la Loi"));
        assert_eq!(back.get(1), Some("Wetstraat"));
        assert_eq!(back.get(2), Some(""));
    }
}
