//! `.geometry` — packed polylines with cumulative per-leg costs

use std::path::Path;

use crate::coord::Coordinate;
use crate::ebg::GeometryTable;
use crate::error::ArtifactError;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x4547_4D57; // "WMGE"

pub fn write(path: &Path, table: &GeometryTable) -> Result<(), ArtifactError> {
    let (offsets, coords, cum_weights, cum_durations) = table.parts();
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32((offsets.len() - 1) as u32)?;
    for &o in offsets {
        w.u32(o)?;
    }
    for c in coords {
        w.i32(c.lon)?;
        w.i32(c.lat)?;
    }
    for &v in cum_weights {
        w.i32(v)?;
    }
    for &v in cum_durations {
        w.i32(v)?;
    }
    w.finish()
}

pub fn read(path: &Path) -> Result<GeometryTable, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let entries = r.u32()? as usize;

    let mut offsets = Vec::with_capacity(entries + 1);
    for _ in 0..=entries {
        offsets.push(r.u32()?);
    }
    let n_coords = *offsets.last().unwrap_or(&0) as usize;
    // Each entry has one fewer cost legs than coordinates
    let n_legs = n_coords - entries;

    let mut coords = Vec::with_capacity(n_coords);
    for _ in 0..n_coords {
        let lon = r.i32()?;
        let lat = r.i32()?;
        coords.push(Coordinate::new(lon, lat));
    }
    let mut cum_weights = Vec::with_capacity(n_legs);
    for _ in 0..n_legs {
        cum_weights.push(r.i32()?);
    }
    let mut cum_durations = Vec::with_capacity(n_legs);
    for _ in 0..n_legs {
        cum_durations.push(r.i32()?);
    }
    r.verify()?;

    Ok(GeometryTable::from_parts(
        offsets,
        coords,
        cum_weights,
        cum_durations,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.geometry");
        let table = GeometryTable::from_parts(
            vec![0, 3, 5],
            vec![
                Coordinate::new(0, 0),
                Coordinate::new(1000, 0),
                Coordinate::new(2000, 0),
                Coordinate::new(5000, 5000),
                Coordinate::new(6000, 5000),
            ],
            vec![3, 6, 4],
            vec![3, 6, 4],
        );
        write(&path, &table).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.polyline(0).len(), 3);
        assert_eq!(back.cumulative_weights(0), &[3, 6]);
        assert_eq!(back.polyline(1).len(), 2);
        assert_eq!(back.cumulative_weights(1), &[4]);
    }
}
