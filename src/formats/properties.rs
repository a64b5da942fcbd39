//! `.properties` — profile-derived constants

use std::path::Path;

use crate::error::ArtifactError;
use crate::profile::ProfileProperties;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x5250_4D57; // "WMPR"

pub fn write(path: &Path, props: &ProfileProperties) -> Result<(), ArtifactError> {
    let mut w = ArtifactWriter::create(path, MAGIC)?;
    w.u32(props.profile_name.len() as u32)?;
    w.bytes(props.profile_name.as_bytes())?;
    w.f64(props.max_speed_kmh)?;
    w.i32(props.turn_penalty_ds)?;
    w.i32(props.traffic_signal_penalty_ds)?;
    w.i32(props.uturn_penalty_ds)?;
    w.u8(props.left_hand_driving as u8)?;
    w.u32(props.continuation_hop_limit)?;
    w.u32(props.alternative_count)?;
    w.finish()
}

pub fn read(path: &Path) -> Result<ProfileProperties, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;
    let name_len = r.u32()? as usize;
    let raw = r.bytes(name_len)?;
    let profile_name = String::from_utf8(raw)
        .map_err(|_| r.corrupt("profile name is not valid utf-8"))?;
    let props = ProfileProperties {
        profile_name,
        max_speed_kmh: r.f64()?,
        turn_penalty_ds: r.i32()?,
        traffic_signal_penalty_ds: r.i32()?,
        uturn_penalty_ds: r.i32()?,
        left_hand_driving: r.u8()? != 0,
        continuation_hop_limit: r.u32()?,
        alternative_count: r.u32()?,
    };
    r.verify()?;
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CarProfile, Profile};

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.properties");
        let props = CarProfile::new().properties();
        write(&path, &props).unwrap();
        assert_eq!(read(&path).unwrap(), props);
    }
}
