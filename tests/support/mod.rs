//! Shared fixtures: synthetic networks through the full pipeline
//! (extract to a temp dir, contract, load the dataset back).

use std::path::Path;

use waymark::contractor::{contract, ContractorConfig};
use waymark::coord::Coordinate;
use waymark::extractor::{extract, ExtractConfig};
use waymark::formats::{self, artifact_path, suffix};
use waymark::osm::{ExtractionInput, RawNode, RawWay, Tags};
use waymark::profile::{
    Profile, ProfileProperties, RoadClass, TravelMode, TurnContext, TurnCost, WayProfile,
};
use waymark::spatial::PhantomNode;
use waymark::Dataset;

/// Fixed-cost test profile: no turn penalties at all, so path weights are
/// plain sums of segment weights.
pub struct ZeroTurnProfile;

impl Profile for ZeroTurnProfile {
    fn name(&self) -> &str {
        "zero-turn"
    }

    fn assess_way(&self, _tags: &Tags) -> Option<WayProfile> {
        Some(way_profile(360.0, None))
    }

    fn barrier_passable(&self, _kind: &str, _tags: &Tags) -> bool {
        false
    }

    fn turn_cost(&self, _ctx: &TurnContext) -> TurnCost {
        TurnCost::ZERO
    }

    fn properties(&self) -> ProfileProperties {
        ProfileProperties {
            profile_name: "zero-turn".to_owned(),
            max_speed_kmh: 360.0,
            turn_penalty_ds: 0,
            traffic_signal_penalty_ds: 0,
            uturn_penalty_ds: 0,
            left_hand_driving: false,
            continuation_hop_limit: 2,
            alternative_count: 1,
        }
    }
}

/// 360 km/h makes a 11.1 m leg cost exactly 1 deci-second.
pub fn way_profile(speed_kmh: f64, name: Option<&str>) -> WayProfile {
    WayProfile {
        class: RoadClass::Residential,
        mode: TravelMode::Driving,
        speed_forward_kmh: speed_kmh,
        speed_backward_kmh: speed_kmh,
        roundabout: false,
        access_restricted: false,
        name: name.map(str::to_owned),
    }
}

pub fn node(id: i64, lon_deg: f64, lat_deg: f64) -> RawNode {
    RawNode::plain(id, Coordinate::from_degrees(lon_deg, lat_deg))
}

pub fn way(id: i64, nodes: Vec<i64>, profile: WayProfile) -> RawWay {
    RawWay {
        id,
        nodes,
        way: profile,
    }
}

/// Run the whole pipeline and load the resulting dataset.
pub fn build_dataset(
    input: &ExtractionInput,
    profile: &dyn Profile,
    core_factor: f64,
) -> (tempfile::TempDir, Dataset) {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("net");

    extract(
        input,
        profile,
        &ExtractConfig {
            base: base.clone(),
            small_component_size: 0,
        },
    )
    .expect("extract");

    contract_artifacts(&base, core_factor);

    let dataset = Dataset::load(&base, false).expect("load dataset");
    (dir, dataset)
}

/// The contract step, as the binary runs it.
pub fn contract_artifacts(base: &Path, core_factor: f64) {
    let ebg_path = artifact_path(base, suffix::EBG);
    let records = formats::ebg::read(&ebg_path).expect("read ebg");
    let (segments, _) =
        formats::ebg_nodes::read(&artifact_path(base, suffix::EBG_NODES)).expect("read nodes");
    let contraction = contract(
        segments.len(),
        &records,
        &ContractorConfig {
            core_factor,
            ..Default::default()
        },
    )
    .expect("contract");
    let (checksum, _) = formats::ebg_checksum(&ebg_path).expect("edge checksum");
    let hsgr = contraction.into_hsgr(checksum);
    formats::hsgr::write(&artifact_path(base, suffix::HSGR), &hsgr).expect("write hsgr");
}

pub fn snap(dataset: &Dataset, lon_deg: f64, lat_deg: f64) -> PhantomNode {
    dataset
        .spatial
        .nearest(
            Coordinate::from_degrees(lon_deg, lat_deg),
            1,
            &dataset.geometry,
            &dataset.nodes,
        )
        .into_iter()
        .next()
        .expect("snap")
        .phantom
}

/// Degrees of longitude per meter at the equator.
pub const DEG_PER_M: f64 = 1.0 / 111_195.0;

/// A 10x10 lattice with 11.1 m spacing; every edge costs exactly 1.
/// Horizontal and vertical ways carry different names so corners stay
/// unfolded.
pub fn grid_input() -> ExtractionInput {
    let mut input = ExtractionInput::new();
    let spacing = 0.0001; // ~11.1 m at the equator
    let id = |x: i64, y: i64| y * 10 + x + 1;

    for y in 0..10 {
        for x in 0..10 {
            input.nodes.push(node(
                id(x, y),
                spacing * x as f64,
                spacing * y as f64,
            ));
        }
    }
    for y in 0..10 {
        input.ways.push(way(
            100 + y,
            (0..10).map(|x| id(x, y)).collect(),
            way_profile(360.0, Some("east-west")),
        ));
    }
    for x in 0..10 {
        input.ways.push(way(
            200 + x,
            (0..10).map(|y| id(x, y)).collect(),
            way_profile(360.0, Some("north-south")),
        ));
    }
    input
}

/// Grid coordinate of lattice node (x, y).
pub fn grid_coord(x: u32, y: u32) -> (f64, f64) {
    (0.0001 * x as f64, 0.0001 * y as f64)
}
