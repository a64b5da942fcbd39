//! Extraction pipeline
//!
//! Parser output + profile -> node-based graph -> restriction index ->
//! intersection analysis -> edge-expanded graph -> on-disk artifacts.
//! Node and edge ids are fixed before any parallel stage, so the output is a
//! pure function of the input.

use std::path::PathBuf;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::info;

use crate::ebg::{self, EegNodeStore};
use crate::error::ExtractError;
use crate::formats::{self, artifact_path, suffix};
use crate::intersection::IntersectionAnalysis;
use crate::nbg;
use crate::osm::ExtractionInput;
use crate::profile::Profile;
use crate::restrictions::{self, RestrictionIndex};
use crate::spatial::{LeafStore, SpatialIndex};

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub base: PathBuf,
    /// Strongly-connected components below this size are demoted for
    /// snapping.
    pub small_component_size: u32,
}

#[derive(Debug)]
pub struct ExtractSummary {
    pub nodes: usize,
    pub segments: usize,
    pub eeg_nodes: usize,
    pub eeg_edges: usize,
    pub dropped_restrictions: usize,
}

/// Run the full extraction and write every extractor-owned artifact.
pub fn extract(
    input: &ExtractionInput,
    profile: &dyn Profile,
    config: &ExtractConfig,
) -> Result<ExtractSummary, ExtractError> {
    let started = Instant::now();

    if input.ways.is_empty() {
        return Err(ExtractError::EmptyNetwork {
            profile: profile.name().to_owned(),
        });
    }

    // Restriction resolution first: its member nodes are pinned through
    // compression.
    let node_map = nbg::assign_node_ids(input);
    let resolved = restrictions::resolve(input, &node_map);

    let mut barriers: FxHashMap<crate::NodeId, bool> = FxHashMap::default();
    for raw in &input.nodes {
        if let (Some(kind), Some(id)) = (&raw.barrier, node_map.get(raw.id)) {
            barriers.insert(id, profile.barrier_passable(kind, &raw.tags));
        }
    }

    let build = nbg::build_graph(input, node_map, &resolved.referenced_nodes);
    info!(
        nodes = build.graph.node_count(),
        segments = build.graph.segments.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "node-based graph ready"
    );

    let index = RestrictionIndex::build(&build.graph, &resolved.restrictions, barriers);
    let analysis = IntersectionAnalysis::new(&build.graph, &index, profile);
    let eeg = ebg::build_eeg(&build.graph, &index, &analysis, config.small_component_size);

    let store = EegNodeStore::from_build(&eeg);

    // Spatial leaves in curve order, blocks derived from them
    let mut leaves = eeg.leaves.clone();
    SpatialIndex::curve_order(&mut leaves);
    let spatial = SpatialIndex::from_store(LeafStore::Ram(leaves.clone()));
    let blocks: Vec<_> = spatial.blocks().copied().collect();

    let base = &config.base;
    formats::ebg::write(&artifact_path(base, suffix::EBG), &eeg.edges)?;
    formats::ebg_nodes::write(&artifact_path(base, suffix::EBG_NODES), &eeg.nodes)?;
    formats::geometry::write(&artifact_path(base, suffix::GEOMETRY), &eeg.geometry)?;
    formats::enw::write(
        &artifact_path(base, suffix::ENW),
        &store.weights,
        &store.durations,
    )?;
    formats::rtree::write_ram(&artifact_path(base, suffix::RAM_INDEX), &blocks)?;
    formats::rtree::write_file(&artifact_path(base, suffix::FILE_INDEX), &leaves)?;
    formats::restrictions::write(&artifact_path(base, suffix::RESTRICTIONS), &index)?;
    formats::names::write(&artifact_path(base, suffix::NAMES), &build.graph.names)?;
    formats::properties::write(
        &artifact_path(base, suffix::PROPERTIES),
        &profile.properties(),
    )?;

    let stamp = format!(
        "{} profile={} nodes={} edges={}",
        chrono::Utc::now().to_rfc3339(),
        profile.name(),
        eeg.nodes.len(),
        eeg.edges.len(),
    );
    formats::timestamp::write(&artifact_path(base, suffix::TIMESTAMP), &stamp)?;

    let summary = ExtractSummary {
        nodes: build.graph.node_count(),
        segments: build.graph.segments.len(),
        eeg_nodes: eeg.nodes.len(),
        eeg_edges: eeg.edges.len(),
        dropped_restrictions: resolved.dropped + index.dropped,
    };
    info!(
        eeg_nodes = summary.eeg_nodes,
        eeg_edges = summary.eeg_edges,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "extraction complete"
    );
    Ok(summary)
}
