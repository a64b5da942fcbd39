//! Query-time dataset
//!
//! Loads every artifact a server worker needs, read-only. The leaf file may
//! stay memory-mapped behind a scoped handle that unmaps on drop. A version
//! mismatch reports every stale suffix at once so operators regenerate them
//! in one pass.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::ebg::{EegNodeStore, GeometryTable};
use crate::error::ArtifactError;
use crate::formats::{self, artifact_path, suffix};
use crate::nbg::NameTable;
use crate::profile::ProfileProperties;
use crate::query::{QueryGraph, QueryScratch, RoutingEngine};
use crate::spatial::SpatialIndex;

pub struct Dataset {
    pub base: PathBuf,
    pub graph: QueryGraph,
    pub nodes: EegNodeStore,
    pub geometry: GeometryTable,
    pub names: NameTable,
    pub properties: ProfileProperties,
    pub spatial: SpatialIndex,
    pub timestamp: String,
}

impl Dataset {
    /// Load all artifacts under `base`. With `shared_memory`, the spatial
    /// leaf file is memory-mapped instead of read into RAM.
    pub fn load(base: &Path, shared_memory: bool) -> Result<Self, ArtifactError> {
        let mut stale: Vec<String> = Vec::new();
        let mut version_witness: Option<(PathBuf, u16, u16)> = None;

        macro_rules! load {
            ($sfx:expr, $load:expr) => {
                match $load {
                    Ok(v) => Some(v),
                    Err(ArtifactError::VersionMismatch {
                        path,
                        found,
                        expected,
                        ..
                    }) => {
                        stale.push($sfx.to_owned());
                        version_witness = Some((path, found, expected));
                        None
                    }
                    Err(other) => return Err(other),
                }
            };
        }

        let graph = load!(
            suffix::HSGR,
            formats::hsgr::read(&artifact_path(base, suffix::HSGR)).map(QueryGraph::from_hsgr)
        );
        let node_table = load!(
            suffix::EBG_NODES,
            formats::ebg_nodes::read(&artifact_path(base, suffix::EBG_NODES))
        );
        let node_costs = load!(
            suffix::ENW,
            formats::enw::read(&artifact_path(base, suffix::ENW))
        );
        let geometry = load!(
            suffix::GEOMETRY,
            formats::geometry::read(&artifact_path(base, suffix::GEOMETRY))
        );
        let names = load!(
            suffix::NAMES,
            formats::names::read(&artifact_path(base, suffix::NAMES))
        );
        let properties = load!(
            suffix::PROPERTIES,
            formats::properties::read(&artifact_path(base, suffix::PROPERTIES))
        );
        let blocks = load!(
            suffix::RAM_INDEX,
            formats::rtree::read_ram(&artifact_path(base, suffix::RAM_INDEX))
        );
        let leaves = load!(
            suffix::FILE_INDEX,
            formats::rtree::read_file(&artifact_path(base, suffix::FILE_INDEX), shared_memory)
        );
        let timestamp = load!(
            suffix::TIMESTAMP,
            formats::timestamp::read(&artifact_path(base, suffix::TIMESTAMP))
        );

        if let Some((path, found, expected)) = version_witness {
            stale.sort();
            stale.dedup();
            return Err(ArtifactError::VersionMismatch {
                path,
                found,
                expected,
                regenerate: stale,
            });
        }

        // All loads succeeded past the macro
        let graph = graph.expect("checked");
        let (segments, forward) = node_table.expect("checked");
        let (weights, durations) = node_costs.expect("checked");
        let geometry = geometry.expect("checked");
        let names = names.expect("checked");
        let properties = properties.expect("checked");
        let blocks = blocks.expect("checked");
        let leaves = leaves.expect("checked");
        let timestamp = timestamp.expect("checked");

        // The hierarchy embeds the identity of the edge file it was built
        // from; a stale or foreign hierarchy must not load.
        let (edge_checksum, _) = formats::ebg_checksum(&artifact_path(base, suffix::EBG))?;
        if graph.checksum != edge_checksum {
            return Err(ArtifactError::Corrupt {
                path: artifact_path(base, suffix::HSGR),
                detail: format!(
                    "hierarchy was built from a different extraction: embedded checksum \
                     {:08x}, edge file gives {edge_checksum:08x}",
                    graph.checksum
                ),
            });
        }

        if segments.len() != graph.node_count() || weights.len() != graph.node_count() {
            return Err(ArtifactError::Corrupt {
                path: artifact_path(base, suffix::HSGR),
                detail: format!(
                    "node tables disagree: hierarchy {} nodes, table {}, costs {}",
                    graph.node_count(),
                    segments.len(),
                    weights.len()
                ),
            });
        }

        let nodes = EegNodeStore {
            segments,
            forward,
            weights,
            durations,
        };
        let spatial = SpatialIndex::from_blocks(blocks, leaves);

        info!(
            base = %base.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            core = graph.core_size(),
            timestamp = %timestamp,
            "dataset loaded"
        );

        Ok(Self {
            base: base.to_owned(),
            graph,
            nodes,
            geometry,
            names,
            properties,
            spatial,
            timestamp,
        })
    }

    pub fn engine(&self) -> RoutingEngine<'_> {
        RoutingEngine::new(&self.graph, &self.nodes, &self.geometry)
    }

    /// Fresh per-worker search state sized for this dataset.
    pub fn scratch(&self) -> QueryScratch {
        QueryScratch::new(self.graph.node_count())
    }
}
