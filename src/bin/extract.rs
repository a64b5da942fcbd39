//! waymark-extract: OSM PBF + profile -> edge-expanded graph artifacts

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use osmpbf::{Element, ElementReader, RelMemberType};
use tracing::{error, info};

use waymark::coord::Coordinate;
use waymark::extractor::{extract, ExtractConfig};
use waymark::osm::{
    ExtractionInput, RawNode, RawRestriction, RawWay, RestrictionVia, Tags,
};
use waymark::profile::{CarProfile, Profile};
use waymark::ExtractError;

#[derive(Parser)]
#[command(name = "waymark-extract")]
#[command(about = "Build edge-expanded routing artifacts from an OSM extract")]
struct Cli {
    /// Input .osm.pbf file
    input: PathBuf,

    /// Routing profile
    #[arg(long, default_value = "car")]
    profile: String,

    /// Worker threads (default: all physical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Components smaller than this are demoted for snapping
    #[arg(long, default_value_t = 1000)]
    small_component_size: u32,

    /// Artifact base path (default: input path without extensions)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            error!("thread pool: {e}");
            return ExitCode::from(1);
        }
    }

    let profile: Box<dyn Profile> = match cli.profile.as_str() {
        "car" => Box::new(CarProfile::new()),
        "car-lht" => Box::new(CarProfile::left_hand_driving()),
        other => {
            error!("unknown profile `{other}`");
            return ExitCode::from(1);
        }
    };

    let base = cli.output.clone().unwrap_or_else(|| strip_osm_suffix(&cli.input));

    let input = match read_pbf(&cli.input, profile.as_ref()) {
        Ok(input) => input,
        Err(e) => {
            error!("failed to parse {}: {e}", cli.input.display());
            return ExitCode::from(1);
        }
    };

    let config = ExtractConfig {
        base,
        small_component_size: cli.small_component_size,
    };
    match extract(&input, profile.as_ref(), &config) {
        Ok(summary) => {
            info!(
                nodes = summary.nodes,
                segments = summary.segments,
                eeg_nodes = summary.eeg_nodes,
                eeg_edges = summary.eeg_edges,
                dropped_restrictions = summary.dropped_restrictions,
                "artifacts written to {}.wm.*",
                config.base.display()
            );
            ExitCode::SUCCESS
        }
        Err(e @ (ExtractError::Io(_) | ExtractError::Artifact(_))) => {
            error!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(1)
        }
    }
}

fn strip_osm_suffix(path: &PathBuf) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let trimmed = name
        .trim_end_matches(".pbf")
        .trim_end_matches(".osm")
        .to_owned();
    path.with_file_name(trimmed)
}

/// Stream the PBF into the extraction input model, applying the profile to
/// every way as it passes.
fn read_pbf(path: &PathBuf, profile: &dyn Profile) -> Result<ExtractionInput, osmpbf::Error> {
    let reader = ElementReader::from_path(path)?;
    let mut input = ExtractionInput::new();

    reader.for_each(|element| match element {
        Element::Node(node) => {
            let tags: Tags = node
                .tags()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            input.nodes.push(raw_node(
                node.id(),
                Coordinate::from_degrees(node.lon(), node.lat()),
                tags,
            ));
        }
        Element::DenseNode(node) => {
            let tags: Tags = node
                .tags()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            input.nodes.push(raw_node(
                node.id(),
                Coordinate::from_degrees(node.lon(), node.lat()),
                tags,
            ));
        }
        Element::Way(way) => {
            let tags: Tags = way
                .tags()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            if let Some(assessed) = profile.assess_way(&tags) {
                input.ways.push(RawWay {
                    id: way.id(),
                    nodes: way.refs().collect(),
                    way: assessed,
                });
            }
        }
        Element::Relation(relation) => {
            let tags: Vec<(String, String)> = relation
                .tags()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            let is_restriction = tags
                .iter()
                .any(|(k, v)| k == "type" && v == "restriction");
            if !is_restriction {
                return;
            }
            let Some(kind) = tags
                .iter()
                .find(|(k, _)| k == "restriction" || k == "restriction:motorcar")
                .and_then(|(_, v)| RawRestriction::kind_from_tag(v))
            else {
                return;
            };

            let mut from_way = None;
            let mut to_way = None;
            let mut via_node = None;
            let mut via_ways = Vec::new();
            for member in relation.members() {
                let role = member.role().unwrap_or_default();
                match (member.member_type, role) {
                    (RelMemberType::Way, "from") => from_way = Some(member.member_id),
                    (RelMemberType::Way, "to") => to_way = Some(member.member_id),
                    (RelMemberType::Node, "via") => via_node = Some(member.member_id),
                    (RelMemberType::Way, "via") => via_ways.push(member.member_id),
                    _ => {}
                }
            }
            let (Some(from_way), Some(to_way)) = (from_way, to_way) else {
                return;
            };
            let via = match (via_node, via_ways.is_empty()) {
                (Some(node), true) => RestrictionVia::Node(node),
                (None, false) => RestrictionVia::Ways(via_ways),
                _ => return,
            };
            input.restrictions.push(RawRestriction {
                kind,
                from_way,
                via,
                to_way,
            });
        }
    })?;

    Ok(input)
}

fn raw_node(id: i64, coord: Coordinate, tags: Tags) -> RawNode {
    let barrier = tags.get("barrier").map(str::to_owned);
    let traffic_signal = tags.get("highway") == Some("traffic_signals");
    RawNode {
        id,
        coord,
        barrier,
        tags,
        traffic_signal,
    }
}
