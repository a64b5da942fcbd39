//! waymark-query: load a dataset and answer queries from the command line

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use waymark::coord::Coordinate;
use waymark::matching::{MatchConfig, Matcher};
use waymark::query::{alternatives::alternative_routes, matrix::many_to_many, Route};
use waymark::spatial::PhantomNode;
use waymark::trip::round_trip;
use waymark::{Dataset, Weight, INVALID_WEIGHT};

#[derive(Parser)]
#[command(name = "waymark-query")]
#[command(about = "Answer routing queries over prepared artifacts")]
struct Cli {
    /// Artifact base path
    base: PathBuf,

    /// Memory-map the spatial leaf file instead of loading it
    #[arg(long)]
    shared_memory: bool,

    /// Largest trace accepted by `match`
    #[arg(long, default_value_t = 5000)]
    max_matching_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shortest route between two coordinates
    Route {
        /// lon,lat
        #[arg(long)]
        from: String,
        /// lon,lat
        #[arg(long)]
        to: String,
        /// Also return alternative routes
        #[arg(long)]
        alternatives: bool,
    },
    /// Many-to-many duration matrix
    Table {
        /// Semicolon-separated lon,lat list
        #[arg(long)]
        coords: String,
    },
    /// Snap a coordinate to the road network
    Nearest {
        /// lon,lat
        #[arg(long)]
        at: String,
        #[arg(short, default_value_t = 1)]
        k: usize,
    },
    /// Fit a GPS trace to the network
    Match {
        /// Semicolon-separated lon,lat list
        #[arg(long)]
        coords: String,
        /// Comma-separated UNIX seconds, parallel to coords
        #[arg(long)]
        timestamps: Option<String>,
        /// GPS precision in meters
        #[arg(long, default_value_t = 5.0)]
        sigma: f64,
    },
    /// Round trip through all coordinates
    Trip {
        /// Semicolon-separated lon,lat list
        #[arg(long)]
        coords: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok(Payload),
    NoSegment { coordinate: [f64; 2] },
    NoRoute,
    NoMatch,
    NoTrip,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload {
    Routes {
        routes: Vec<RouteBody>,
    },
    Table {
        durations_s: Vec<Vec<Option<f64>>>,
    },
    Nearest {
        candidates: Vec<NearestBody>,
    },
    Matchings {
        matchings: Vec<MatchingBody>,
    },
    Trip {
        order: Vec<usize>,
        legs: Vec<RouteBody>,
        duration_s: f64,
    },
}

#[derive(Serialize)]
struct RouteBody {
    duration_s: f64,
    distance_m: f64,
    polyline: Vec<[f64; 2]>,
}

#[derive(Serialize)]
struct NearestBody {
    location: [f64; 2],
    distance_m: f64,
    segment: u32,
}

#[derive(Serialize)]
struct MatchingBody {
    indices: Vec<usize>,
    confidence: f64,
    length_m: f64,
    polyline: Vec<[f64; 2]>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let dataset = match Dataset::load(&cli.base, cli.shared_memory) {
        Ok(d) => d,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    info!(timestamp = %dataset.timestamp, "serving dataset");

    let response = run(&cli, &dataset);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("serialization: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, dataset: &Dataset) -> Response {
    let engine = dataset.engine();
    let mut scratch = dataset.scratch();

    match &cli.command {
        Command::Route {
            from,
            to,
            alternatives,
        } => {
            let (Some(from), Some(to)) = (parse_coord(from), parse_coord(to)) else {
                return Response::NoSegment {
                    coordinate: [0.0, 0.0],
                };
            };
            let Some(source) = snap(dataset, from) else {
                return Response::NoSegment {
                    coordinate: [from.lon_deg(), from.lat_deg()],
                };
            };
            let Some(target) = snap(dataset, to) else {
                return Response::NoSegment {
                    coordinate: [to.lon_deg(), to.lat_deg()],
                };
            };

            let routes: Vec<Route> = if *alternatives {
                alternative_routes(
                    &engine,
                    &source,
                    &target,
                    &mut scratch,
                    dataset.properties.alternative_count as usize,
                )
            } else {
                engine
                    .route(&source, &target, &mut scratch)
                    .into_iter()
                    .collect()
            };
            if routes.is_empty() {
                return Response::NoRoute;
            }
            Response::Ok(Payload::Routes {
                routes: routes.iter().map(route_body).collect(),
            })
        }

        Command::Table { coords } => {
            let Some(coords) = parse_coords(coords) else {
                return Response::NoSegment {
                    coordinate: [0.0, 0.0],
                };
            };
            let mut phantoms = Vec::with_capacity(coords.len());
            for c in &coords {
                match snap(dataset, *c) {
                    Some(p) => phantoms.push(p),
                    None => {
                        return Response::NoSegment {
                            coordinate: [c.lon_deg(), c.lat_deg()],
                        }
                    }
                }
            }
            let flat = many_to_many(&engine, &phantoms, &phantoms, &mut scratch);
            let n = phantoms.len();
            let durations_s = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| weight_to_seconds(flat[i * n + j]))
                        .collect()
                })
                .collect();
            Response::Ok(Payload::Table { durations_s })
        }

        Command::Nearest { at, k } => {
            let Some(at) = parse_coord(at) else {
                return Response::NoSegment {
                    coordinate: [0.0, 0.0],
                };
            };
            if !at.is_valid() {
                return Response::NoSegment {
                    coordinate: [at.lon_deg(), at.lat_deg()],
                };
            }
            let found = dataset
                .spatial
                .nearest(at, *k, &dataset.geometry, &dataset.nodes);
            if found.is_empty() {
                return Response::NoSegment {
                    coordinate: [at.lon_deg(), at.lat_deg()],
                };
            }
            Response::Ok(Payload::Nearest {
                candidates: found
                    .iter()
                    .map(|c| NearestBody {
                        location: [c.phantom.snapped.lon_deg(), c.phantom.snapped.lat_deg()],
                        distance_m: c.distance_m,
                        segment: c.phantom.segment,
                    })
                    .collect(),
            })
        }

        Command::Match {
            coords,
            timestamps,
            sigma,
        } => {
            let Some(coords) = parse_coords(coords) else {
                return Response::NoSegment {
                    coordinate: [0.0, 0.0],
                };
            };
            if coords.len() > cli.max_matching_size {
                error!(
                    size = coords.len(),
                    limit = cli.max_matching_size,
                    "trace exceeds --max-matching-size"
                );
                return Response::NoMatch;
            }
            let timestamps: Option<Vec<u32>> = timestamps.as_ref().map(|t| {
                t.split(',')
                    .filter_map(|v| v.trim().parse().ok())
                    .collect()
            });

            let config = MatchConfig {
                gps_sigma_m: *sigma,
                ..MatchConfig::default()
            };
            let matcher = Matcher::new(&engine, &dataset.spatial, config);
            let matchings =
                matcher.match_trace(&coords, timestamps.as_deref(), &mut scratch);
            if matchings.is_empty() {
                return Response::NoMatch;
            }
            Response::Ok(Payload::Matchings {
                matchings: matchings
                    .iter()
                    .map(|m| MatchingBody {
                        indices: m.indices.clone(),
                        confidence: m.confidence,
                        length_m: m.length_m,
                        polyline: m
                            .phantoms
                            .iter()
                            .map(|p| [p.snapped.lon_deg(), p.snapped.lat_deg()])
                            .collect(),
                    })
                    .collect(),
            })
        }

        Command::Trip { coords } => {
            let Some(coords) = parse_coords(coords) else {
                return Response::NoSegment {
                    coordinate: [0.0, 0.0],
                };
            };
            let mut phantoms = Vec::with_capacity(coords.len());
            for c in &coords {
                match snap(dataset, *c) {
                    Some(p) => phantoms.push(p),
                    None => {
                        return Response::NoSegment {
                            coordinate: [c.lon_deg(), c.lat_deg()],
                        }
                    }
                }
            }
            match round_trip(&engine, &phantoms, &mut scratch) {
                Some(trip) => Response::Ok(Payload::Trip {
                    order: trip.order,
                    duration_s: trip.duration as f64 / 10.0,
                    legs: trip.legs.iter().map(route_body).collect(),
                }),
                None => Response::NoTrip,
            }
        }
    }
}

fn snap(dataset: &Dataset, coord: Coordinate) -> Option<PhantomNode> {
    if !coord.is_valid() {
        return None;
    }
    dataset
        .spatial
        .nearest(coord, 1, &dataset.geometry, &dataset.nodes)
        .into_iter()
        .next()
        .map(|c| c.phantom)
}

fn route_body(route: &Route) -> RouteBody {
    RouteBody {
        duration_s: route.duration as f64 / 10.0,
        distance_m: route.distance_m,
        polyline: route
            .geometry
            .iter()
            .map(|c| [c.lon_deg(), c.lat_deg()])
            .collect(),
    }
}

fn weight_to_seconds(w: Weight) -> Option<f64> {
    (w != INVALID_WEIGHT).then(|| w as f64 / 10.0)
}

fn parse_coord(s: &str) -> Option<Coordinate> {
    let (lon, lat) = s.split_once(',')?;
    Some(Coordinate::from_degrees(
        lon.trim().parse().ok()?,
        lat.trim().parse().ok()?,
    ))
}

fn parse_coords(s: &str) -> Option<Vec<Coordinate>> {
    let coords: Option<Vec<Coordinate>> = s.split(';').map(parse_coord).collect();
    coords.filter(|c| !c.is_empty())
}
