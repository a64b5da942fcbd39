//! Library error types
//!
//! Preprocessing fails fast with typed errors; the query path reports
//! per-query statuses (`NoRoute`, `NoSegment`, `NoMatch`) as values instead.

use std::path::PathBuf;

use crate::EegNodeId;

/// Errors raised while reading or writing on-disk artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a waymark artifact (bad fingerprint)", path.display())]
    Fingerprint { path: PathBuf },

    #[error(
        "{} was written by schema version {found}, this build expects {expected}; \
         regenerate: {}", path.display(), regenerate.join(", ")
    )]
    VersionMismatch {
        path: PathBuf,
        found: u16,
        expected: u16,
        regenerate: Vec<String>,
    },

    #[error("{} has the wrong format tag (found {found:#010x})", path.display())]
    FormatTag { path: PathBuf, found: u32 },

    #[error("{} is truncated or corrupt: {detail}", path.display())]
    Corrupt { path: PathBuf, detail: String },
}

/// Errors raised by the extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("input error: {0}")]
    Input(String),

    #[error("profile `{profile}` rejected the entire input (no routable ways)")]
    EmptyNetwork { profile: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the contractor.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error(
        "shortcut weight overflow at node {node}; the profile assigns weights too close \
         to the integer bound"
    )]
    WeightOverflow { node: EegNodeId },

    #[error("core factor {0} outside (0, 1]")]
    BadCoreFactor(f64),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
