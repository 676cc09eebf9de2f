//! Error types emitted by the parklands CLI.
//!
//! Keep this enum small; only failures that abort the run belong here.
//! Per-country fetch failures are recovered inside the retrieval stage.

use std::sync::Arc;

use camino::Utf8PathBuf;
use parklands_data::{BoundaryError, ClientBuildError, GeoPackageError};
use thiserror::Error;

/// Errors emitted by the parklands CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// The worker pool size was not a positive integer.
    #[error("worker pool size must be a positive integer")]
    InvalidWorkerCount,
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDirectory {
        /// Requested output directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Loading the country boundary archive failed.
    #[error("failed to load country boundaries: {0}")]
    Boundaries(#[from] BoundaryError),
    /// The feature source client could not be constructed.
    #[error("failed to build feature source: {0}")]
    BuildFeatureSource(#[from] ClientBuildError),
    /// Writing the output container failed.
    #[error("failed to write output container: {0}")]
    Write(#[from] GeoPackageError),
}
