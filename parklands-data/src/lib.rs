//! Data access and orchestration for the parklands extraction pipeline.
//!
//! Responsibilities:
//! - Retrieve and cache the country boundary archive.
//! - Query the external feature service per country over a bounded worker
//!   pool, isolating per-country failures.
//! - Persist the partitioned layers into a GeoPackage container.
//!
//! Boundaries:
//! - Domain rules and the pure pipeline stages live in `parklands-core`.
//! - Keep blocking I/O off async executors; the synchronous seams own
//!   their bridge runtimes.

#![forbid(unsafe_code)]

pub mod boundaries;
pub mod gpkg;
pub mod overpass;
pub mod paths;
pub mod retrieve;

pub use boundaries::{BoundaryError, BoundaryLoader, BoundaryOptions, DEFAULT_BOUNDARIES_URL};
pub use gpkg::{
    EmptyLayerPolicy, GeoPackageError, UnsupportedGeometry, WriteOptions, WriteSummary,
    write_layers,
};
pub use overpass::{
    ClientBuildError, DEFAULT_ENDPOINT, FeatureSource, FetchError, OverpassClient, OverpassConfig,
};
pub use retrieve::{DEFAULT_MAX_WORKERS, FetchFailure, FetchReport, retrieve_features};
