//! Core domain types for the parklands extraction pipeline.
//!
//! Responsibilities:
//! - Model country boundaries, raw feature records and normalised records.
//! - Provide the pure pipeline stages: geometry repair, schema
//!   normalisation and geometry-kind partitioning.
//!
//! Boundaries:
//! - No I/O, no HTTP and no persistence here (live in `parklands-data`).
//! - Coordinates are WGS84 throughout, `x = longitude` and `y = latitude`.

#![forbid(unsafe_code)]

pub mod boundary;
pub mod filter;
pub mod layers;
pub mod record;
pub mod repair;
pub mod schema;

pub use boundary::CountryBoundary;
pub use filter::{TagFilter, TagSelector};
pub use layers::{CollectionPolicy, LayerKind, LayerSet, partition_features, promote_geometry};
pub use record::{Attributes, FeatureRecord, NormalisedFeature};
pub use repair::repair_geometry;
pub use schema::{ColumnResolver, NormaliseError, canonicalise_key, normalise_features};
