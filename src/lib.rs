//! Facade crate for the parklands extraction pipeline.
//!
//! This crate re-exports the core domain types together with the data-access
//! collaborators so applications can depend on a single crate.

#![forbid(unsafe_code)]

pub use parklands_core::{
    Attributes, CollectionPolicy, CountryBoundary, FeatureRecord, LayerKind, LayerSet,
    NormaliseError, NormalisedFeature, TagFilter, TagSelector, canonicalise_key,
    normalise_features, partition_features, promote_geometry, repair_geometry,
};

pub use parklands_data::{
    BoundaryError, BoundaryLoader, BoundaryOptions, EmptyLayerPolicy, FeatureSource, FetchError,
    FetchFailure, FetchReport, GeoPackageError, OverpassClient, OverpassConfig, WriteOptions,
    WriteSummary, retrieve_features, write_layers,
};
