//! Extract command implementation for the parklands CLI.

use std::num::NonZeroUsize;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use parklands_core::{
    CollectionPolicy, NormaliseError, TagFilter, TagSelector, normalise_features,
    partition_features,
};
use parklands_data::{
    BoundaryLoader, BoundaryOptions, DEFAULT_BOUNDARIES_URL, DEFAULT_ENDPOINT,
    DEFAULT_MAX_WORKERS, EmptyLayerPolicy, OverpassClient, OverpassConfig, WriteOptions,
    retrieve_features, write_layers,
};
use serde::{Deserialize, Serialize};

use crate::CliError;

/// File name of the output container inside the output directory.
const OUTPUT_FILE_NAME: &str = "national_parks.gpkg";
const DEFAULT_OUTPUT_DIR: &str = "./data";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch protected-area features for every country in the \
                 boundary dataset and write them as points, lines and \
                 polygons layers of one GeoPackage. Options can come from \
                 CLI flags, configuration files, or environment variables.",
    about = "Extract protected areas for every country"
)]
#[ortho_config(prefix = "PARKLANDS")]
pub(crate) struct ExtractArgs {
    /// Directory receiving the output container.
    #[arg(long = "output-dir", value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Directory caching the boundary archive; defaults to the output dir.
    #[arg(long = "cache-dir", value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
    /// URL of the country boundary archive (GeoJSON).
    #[arg(long = "boundaries-url", value_name = "url")]
    #[serde(default)]
    pub(crate) boundaries_url: Option<String>,
    /// Overpass interpreter endpoint.
    #[arg(long = "overpass-url", value_name = "url")]
    #[serde(default)]
    pub(crate) overpass_url: Option<String>,
    /// Per-query timeout in seconds.
    #[arg(long = "timeout-secs", value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Worker pool size for per-country fetches.
    #[arg(long = "max-workers", value_name = "count")]
    #[serde(default)]
    pub(crate) max_workers: Option<usize>,
    /// Accepted `boundary` tag values (comma separated, `*` for any).
    #[arg(long = "boundary", value_name = "values", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) boundary: Option<Vec<String>>,
    /// Accepted `protect_class` tag values (comma separated, `*` for any).
    #[arg(long = "protect-class", value_name = "values", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) protect_class: Option<Vec<String>>,
    /// Accepted `designation` tag values (comma separated, `*` for any).
    #[arg(long = "designation", value_name = "values", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) designation: Option<Vec<String>>,
    /// Accepted `protected_area` tag values (comma separated, `*` for any).
    #[arg(long = "protected-area", value_name = "values", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) protected_area: Option<Vec<String>>,
    /// Omit layers with no records from the output container.
    #[arg(long = "skip-empty-layers")]
    #[serde(default)]
    pub(crate) skip_empty_layers: bool,
    /// Route geometry collection members as individual records.
    #[arg(long = "flatten-collections")]
    #[serde(default)]
    pub(crate) flatten_collections: bool,
}

impl ExtractArgs {
    fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExtractConfig {
    /// Directory receiving the output container.
    pub(crate) output_dir: Utf8PathBuf,
    /// Directory caching the boundary archive.
    pub(crate) cache_dir: Utf8PathBuf,
    /// URL of the country boundary archive.
    pub(crate) boundaries_url: String,
    /// Overpass interpreter endpoint.
    pub(crate) overpass_url: String,
    /// Per-query timeout.
    pub(crate) timeout: Duration,
    /// Worker pool size.
    pub(crate) max_workers: NonZeroUsize,
    /// Tag filter selecting the features to extract.
    pub(crate) filter: TagFilter,
    /// Geometry collection handling during partitioning.
    pub(crate) collections: CollectionPolicy,
    /// Empty layer handling during the write.
    pub(crate) empty_layers: EmptyLayerPolicy,
}

impl ExtractConfig {
    fn output_path(&self) -> Utf8PathBuf {
        self.output_dir.join(OUTPUT_FILE_NAME)
    }
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let output_dir = args
            .output_dir
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
        let cache_dir = args.cache_dir.unwrap_or_else(|| output_dir.clone());
        let max_workers = NonZeroUsize::new(args.max_workers.unwrap_or(DEFAULT_MAX_WORKERS))
            .ok_or(CliError::InvalidWorkerCount)?;

        let filter = TagFilter::new()
            .with("boundary", resolve_selector(args.boundary, "national_park"))
            .with("protect_class", resolve_selector(args.protect_class, "2"))
            .with(
                "designation",
                resolve_selector(args.designation, "national_park"),
            )
            .with(
                "protected_area",
                resolve_selector(args.protected_area, "national_park"),
            );

        Ok(Self {
            output_dir,
            cache_dir,
            boundaries_url: args
                .boundaries_url
                .unwrap_or_else(|| DEFAULT_BOUNDARIES_URL.to_owned()),
            overpass_url: args
                .overpass_url
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_workers,
            filter,
            collections: if args.flatten_collections {
                CollectionPolicy::Flatten
            } else {
                CollectionPolicy::Drop
            },
            empty_layers: if args.skip_empty_layers {
                EmptyLayerPolicy::SkipEmpty
            } else {
                EmptyLayerPolicy::WriteEmpty
            },
        })
    }
}

/// A literal `*` anywhere in the list means any value is acceptable.
fn resolve_selector(values: Option<Vec<String>>, default_value: &str) -> TagSelector {
    let values = values.unwrap_or_else(|| vec![default_value.to_owned()]);
    if values.iter().any(|value| value == "*") {
        TagSelector::Any
    } else {
        TagSelector::OneOf(values)
    }
}

pub(crate) fn run_extract(args: ExtractArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    std::fs::create_dir_all(config.output_dir.as_std_path()).map_err(|source| {
        CliError::OutputDirectory {
            path: config.output_dir.clone(),
            source,
        }
    })?;

    let loader = BoundaryLoader::new(
        BoundaryOptions::new(config.cache_dir.clone())
            .with_url(config.boundaries_url.clone())
            .with_timeout(config.timeout),
    )?;
    let boundaries = loader.load()?;
    info!("loaded {} country boundaries", boundaries.len());

    let client = OverpassClient::with_config(
        OverpassConfig::new(config.overpass_url.clone()).with_timeout(config.timeout),
    )?;
    let report = retrieve_features(&client, &boundaries, &config.filter, config.max_workers);
    if !report.failures.is_empty() {
        warn!(
            "{} countries failed; continuing with partial results",
            report.failures.len()
        );
    }

    let features = match normalise_features(report.features) {
        Ok(features) => features,
        Err(NormaliseError::NoData) => {
            info!("no features with usable geometry were retrieved; skipping output");
            return Ok(());
        }
    };
    let layers = partition_features(features, config.collections);
    let options = WriteOptions {
        empty_layers: config.empty_layers,
    };
    let summary = write_layers(&config.output_path(), &layers, &options)?;
    for (layer, count) in &summary.layers {
        info!("layer {layer}: {count} features");
    }
    info!("saved protected areas to {}", summary.path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> ExtractArgs {
        let mut argv = vec!["extract"];
        argv.extend_from_slice(args);
        ExtractArgs::try_parse_from(argv).expect("arguments parse")
    }

    #[rstest]
    fn defaults_reproduce_the_standard_run() {
        let config = ExtractConfig::try_from(ExtractArgs::default()).expect("valid defaults");
        assert_eq!(config.output_dir, Utf8PathBuf::from("./data"));
        assert_eq!(config.cache_dir, config.output_dir);
        assert_eq!(config.output_path().file_name(), Some(OUTPUT_FILE_NAME));
        assert_eq!(config.boundaries_url, DEFAULT_BOUNDARIES_URL);
        assert_eq!(config.overpass_url, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(180));
        assert_eq!(config.max_workers.get(), DEFAULT_MAX_WORKERS);
        assert_eq!(config.filter, TagFilter::national_parks());
        assert_eq!(config.collections, CollectionPolicy::Drop);
        assert_eq!(config.empty_layers, EmptyLayerPolicy::WriteEmpty);
    }

    #[rstest]
    fn zero_workers_are_rejected() {
        let args = ExtractArgs {
            max_workers: Some(0),
            ..ExtractArgs::default()
        };
        let error = ExtractConfig::try_from(args).expect_err("zero workers invalid");
        assert!(matches!(error, CliError::InvalidWorkerCount));
    }

    #[rstest]
    fn comma_separated_values_become_value_lists() {
        let args = parse(&["--protect-class", "1b,2"]);
        let config = ExtractConfig::try_from(args).expect("valid arguments");
        let clauses: Vec<_> = config.filter.iter().collect();
        assert_eq!(
            clauses.get(1),
            Some(&(
                "protect_class",
                &TagSelector::OneOf(vec!["1b".to_owned(), "2".to_owned()])
            ))
        );
    }

    #[rstest]
    fn wildcard_values_relax_a_clause_to_any() {
        let args = parse(&["--designation", "*"]);
        let config = ExtractConfig::try_from(args).expect("valid arguments");
        let clauses: Vec<_> = config.filter.iter().collect();
        assert_eq!(clauses.get(2), Some(&("designation", &TagSelector::Any)));
    }

    #[rstest]
    fn policy_flags_map_onto_the_pipeline_policies() {
        let args = parse(&["--skip-empty-layers", "--flatten-collections"]);
        let config = ExtractConfig::try_from(args).expect("valid arguments");
        assert_eq!(config.collections, CollectionPolicy::Flatten);
        assert_eq!(config.empty_layers, EmptyLayerPolicy::SkipEmpty);
    }

    #[rstest]
    fn cache_dir_can_diverge_from_the_output_dir() {
        let args = parse(&["--output-dir", "/tmp/out", "--cache-dir", "/tmp/cache"]);
        let config = ExtractConfig::try_from(args).expect("valid arguments");
        assert_eq!(config.output_dir, Utf8PathBuf::from("/tmp/out"));
        assert_eq!(config.cache_dir, Utf8PathBuf::from("/tmp/cache"));
    }
}
