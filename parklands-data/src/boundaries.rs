//! Country boundary retrieval: download-once caching and GeoJSON parsing.
//!
//! The boundary archive is fetched once and reused from the cache directory
//! on subsequent runs. Retrieval failures are fatal; geometry problems are
//! not. Invalid geometries are repaired, and a boundary whose geometry
//! cannot be repaired is kept with no query region so retrieval can skip it.

use std::io::BufReader;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, MultiPolygon};
use geojson::GeoJson;
use log::{info, warn};
use parklands_core::{CountryBoundary, repair_geometry};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use tokio::runtime::Runtime;
use url::Url;

use crate::paths::{ensure_parent_dir, file_is_file};

/// Natural Earth admin-0 country boundaries in GeoJSON form, WGS84.
pub const DEFAULT_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_10m_admin_0_countries.geojson";

/// Default user agent for boundary downloads.
pub const DEFAULT_USER_AGENT: &str = "parklands-etl/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Feature properties consulted for the country name, in preference order.
const NAME_PROPERTIES: [&str; 2] = ["NAME", "name"];

/// Configuration for [`BoundaryLoader`].
#[derive(Debug, Clone)]
pub struct BoundaryOptions {
    /// URL of the boundary archive.
    pub url: String,
    /// Directory holding the cached archive.
    pub cache_dir: Utf8PathBuf,
    /// Request timeout for the download.
    pub timeout: Duration,
    /// User agent sent with the download request.
    pub user_agent: String,
}

impl BoundaryOptions {
    /// Options caching into `cache_dir` with default archive and timeouts.
    #[must_use]
    pub fn new(cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            url: DEFAULT_BOUNDARIES_URL.to_owned(),
            cache_dir: cache_dir.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the archive URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Errors raised while retrieving or parsing the boundary archive.
///
/// All of these abort the run; there is no per-country recovery at this
/// stage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BoundaryError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    BuildClient {
        /// Builder error reported by `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// The async runtime backing the download could not be created.
    #[error("failed to build async runtime: {source}")]
    Runtime {
        /// Runtime build error.
        #[source]
        source: std::io::Error,
    },
    /// The archive endpoint answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The download failed at the transport level.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// Reading or writing the cached archive failed.
    #[error("failed to access cached archive at {path}: {source}")]
    Cache {
        /// Cache file location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The archive was not parseable GeoJSON.
    #[error("failed to parse boundary archive at {path}: {source}")]
    Parse {
        /// Cache file location.
        path: Utf8PathBuf,
        /// GeoJSON decoding error.
        #[source]
        source: geojson::Error,
    },
    /// The archive parsed, but was not a feature collection.
    #[error("boundary archive at {path} is not a GeoJSON feature collection")]
    NotACollection {
        /// Cache file location.
        path: Utf8PathBuf,
    },
}

/// Downloads, caches and parses the country boundary archive.
pub struct BoundaryLoader {
    client: Client,
    options: BoundaryOptions,
    runtime: Runtime,
}

impl std::fmt::Debug for BoundaryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryLoader")
            .field("client", &self.client)
            .field("options", &self.options)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl BoundaryLoader {
    /// Build a loader for `options`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client or the backing runtime cannot be built.
    pub fn new(options: BoundaryOptions) -> Result<Self, BoundaryError> {
        let client = Client::builder()
            .connect_timeout(options.timeout)
            .timeout(options.timeout)
            .build()
            .map_err(|source| BoundaryError::BuildClient { source })?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| BoundaryError::Runtime { source })?;
        Ok(Self {
            client,
            options,
            runtime,
        })
    }

    /// Location the archive is cached at, derived from the URL basename.
    #[must_use]
    pub fn cache_path(&self) -> Utf8PathBuf {
        let name = Url::parse(&self.options.url)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|segments| segments.last().map(ToOwned::to_owned))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "boundaries.geojson".to_owned());
        self.options.cache_dir.join(name)
    }

    /// Load all country boundaries, reusing a cached archive when present.
    ///
    /// Geometries are repaired on ingest; a boundary whose geometry is
    /// absent or unrepairable is returned with no query region and a
    /// warning, never dropped from the catalogue.
    ///
    /// # Errors
    ///
    /// Fatal on download, cache I/O or parse failures.
    pub fn load(&self) -> Result<Vec<CountryBoundary>, BoundaryError> {
        let path = self.ensure_cached()?;
        parse_boundaries(&path)
    }

    fn ensure_cached(&self) -> Result<Utf8PathBuf, BoundaryError> {
        let path = self.cache_path();
        match file_is_file(&path) {
            Ok(true) => {
                info!("reusing cached boundary archive at {path}");
                return Ok(path);
            }
            Ok(false) => {}
            Err(source) => return Err(BoundaryError::Cache { path, source }),
        }

        let body = self.runtime.block_on(self.download())?;
        ensure_parent_dir(&path).map_err(|source| BoundaryError::Cache {
            path: path.clone(),
            source,
        })?;
        std::fs::write(path.as_std_path(), &body).map_err(|source| BoundaryError::Cache {
            path: path.clone(),
            source,
        })?;
        info!("downloaded boundary archive to {path} ({} bytes)", body.len());
        Ok(path)
    }

    async fn download(&self) -> Result<Vec<u8>, BoundaryError> {
        let url = self.options.url.as_str();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.options.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err, url))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(&err, url))?;
        Ok(bytes.to_vec())
    }
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str) -> BoundaryError {
    if let Some(status) = error.status() {
        return BoundaryError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }
    BoundaryError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}

fn parse_boundaries(path: &Utf8Path) -> Result<Vec<CountryBoundary>, BoundaryError> {
    let file = std::fs::File::open(path.as_std_path()).map_err(|source| BoundaryError::Cache {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson =
        GeoJson::from_reader(BufReader::new(file)).map_err(|source| BoundaryError::Parse {
            path: path.to_path_buf(),
            source: geojson::Error::MalformedJson(source),
        })?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(BoundaryError::NotACollection {
            path: path.to_path_buf(),
        });
    };

    let mut boundaries = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(name) = feature_name(&feature) else {
            warn!("skipping boundary feature without a country name");
            continue;
        };
        let geometry = feature
            .geometry
            .and_then(|geometry| Geometry::<f64>::try_from(geometry.value).ok())
            .and_then(repair_geometry)
            .and_then(areal_geometry);
        if geometry.is_none() {
            warn!("boundary for {name} has no usable polygon geometry");
        }
        boundaries.push(CountryBoundary::new(name, geometry));
    }
    Ok(boundaries)
}

fn feature_name(feature: &geojson::Feature) -> Option<String> {
    let properties = feature.properties.as_ref()?;
    NAME_PROPERTIES.iter().find_map(|key| {
        match properties.get(*key) {
            Some(serde_json::Value::String(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        }
    })
}

/// Query regions are areal; anything else leaves the boundary unusable.
fn areal_geometry(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(polygons) => Some(polygons),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const ARCHIVE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME": "Polandia", "POP_EST": 42},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Linelandia"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0.0, 0.0], [1.0, 1.0]]
                }
            },
            {
                "type": "Feature",
                "properties": {"POP_EST": 7},
                "geometry": null
            }
        ]
    }"#;

    #[fixture]
    fn cache_dir() -> TempDir {
        TempDir::new().expect("create temp directory")
    }

    fn loader_for(cache_dir: &TempDir, archive: &str) -> BoundaryLoader {
        let dir = Utf8PathBuf::from_path_buf(cache_dir.path().to_path_buf())
            .expect("temp paths are UTF-8");
        let options =
            BoundaryOptions::new(dir.clone()).with_url("http://boundaries.test/countries.geojson");
        std::fs::write(dir.join("countries.geojson").as_std_path(), archive)
            .expect("prefill cache");
        BoundaryLoader::new(options).expect("build loader")
    }

    #[rstest]
    fn cache_path_uses_the_url_basename(cache_dir: TempDir) {
        let loader = loader_for(&cache_dir, ARCHIVE);
        assert_eq!(
            loader.cache_path().file_name(),
            Some("countries.geojson")
        );
    }

    #[rstest]
    fn load_reuses_the_cached_archive_without_a_server(cache_dir: TempDir) {
        // The URL points at an unreachable host; success proves the cache
        // short-circuits the download.
        let loader = loader_for(&cache_dir, ARCHIVE);
        let boundaries = loader.load().expect("load from cache");
        assert_eq!(boundaries.len(), 2);
    }

    #[rstest]
    fn names_fall_back_to_lowercase_property(cache_dir: TempDir) {
        let loader = loader_for(&cache_dir, ARCHIVE);
        let boundaries = loader.load().expect("load from cache");
        let names: Vec<&str> = boundaries
            .iter()
            .map(|boundary| boundary.name.as_str())
            .collect();
        assert_eq!(names, vec!["Polandia", "Linelandia"]);
    }

    #[rstest]
    fn non_areal_geometry_leaves_the_boundary_without_a_region(cache_dir: TempDir) {
        let loader = loader_for(&cache_dir, ARCHIVE);
        let boundaries = loader.load().expect("load from cache");
        assert!(boundaries[0].has_geometry());
        assert!(!boundaries[1].has_geometry());
    }

    #[rstest]
    fn unparseable_archives_are_fatal(cache_dir: TempDir) {
        let loader = loader_for(&cache_dir, "not geojson at all");
        let error = loader.load().expect_err("parse must fail");
        assert!(matches!(error, BoundaryError::Parse { .. }));
    }

    #[rstest]
    fn non_collection_archives_are_fatal(cache_dir: TempDir) {
        let loader = loader_for(
            &cache_dir,
            r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#,
        );
        let error = loader.load().expect_err("must reject non-collections");
        assert!(matches!(error, BoundaryError::NotACollection { .. }));
    }
}
