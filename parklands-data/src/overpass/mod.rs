//! Feature retrieval from an Overpass API endpoint.
//!
//! The public trait is synchronous so the retrieval pool can issue one
//! blocking fetch per worker thread; the HTTP implementation bridges to an
//! async `reqwest` client by blocking on an internally owned Tokio runtime.

mod query;
mod response;

pub use query::build_query;
pub use response::{LonLat, OverpassElement, OverpassMember, OverpassResponse};

use std::time::Duration;

use parklands_core::{CountryBoundary, FeatureRecord, TagFilter};
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Default public Overpass API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Default user agent for feature queries.
pub const DEFAULT_USER_AGENT: &str = "parklands-etl/0.1";

/// Default per-query timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Default vertex budget for boundary rings in the spatial filter.
const DEFAULT_MAX_RING_VERTICES: usize = 1024;

/// A source of labelled feature records for one country boundary.
///
/// Implementations must tag every returned record with the boundary's
/// country name before returning, and must treat an empty result as a
/// successful outcome. The trait is `Sync` because the retrieval pool
/// shares one source across its worker threads.
pub trait FeatureSource: Sync {
    /// Fetch all features matching `filter` within `boundary`.
    ///
    /// # Errors
    ///
    /// Any transport, service or decoding failure for this one boundary;
    /// the caller recovers per country and continues.
    fn fetch(
        &self,
        boundary: &CountryBoundary,
        filter: &TagFilter,
    ) -> Result<Vec<FeatureRecord>, FetchError>;
}

/// Errors raised by a single per-country fetch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The boundary carried no usable query region.
    #[error("boundary has no usable geometry")]
    MissingGeometry,
    /// The service answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The query ran past the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The request failed at the transport level.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The response payload was not decodable.
    #[error("failed to decode feature payload: {source}")]
    Decode {
        /// JSON decoding error.
        #[source]
        source: simd_json::Error,
    },
}

/// Errors raised while constructing an [`OverpassClient`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {source}")]
    HttpClient {
        /// Builder error reported by `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// The bridge runtime could not be built.
    #[error("failed to build async runtime: {source}")]
    Runtime {
        /// Runtime build error.
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for [`OverpassClient`].
///
/// The original deployment tuned query limits through process-wide state;
/// here every limit is an explicit value threaded in at construction.
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    /// Overpass interpreter endpoint.
    pub endpoint: String,
    /// Per-query timeout, applied to the HTTP call and the server-side
    /// `[timeout:N]` directive.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Vertex budget for boundary rings in the spatial filter.
    pub max_ring_vertices: usize,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_ring_vertices: DEFAULT_MAX_RING_VERTICES,
        }
    }
}

impl OverpassConfig {
    /// Create a configuration targeting `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the per-query timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the ring vertex budget for spatial filters.
    #[must_use]
    pub const fn with_max_ring_vertices(mut self, max_ring_vertices: usize) -> Self {
        self.max_ring_vertices = max_ring_vertices;
        self
    }
}

/// Overpass-backed [`FeatureSource`].
///
/// # Runtime behaviour
///
/// `fetch` blocks on async HTTP calls. When invoked from inside an existing
/// multi-threaded Tokio runtime it uses that runtime's handle via
/// [`tokio::task::block_in_place`]; otherwise it blocks on its own stored
/// runtime. The stored runtime uses the multi-threaded scheduler because
/// the retrieval pool calls `fetch` concurrently from several OS threads.
pub struct OverpassClient {
    client: Client,
    config: OverpassConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for OverpassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassClient")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl OverpassClient {
    /// Create a client against the default public endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client or the bridge runtime cannot be built.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_config(OverpassConfig::default())
    }

    /// Create a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client or the bridge runtime cannot be built.
    pub fn with_config(config: OverpassConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|source| ClientBuildError::HttpClient { source })?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|source| ClientBuildError::Runtime { source })?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    async fn fetch_async(&self, query: String) -> Result<Vec<u8>, FetchError> {
        let url = self.config.endpoint.as_str();
        let response = self
            .client
            .post(url)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        Ok(bytes.to_vec())
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        if let Some(status) = error.status() {
            return FetchError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        FetchError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

impl FeatureSource for OverpassClient {
    fn fetch(
        &self,
        boundary: &CountryBoundary,
        filter: &TagFilter,
    ) -> Result<Vec<FeatureRecord>, FetchError> {
        let Some(region) = boundary.geometry.as_ref() else {
            return Err(FetchError::MissingGeometry);
        };
        let query = build_query(
            region,
            filter,
            self.config.timeout.as_secs(),
            self.config.max_ring_vertices,
        );

        let future = self.fetch_async(query);
        let mut body = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }?;

        let payload: OverpassResponse =
            simd_json::from_slice(&mut body).map_err(|source| FetchError::Decode { source })?;
        Ok(payload.into_features(&boundary.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn config_builder_pattern() {
        let config = OverpassConfig::new("http://overpass.test/api/interpreter")
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("test-agent/1.0")
            .with_max_ring_vertices(128);
        assert_eq!(config.endpoint, "http://overpass.test/api/interpreter");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "test-agent/1.0");
        assert_eq!(config.max_ring_vertices, 128);
    }

    #[rstest]
    fn fetch_rejects_boundaries_without_geometry() {
        let client = OverpassClient::new().expect("client should build");
        let boundary = CountryBoundary::new("Atlantis", None);
        let error = client
            .fetch(&boundary, &TagFilter::national_parks())
            .expect_err("must reject missing geometry");
        assert!(matches!(error, FetchError::MissingGeometry));
    }
}
