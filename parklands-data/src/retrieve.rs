//! Parallel per-country feature retrieval with failure isolation.
//!
//! One fetch task is scheduled per boundary onto a fixed-size pool of OS
//! threads. Completions are consumed in arrival order through a channel
//! whose single receiver performs every append, so the shared collector
//! needs no further synchronisation. A failing country is reported and
//! skipped; it never aborts or blocks the retrieval of any other country.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};
use parklands_core::{CountryBoundary, FeatureRecord, TagFilter};
use thiserror::Error;

use crate::overpass::{FeatureSource, FetchError};

/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// A recovered per-country retrieval failure.
#[derive(Debug, Error)]
#[error("failed to retrieve features for {country}: {source}")]
pub struct FetchFailure {
    /// Country whose fetch failed.
    pub country: String,
    /// Underlying fetch error.
    #[source]
    pub source: FetchError,
}

/// Outcome of a retrieval run: successful records plus recovered failures.
///
/// Both sequences are in completion order, which is not deterministic
/// across runs; downstream stages must treat them as unordered.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Records from every successful country.
    pub features: Vec<FeatureRecord>,
    /// Per-country failures.
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    /// Whether no features were retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Fetch features for every boundary over a fixed-size worker pool.
///
/// Boundaries without a query region are skipped up front. Successful
/// results are concatenated in completion order; failures are warn-logged
/// with their country and collected into the report. There are no retries
/// and no cancellation: once dispatched, a fetch runs to completion or
/// failure, and the call returns when every scheduled fetch has finished.
pub fn retrieve_features<S>(
    source: &S,
    boundaries: &[CountryBoundary],
    filter: &TagFilter,
    max_workers: NonZeroUsize,
) -> FetchReport
where
    S: FeatureSource + ?Sized,
{
    let eligible: Vec<&CountryBoundary> = boundaries
        .iter()
        .filter(|boundary| {
            if boundary.has_geometry() {
                true
            } else {
                debug!("skipping {}: no usable boundary geometry", boundary.name);
                false
            }
        })
        .collect();

    let mut report = FetchReport::default();
    if eligible.is_empty() {
        return report;
    }

    let next_index = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel();
    let workers = max_workers.get().min(eligible.len());

    thread::scope(|scope| {
        for _ in 0..workers {
            let sender = sender.clone();
            let next_index = &next_index;
            let eligible = &eligible;
            scope.spawn(move || {
                loop {
                    let index = next_index.fetch_add(1, Ordering::Relaxed);
                    let Some(&boundary) = eligible.get(index) else {
                        break;
                    };
                    let outcome = match source.fetch(boundary, filter) {
                        Ok(records) => Ok((boundary.name.clone(), records)),
                        Err(cause) => Err(FetchFailure {
                            country: boundary.name.clone(),
                            source: cause,
                        }),
                    };
                    if sender.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(sender);

        // Sole consumer of the channel; appends stay serialised here.
        for outcome in receiver {
            match outcome {
                Ok((country, records)) => {
                    info!("{country}: {} features", records.len());
                    report.features.extend(records);
                }
                Err(failure) => {
                    warn!("{failure}");
                    report.failures.push(failure);
                }
            }
        }
    });

    report
}
