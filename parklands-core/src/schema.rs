//! Schema normalisation: canonical column names and the properties blob.
//!
//! External sources return arbitrary attribute sets, so column identity is
//! established over the merged record set rather than per record. The
//! canonicalisation rules are pure functions, independent of any geometry
//! machinery.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{FeatureRecord, NormalisedFeature};

/// Column name reserved by SQLite-backed vector containers for row identity.
const RESERVED_ID_COLUMN: &str = "fid";
/// Canonical column carrying the feature name.
const NAME_COLUMN: &str = "name";
/// Attribute key recording the originating country.
const COUNTRY_COLUMN: &str = "country";

/// Errors raised while normalising the merged record set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormaliseError {
    /// Every supplied record was missing its geometry, or none were supplied.
    #[error("no features with usable geometry were supplied")]
    NoData,
}

/// Rewrite a raw attribute key into its canonical column form.
///
/// Lowercases, maps `:` to `_` and removes spaces. Idempotent: applying the
/// rewrite to an already canonical name yields the same name.
///
/// # Examples
/// ```
/// use parklands_core::canonicalise_key;
///
/// assert_eq!(canonicalise_key("addr:housenumber"), "addr_housenumber");
/// assert_eq!(canonicalise_key("Protect Class"), "protectclass");
/// ```
#[must_use]
pub fn canonicalise_key(key: &str) -> String {
    let mut canonical = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            ' ' => {}
            ':' => canonical.push('_'),
            other => canonical.extend(other.to_lowercase()),
        }
    }
    canonical
}

/// Assigns collision-free canonical column names in first-seen order.
///
/// The first original key to claim a canonical name keeps it bare; later
/// keys colliding onto the same name receive `_1`, `_2`, ... suffixes.
/// Resolution is deterministic for a fixed input order, and a repeated
/// original key always resolves to the same column.
///
/// # Examples
/// ```
/// use parklands_core::ColumnResolver;
///
/// let mut resolver = ColumnResolver::new();
/// assert_eq!(resolver.resolve("Name").as_deref(), Some("name"));
/// assert_eq!(resolver.resolve("NAME").as_deref(), Some("name_1"));
/// assert_eq!(resolver.resolve("Name").as_deref(), Some("name"));
/// ```
#[derive(Debug, Default)]
pub struct ColumnResolver {
    resolved: HashMap<String, Option<String>>,
    taken: HashSet<String>,
}

impl ColumnResolver {
    /// A resolver with no columns assigned yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` to its column, assigning one on first sight.
    ///
    /// Returns `None` for keys collapsing onto the reserved identifier
    /// column, which is removed from the schema outright.
    pub fn resolve(&mut self, key: &str) -> Option<String> {
        if let Some(existing) = self.resolved.get(key) {
            return existing.clone();
        }
        let canonical = canonicalise_key(key);
        let assigned = if canonical == RESERVED_ID_COLUMN {
            None
        } else {
            let mut candidate = canonical.clone();
            let mut suffix = 1usize;
            while !self.taken.insert(candidate.clone()) {
                candidate = format!("{canonical}_{suffix}");
                suffix += 1;
            }
            Some(candidate)
        };
        self.resolved.insert(key.to_owned(), assigned.clone());
        assigned
    }
}

/// Reduce the merged record set to the `{name, geometry, properties}` shape.
///
/// Records without geometry are dropped first. Column identity is resolved
/// across the whole set in first-seen order, the originating country is
/// folded in as a trailing `country` attribute, and every attribute other
/// than the one resolving to `name` is serialised into the JSON
/// `properties` blob.
///
/// # Errors
///
/// [`NormaliseError::NoData`] when no record with geometry remains; callers
/// skip persistence instead of treating this as a failure.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use parklands_core::{FeatureRecord, normalise_features};
///
/// let record = FeatureRecord::new(
///     "Testland",
///     Some(Geometry::Point(Point::new(9.0, 47.5))),
///     vec![("name".into(), "Alpental".into()), ("operator".into(), "NPS".into())],
/// );
/// let normalised = normalise_features(vec![record])?;
/// assert_eq!(normalised[0].name, "Alpental");
/// assert!(normalised[0].properties.contains("\"operator\":\"NPS\""));
/// assert!(normalised[0].properties.contains("\"country\":\"Testland\""));
/// # Ok::<(), parklands_core::NormaliseError>(())
/// ```
pub fn normalise_features(
    records: Vec<FeatureRecord>,
) -> Result<Vec<NormalisedFeature>, NormaliseError> {
    let records: Vec<FeatureRecord> = records
        .into_iter()
        .filter(|record| record.geometry.is_some())
        .collect();
    if records.is_empty() {
        return Err(NormaliseError::NoData);
    }

    let mut resolver = ColumnResolver::new();
    let mut normalised = Vec::with_capacity(records.len());
    for record in records {
        let FeatureRecord {
            country,
            geometry,
            attributes,
        } = record;
        let Some(geometry) = geometry else { continue };

        let mut name = String::new();
        let mut properties = Map::new();
        let labelled = attributes
            .into_iter()
            .chain([(COUNTRY_COLUMN.to_owned(), country)]);
        for (key, value) in labelled {
            let Some(column) = resolver.resolve(&key) else {
                continue;
            };
            if column == NAME_COLUMN {
                name = value;
            } else {
                properties.insert(column, Value::String(value));
            }
        }

        normalised.push(NormalisedFeature {
            name,
            geometry,
            properties: Value::Object(properties).to_string(),
        });
    }
    Ok(normalised)
}
