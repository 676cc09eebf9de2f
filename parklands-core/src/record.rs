//! Raw and normalised feature records flowing through the pipeline.

use geo::Geometry;

/// Ordered raw attribute pairs attached to a fetched feature.
///
/// Order is significant: schema normalisation assigns column names in
/// first-seen order across the whole record set.
pub type Attributes = Vec<(String, String)>;

/// A feature as returned by a feature source, labelled with its country.
///
/// The attribute set varies per record and per country; no fixed schema is
/// assumed until normalisation.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use parklands_core::FeatureRecord;
///
/// let record = FeatureRecord::new(
///     "Testland",
///     Some(Geometry::Point(Point::new(9.0, 47.5))),
///     vec![("name".into(), "Alpental".into())],
/// );
/// assert_eq!(record.country, "Testland");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Name of the country whose boundary produced this record.
    pub country: String,
    /// Source geometry; `None` when the source supplied a record without one.
    pub geometry: Option<Geometry<f64>>,
    /// Raw attribute pairs in source order.
    pub attributes: Attributes,
}

impl FeatureRecord {
    /// Construct a labelled record.
    pub fn new(
        country: impl Into<String>,
        geometry: Option<Geometry<f64>>,
        attributes: Attributes,
    ) -> Self {
        Self {
            country: country.into(),
            geometry,
            attributes,
        }
    }
}

/// A record reduced to the stable `{name, geometry, properties}` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalisedFeature {
    /// Feature name; empty when the source carried none.
    pub name: String,
    /// Feature geometry, guaranteed present.
    pub geometry: Geometry<f64>,
    /// JSON object of the remaining attributes under resolved column names.
    pub properties: String,
}
