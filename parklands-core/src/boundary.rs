//! Country boundaries used as spatial query regions.

use geo::MultiPolygon;

/// A country outline used as the query region for one feature fetch.
///
/// The geometry is always the multi form; loaders promote bare polygons on
/// ingest. `None` records a boundary whose source geometry was absent or
/// could not be repaired; such boundaries are skipped by retrieval rather
/// than rejected.
///
/// # Examples
/// ```
/// use parklands_core::CountryBoundary;
///
/// let boundary = CountryBoundary::new("Atlantis", None);
/// assert_eq!(boundary.name, "Atlantis");
/// assert!(!boundary.has_geometry());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CountryBoundary {
    /// Country name as reported by the boundary dataset.
    pub name: String,
    /// Repaired query region, when one could be derived.
    pub geometry: Option<MultiPolygon<f64>>,
}

impl CountryBoundary {
    /// Construct a boundary from a name and an optional query region.
    pub fn new(name: impl Into<String>, geometry: Option<MultiPolygon<f64>>) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    /// Whether the boundary carries a usable query region.
    #[must_use]
    pub const fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, LineString, Polygon};

    #[test]
    fn boundary_reports_geometry_presence() {
        let ring = LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ]);
        let region = MultiPolygon::new(vec![Polygon::new(ring, Vec::new())]);
        let boundary = CountryBoundary::new("Testland", Some(region));
        assert!(boundary.has_geometry());
    }
}
