//! Geometry repair applied before a geometry is used as a query region.
//!
//! Repair is deliberately conservative: non-finite coordinates are removed,
//! consecutive duplicate points are collapsed, unclosed polygon rings are
//! closed, and degenerate parts are dropped. A geometry with nothing usable
//! left repairs to `None`; callers skip it instead of failing.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

/// Repair `geometry` in place of rejecting it.
///
/// Returns `None` when no usable geometry remains after repair.
///
/// # Examples
/// ```
/// use geo::{Coord, Geometry, LineString, Polygon};
/// use parklands_core::repair_geometry;
///
/// // An unclosed triangle ring is closed rather than rejected.
/// let open_ring = LineString::from(vec![
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 4.0, y: 0.0 },
///     Coord { x: 4.0, y: 4.0 },
/// ]);
/// let repaired = repair_geometry(Geometry::Polygon(Polygon::new(open_ring, Vec::new())));
/// let Some(Geometry::Polygon(polygon)) = repaired else {
///     panic!("expected a polygon");
/// };
/// assert!(polygon.exterior().is_closed());
/// ```
#[must_use]
pub fn repair_geometry(geometry: Geometry<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => repair_point(&point).map(Geometry::Point),
        Geometry::MultiPoint(points) => {
            let kept: Vec<Point<f64>> = points
                .0
                .iter()
                .filter_map(|point| repair_point(point))
                .collect();
            (!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept)))
        }
        Geometry::LineString(line) => repair_line(&line).map(Geometry::LineString),
        Geometry::MultiLineString(lines) => {
            let kept: Vec<LineString<f64>> =
                lines.0.iter().filter_map(|line| repair_line(line)).collect();
            (!kept.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(kept)))
        }
        Geometry::Polygon(polygon) => repair_polygon(&polygon).map(Geometry::Polygon),
        Geometry::MultiPolygon(polygons) => {
            let kept: Vec<Polygon<f64>> = polygons
                .0
                .iter()
                .filter_map(|polygon| repair_polygon(polygon))
                .collect();
            (!kept.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(kept)))
        }
        Geometry::GeometryCollection(collection) => {
            let kept: Vec<Geometry<f64>> = collection
                .0
                .into_iter()
                .filter_map(repair_geometry)
                .collect();
            (!kept.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(kept)))
        }
        // Line, Rect and Triangle carry fixed shapes with no repairable parts.
        other => Some(other),
    }
}

fn finite(coord: &Coord<f64>) -> bool {
    coord.x.is_finite() && coord.y.is_finite()
}

fn repair_point(point: &Point<f64>) -> Option<Point<f64>> {
    finite(&point.0).then_some(*point)
}

/// Finite coordinates with consecutive duplicates collapsed.
fn cleaned_coords(line: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = line.0.iter().copied().filter(finite).collect();
    coords.dedup();
    coords
}

fn repair_line(line: &LineString<f64>) -> Option<LineString<f64>> {
    let coords = cleaned_coords(line);
    (coords.len() >= 2).then(|| LineString::from(coords))
}

/// A ring survives when at least three distinct coordinates remain; the
/// polygon constructor recloses it.
fn repair_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords = cleaned_coords(ring);
    if coords.len() >= 2 && coords.first() == coords.last() {
        coords.pop();
    }
    (coords.len() >= 3).then(|| LineString::from(coords))
}

fn repair_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let exterior = repair_ring(polygon.exterior())?;
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .filter_map(repair_ring)
        .collect();
    Some(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn square_ring() -> LineString<f64> {
        LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 2.0, y: 2.0 },
            Coord { x: 0.0, y: 2.0 },
            Coord { x: 0.0, y: 0.0 },
        ])
    }

    #[rstest]
    fn closes_open_rings() {
        let open_ring = LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 2.0, y: 2.0 },
        ]);
        let repaired = repair_geometry(Geometry::Polygon(Polygon::new(open_ring, Vec::new())));
        let Some(Geometry::Polygon(polygon)) = repaired else {
            panic!("expected a polygon, got {repaired:?}");
        };
        assert!(polygon.exterior().is_closed());
        assert_eq!(polygon.exterior().0.len(), 4);
    }

    #[rstest]
    fn keeps_valid_polygons_intact() {
        let polygon = Polygon::new(square_ring(), Vec::new());
        let repaired = repair_geometry(Geometry::Polygon(polygon.clone()));
        assert_eq!(repaired, Some(Geometry::Polygon(polygon)));
    }

    #[rstest]
    fn drops_degenerate_rings() {
        let sliver = LineString::from(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }]);
        let repaired = repair_geometry(Geometry::Polygon(Polygon::new(sliver, Vec::new())));
        assert_eq!(repaired, None);
    }

    #[rstest]
    fn drops_non_finite_points() {
        let point = Point::new(f64::NAN, 1.0);
        assert_eq!(repair_geometry(Geometry::Point(point)), None);
    }

    #[rstest]
    fn collapses_duplicate_coordinates() {
        let line = LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ]);
        let repaired = repair_geometry(Geometry::LineString(line));
        let Some(Geometry::LineString(cleaned)) = repaired else {
            panic!("expected a line string, got {repaired:?}");
        };
        assert_eq!(cleaned.0.len(), 2);
    }

    #[rstest]
    fn keeps_usable_parts_of_multi_polygons() {
        let sliver = Polygon::new(
            LineString::from(vec![Coord { x: 5.0, y: 5.0 }, Coord { x: 6.0, y: 6.0 }]),
            Vec::new(),
        );
        let valid = Polygon::new(square_ring(), Vec::new());
        let repaired = repair_geometry(Geometry::MultiPolygon(MultiPolygon::new(vec![
            sliver,
            valid.clone(),
        ])));
        assert_eq!(
            repaired,
            Some(Geometry::MultiPolygon(MultiPolygon::new(vec![valid])))
        );
    }

    #[rstest]
    fn empty_collection_repairs_to_none() {
        let collection = GeometryCollection(vec![Geometry::Point(Point::new(f64::NAN, 0.0))]);
        assert_eq!(repair_geometry(Geometry::GeometryCollection(collection)), None);
    }
}
