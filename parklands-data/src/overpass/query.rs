//! Overpass QL construction for boundary-constrained tag searches.
//!
//! Queries are built as pure functions so the wire format is testable
//! without a live endpoint. The spatial restriction uses `poly:` filters
//! derived from each polygon's exterior ring; rings above the configured
//! vertex budget are thinned before serialisation to keep the query body
//! within service limits.

use geo::{Coord, LineString, MultiPolygon};
use parklands_core::{TagFilter, TagSelector};

/// Build the Overpass query for `region` and `filter`.
///
/// Emits one `nwr` clause per filter entry per polygon, unioned, with JSON
/// output and inline geometry (`out geom`).
#[must_use]
pub fn build_query(
    region: &MultiPolygon<f64>,
    filter: &TagFilter,
    timeout_secs: u64,
    max_ring_vertices: usize,
) -> String {
    let mut query = format!("[out:json][timeout:{timeout_secs}];(");
    for polygon in &region.0 {
        let poly = poly_filter(polygon.exterior(), max_ring_vertices);
        for (key, selector) in filter.iter() {
            query.push_str(&clause(key, selector, &poly));
        }
    }
    query.push_str(");out geom;");
    query
}

fn clause(key: &str, selector: &TagSelector, poly: &str) -> String {
    match selector {
        TagSelector::Any => format!("nwr[\"{key}\"](poly:\"{poly}\");"),
        TagSelector::OneOf(values) => match values.as_slice() {
            [] => format!("nwr[\"{key}\"](poly:\"{poly}\");"),
            [value] => format!("nwr[\"{key}\"=\"{value}\"](poly:\"{poly}\");"),
            values => format!(
                "nwr[\"{key}\"~\"^({})$\"](poly:\"{poly}\");",
                values.join("|")
            ),
        },
    }
}

/// Overpass `poly:` filter body: space-separated `lat lon` pairs.
fn poly_filter(ring: &LineString<f64>, max_vertices: usize) -> String {
    let pairs: Vec<String> = thinned_coords(ring, max_vertices)
        .into_iter()
        .map(|coord| format!("{} {}", coord.y, coord.x))
        .collect();
    pairs.join(" ")
}

/// Reduce the ring to roughly `max_vertices` coordinates, keeping the first
/// and last points so the implied closure is unchanged.
fn thinned_coords(ring: &LineString<f64>, max_vertices: usize) -> Vec<Coord<f64>> {
    let coords = &ring.0;
    let budget = max_vertices.max(4);
    if coords.len() <= budget {
        return coords.clone();
    }
    let stride = coords.len().div_ceil(budget);
    let mut thinned: Vec<Coord<f64>> = coords.iter().copied().step_by(stride).collect();
    if thinned.last() != coords.last()
        && let Some(last) = coords.last()
    {
        thinned.push(*last);
    }
    thinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;
    use rstest::rstest;

    fn square_region() -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            Coord { x: 10.0, y: 50.0 },
            Coord { x: 11.0, y: 50.0 },
            Coord { x: 11.0, y: 51.0 },
            Coord { x: 10.0, y: 51.0 },
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, Vec::new())])
    }

    #[rstest]
    fn single_value_clauses_use_equality() {
        let filter = TagFilter::new().with_values("boundary", ["national_park"]);
        let query = build_query(&square_region(), &filter, 180, 1024);
        assert!(query.starts_with("[out:json][timeout:180];("));
        assert!(query.contains("nwr[\"boundary\"=\"national_park\"](poly:\""));
        assert!(query.ends_with(");out geom;"));
    }

    #[rstest]
    fn multi_value_clauses_use_an_anchored_regex() {
        let filter = TagFilter::new().with_values("protect_class", ["1", "2"]);
        let query = build_query(&square_region(), &filter, 180, 1024);
        assert!(query.contains("nwr[\"protect_class\"~\"^(1|2)$\"](poly:\""));
    }

    #[rstest]
    fn wildcard_clauses_match_the_bare_key() {
        let filter = TagFilter::new().with_any("protected_area");
        let query = build_query(&square_region(), &filter, 60, 1024);
        assert!(query.contains("nwr[\"protected_area\"](poly:\""));
        assert!(!query.contains("protected_area\"="));
    }

    #[rstest]
    fn poly_filters_are_latitude_first() {
        let filter = TagFilter::new().with_any("boundary");
        let query = build_query(&square_region(), &filter, 180, 1024);
        // Ring starts at x=10 (lon), y=50 (lat); poly serialises lat first.
        assert!(query.contains("(poly:\"50 10 "));
    }

    #[rstest]
    fn one_clause_per_filter_entry_per_polygon() {
        let filter = TagFilter::national_parks();
        let query = build_query(&square_region(), &filter, 180, 1024);
        assert_eq!(query.matches("nwr[").count(), 4);
    }

    #[rstest]
    #[case(64)]
    #[case(128)]
    fn oversized_rings_are_thinned_to_the_budget(#[case] budget: usize) {
        let coords: Vec<Coord<f64>> = (0..=2000)
            .map(|i| Coord {
                x: f64::from(i) / 1000.0,
                y: f64::from(i) / 2000.0,
            })
            .collect();
        let first = coords.first().copied();
        let last = coords.last().copied();
        let ring = LineString::from(coords);

        let thinned = thinned_coords(&ring, budget);
        assert!(thinned.len() <= budget + 1, "{} > {budget}", thinned.len());
        assert_eq!(thinned.first().copied(), first);
        assert_eq!(thinned.last().copied(), last);
    }

    #[rstest]
    fn small_rings_pass_through_unchanged() {
        let ring = LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ]);
        assert_eq!(thinned_coords(&ring, 512), ring.0);
    }
}
