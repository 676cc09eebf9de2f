//! Overpass API response types and geometry assembly.
//!
//! Deserialisation targets the `out geom` output form, where ways and
//! relation members carry their vertex coordinates inline. Assembly turns
//! each element into at most one geometry: nodes become points, ways become
//! line strings or polygons, and multipolygon relations are stitched from
//! their member ways. Elements with no derivable geometry still produce a
//! record; normalisation drops them later.

use std::collections::BTreeMap;

use geo::{Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use parklands_core::{Attributes, FeatureRecord};
use serde::Deserialize;

/// Top-level Overpass JSON payload.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    /// Returned elements with inline geometry.
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One node, way or relation from an `out geom` response.
#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    /// Element kind: `node`, `way` or `relation`.
    #[serde(rename = "type")]
    pub kind: String,
    /// OSM identifier.
    pub id: i64,
    /// Free-form tag map.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Node latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Node longitude.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Way vertex coordinates.
    #[serde(default)]
    pub geometry: Option<Vec<LonLat>>,
    /// Relation members.
    #[serde(default)]
    pub members: Vec<OverpassMember>,
}

/// A coordinate pair as serialised by Overpass.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LonLat {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// A relation member with inline geometry.
#[derive(Debug, Deserialize)]
pub struct OverpassMember {
    /// Member kind: `node`, `way` or `relation`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Member role, e.g. `outer` or `inner`.
    #[serde(default)]
    pub role: String,
    /// Member vertex coordinates.
    #[serde(default)]
    pub geometry: Option<Vec<LonLat>>,
}

impl OverpassResponse {
    /// Convert the payload into feature records labelled with `country`.
    #[must_use]
    pub fn into_features(self, country: &str) -> Vec<FeatureRecord> {
        self.elements
            .into_iter()
            .map(|element| element.into_feature(country))
            .collect()
    }
}

impl OverpassElement {
    /// Element identity is preserved as `osm_type`/`osm_id` attributes;
    /// tags follow in key-sorted order.
    fn into_feature(self, country: &str) -> FeatureRecord {
        let geometry = element_geometry(&self);
        let mut attributes: Attributes = Vec::with_capacity(self.tags.len() + 2);
        attributes.push(("osm_type".to_owned(), self.kind));
        attributes.push(("osm_id".to_owned(), self.id.to_string()));
        for (key, value) in self.tags {
            attributes.push((key, value));
        }
        FeatureRecord::new(country, geometry, attributes)
    }
}

fn coords_of(vertices: &[LonLat]) -> Vec<Coord<f64>> {
    vertices
        .iter()
        .map(|vertex| Coord {
            x: vertex.lon,
            y: vertex.lat,
        })
        .collect()
}

fn element_geometry(element: &OverpassElement) -> Option<Geometry<f64>> {
    match element.kind.as_str() {
        "node" => {
            let (lat, lon) = (element.lat?, element.lon?);
            Some(Geometry::Point(Point::new(lon, lat)))
        }
        "way" => way_geometry(element.geometry.as_deref()?),
        "relation" => relation_geometry(element),
        _ => None,
    }
}

/// Closed ways become polygons, open ways line strings.
fn way_geometry(vertices: &[LonLat]) -> Option<Geometry<f64>> {
    let coords = coords_of(vertices);
    if coords.len() >= 4 && coords.first() == coords.last() {
        Some(Geometry::Polygon(Polygon::new(
            LineString::from(coords),
            Vec::new(),
        )))
    } else if coords.len() >= 2 {
        Some(Geometry::LineString(LineString::from(coords)))
    } else {
        None
    }
}

/// Assemble `multipolygon`/`boundary` relations from their member ways.
///
/// Outer segments are stitched into rings; inner rings become holes of the
/// first outer polygon containing them. Other relation kinds are skipped.
fn relation_geometry(element: &OverpassElement) -> Option<Geometry<f64>> {
    let relation_kind = element.tags.get("type").map(String::as_str);
    if !matches!(relation_kind, Some("multipolygon" | "boundary")) {
        return None;
    }

    let outers = stitch_rings(member_segments(element, &["outer", ""]));
    if outers.is_empty() {
        return None;
    }
    let inners = stitch_rings(member_segments(element, &["inner"]));

    let mut polygons: Vec<Polygon<f64>> = outers
        .into_iter()
        .map(|ring| Polygon::new(ring, Vec::new()))
        .collect();
    for inner in inners {
        let Some(anchor) = inner.0.first().copied() else {
            continue;
        };
        if let Some(target) = polygons
            .iter_mut()
            .find(|polygon| polygon.contains(&Point::from(anchor)))
        {
            target.interiors_push(inner);
        }
    }
    Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
}

fn member_segments(element: &OverpassElement, roles: &[&str]) -> Vec<Vec<Coord<f64>>> {
    element
        .members
        .iter()
        .filter(|member| member.kind == "way" && roles.contains(&member.role.as_str()))
        .filter_map(|member| member.geometry.as_deref())
        .map(coords_of)
        .collect()
}

/// Join way segments end-to-end into closed rings.
///
/// Segments are reversed as needed to match endpoints; chains that never
/// close are discarded.
fn stitch_rings(segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut pool: Vec<Vec<Coord<f64>>> = segments
        .into_iter()
        .filter(|segment| segment.len() >= 2)
        .collect();
    let mut rings = Vec::new();

    while let Some(mut ring) = pool.pop() {
        loop {
            if ring.len() >= 4 && ring.first() == ring.last() {
                rings.push(LineString::from(ring));
                break;
            }
            let Some(tail) = ring.last().copied() else {
                break;
            };
            let Some(index) = pool.iter().position(|segment| {
                segment.first() == Some(&tail) || segment.last() == Some(&tail)
            }) else {
                break;
            };
            let mut segment = pool.swap_remove(index);
            if segment.last() == Some(&tail) {
                segment.reverse();
            }
            ring.extend(segment.into_iter().skip(1));
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(payload: &str) -> OverpassResponse {
        serde_json::from_str(payload).expect("payload parses")
    }

    fn sole_geometry(payload: &str) -> Option<Geometry<f64>> {
        let mut features = parse(payload).into_features("Testland");
        assert_eq!(features.len(), 1);
        features.pop().and_then(|feature| feature.geometry)
    }

    #[rstest]
    fn nodes_become_points() {
        let geometry = sole_geometry(
            r#"{"elements": [{"type": "node", "id": 7, "lat": 47.5, "lon": 9.25,
                "tags": {"name": "Summit"}}]}"#,
        );
        assert_eq!(geometry, Some(Geometry::Point(Point::new(9.25, 47.5))));
    }

    #[rstest]
    fn closed_ways_become_polygons() {
        let geometry = sole_geometry(
            r#"{"elements": [{"type": "way", "id": 3, "geometry": [
                {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 2.0},
                {"lat": 2.0, "lon": 2.0}, {"lat": 0.0, "lon": 0.0}]}]}"#,
        );
        assert!(matches!(geometry, Some(Geometry::Polygon(_))));
    }

    #[rstest]
    fn open_ways_become_line_strings() {
        let geometry = sole_geometry(
            r#"{"elements": [{"type": "way", "id": 3, "geometry": [
                {"lat": 0.0, "lon": 0.0}, {"lat": 1.0, "lon": 1.0}]}]}"#,
        );
        assert!(matches!(geometry, Some(Geometry::LineString(_))));
    }

    #[rstest]
    fn split_relations_are_stitched_with_holes() {
        // Outer square split into two open ways; inner square forms a hole.
        let geometry = sole_geometry(
            r#"{"elements": [{"type": "relation", "id": 9,
                "tags": {"type": "multipolygon", "name": "Ringland"},
                "members": [
                    {"type": "way", "role": "outer", "geometry": [
                        {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 6.0},
                        {"lat": 6.0, "lon": 6.0}]},
                    {"type": "way", "role": "outer", "geometry": [
                        {"lat": 6.0, "lon": 6.0}, {"lat": 6.0, "lon": 0.0},
                        {"lat": 0.0, "lon": 0.0}]},
                    {"type": "way", "role": "inner", "geometry": [
                        {"lat": 2.0, "lon": 2.0}, {"lat": 2.0, "lon": 3.0},
                        {"lat": 3.0, "lon": 3.0}, {"lat": 3.0, "lon": 2.0},
                        {"lat": 2.0, "lon": 2.0}]}
                ]}]}"#,
        );
        let Some(Geometry::MultiPolygon(polygons)) = geometry else {
            panic!("expected a multi polygon, got {geometry:?}");
        };
        assert_eq!(polygons.0.len(), 1);
        let polygon = polygons.0.first().expect("one polygon");
        assert!(polygon.exterior().is_closed());
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[rstest]
    fn unassembled_relations_yield_no_geometry() {
        let geometry = sole_geometry(
            r#"{"elements": [{"type": "relation", "id": 4,
                "tags": {"type": "route"}, "members": []}]}"#,
        );
        assert_eq!(geometry, None);
    }

    #[rstest]
    fn records_carry_identity_and_sorted_tags() {
        let features = parse(
            r#"{"elements": [{"type": "node", "id": 7, "lat": 1.0, "lon": 2.0,
                "tags": {"zebra": "1", "alpha": "2"}}]}"#,
        )
        .into_features("Testland");
        let feature = features.first().expect("one feature");
        assert_eq!(feature.country, "Testland");
        assert_eq!(
            feature.attributes,
            vec![
                ("osm_type".to_owned(), "node".to_owned()),
                ("osm_id".to_owned(), "7".to_owned()),
                ("alpha".to_owned(), "2".to_owned()),
                ("zebra".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[rstest]
    fn empty_payload_yields_no_records() {
        assert!(parse(r#"{"elements": []}"#).into_features("X").is_empty());
    }
}
