//! GeoPackage geometry blob encoding: the `GP` header followed by ISO WKB.
//!
//! Only the three multi geometry kinds carried by the output layers are
//! encodable; everything is little-endian and two-dimensional, with no
//! envelope in the header.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use thiserror::Error;

const WKB_POINT: u32 = 1;
const WKB_LINE_STRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTI_POINT: u32 = 4;
const WKB_MULTI_LINE_STRING: u32 = 5;
const WKB_MULTI_POLYGON: u32 = 6;

const LITTLE_ENDIAN: u8 = 1;

const GPKG_MAGIC: [u8; 2] = *b"GP";
const GPKG_VERSION: u8 = 0;
/// Flags byte: little-endian header integers, no envelope, not empty.
const GPKG_FLAGS: u8 = 0b0000_0001;

/// The geometry kind has no representation in the output layers.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("geometry kind {kind} cannot be encoded into an output layer")]
pub struct UnsupportedGeometry {
    /// Name of the rejected kind.
    pub kind: &'static str,
}

/// Encode `geometry` as a GeoPackage geometry blob for `srs_id`.
///
/// # Errors
///
/// [`UnsupportedGeometry`] when the geometry is not one of the multi kinds
/// the layers guarantee.
pub fn geometry_blob(
    geometry: &Geometry<f64>,
    srs_id: i32,
) -> Result<Vec<u8>, UnsupportedGeometry> {
    let mut blob = Vec::with_capacity(64);
    blob.extend_from_slice(&GPKG_MAGIC);
    blob.push(GPKG_VERSION);
    blob.push(GPKG_FLAGS);
    blob.extend_from_slice(&srs_id.to_le_bytes());
    match geometry {
        Geometry::MultiPoint(points) => encode_multi_point(points, &mut blob),
        Geometry::MultiLineString(lines) => encode_multi_line_string(lines, &mut blob),
        Geometry::MultiPolygon(polygons) => encode_multi_polygon(polygons, &mut blob),
        other => {
            return Err(UnsupportedGeometry {
                kind: kind_name(other),
            });
        }
    }
    Ok(blob)
}

fn kind_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Element counts are serialised as unsigned 32-bit values; real layer
/// sizes sit far below that ceiling.
fn push_count(len: usize, out: &mut Vec<u8>) {
    let count = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&count.to_le_bytes());
}

fn push_header(type_code: u32, out: &mut Vec<u8>) {
    out.push(LITTLE_ENDIAN);
    out.extend_from_slice(&type_code.to_le_bytes());
}

fn push_coord(coord: &Coord<f64>, out: &mut Vec<u8>) {
    out.extend_from_slice(&coord.x.to_le_bytes());
    out.extend_from_slice(&coord.y.to_le_bytes());
}

fn encode_point(point: &Point<f64>, out: &mut Vec<u8>) {
    push_header(WKB_POINT, out);
    push_coord(&point.0, out);
}

fn encode_line_string(line: &LineString<f64>, out: &mut Vec<u8>) {
    push_header(WKB_LINE_STRING, out);
    push_count(line.0.len(), out);
    for coord in &line.0 {
        push_coord(coord, out);
    }
}

/// Rings carry no per-ring byte-order header, only a count and coordinates.
fn encode_ring(ring: &LineString<f64>, out: &mut Vec<u8>) {
    push_count(ring.0.len(), out);
    for coord in &ring.0 {
        push_coord(coord, out);
    }
}

fn encode_polygon(polygon: &Polygon<f64>, out: &mut Vec<u8>) {
    push_header(WKB_POLYGON, out);
    push_count(1 + polygon.interiors().len(), out);
    encode_ring(polygon.exterior(), out);
    for interior in polygon.interiors() {
        encode_ring(interior, out);
    }
}

fn encode_multi_point(points: &MultiPoint<f64>, out: &mut Vec<u8>) {
    push_header(WKB_MULTI_POINT, out);
    push_count(points.0.len(), out);
    for point in &points.0 {
        encode_point(point, out);
    }
}

fn encode_multi_line_string(lines: &MultiLineString<f64>, out: &mut Vec<u8>) {
    push_header(WKB_MULTI_LINE_STRING, out);
    push_count(lines.0.len(), out);
    for line in &lines.0 {
        encode_line_string(line, out);
    }
}

fn encode_multi_polygon(polygons: &MultiPolygon<f64>, out: &mut Vec<u8>) {
    push_header(WKB_MULTI_POLYGON, out);
    push_count(polygons.0.len(), out);
    for polygon in &polygons.0 {
        encode_polygon(polygon, out);
    }
}
