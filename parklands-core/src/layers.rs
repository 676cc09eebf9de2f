//! Partitioning normalised records into geometry-uniform output layers.
//!
//! Every record belongs to exactly one partition, determined solely by the
//! primitive kind of its geometry. Single geometries are promoted to their
//! multi wrapper so each layer holds one uniform geometry type.

use geo::{Geometry, MultiLineString, MultiPoint, MultiPolygon};

use crate::record::NormalisedFeature;

/// Identity of one output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// `MultiPoint` records.
    Points,
    /// `MultiLineString` records.
    Lines,
    /// `MultiPolygon` records.
    Polygons,
}

impl LayerKind {
    /// Layer name used in the output container.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Lines => "lines",
            Self::Polygons => "polygons",
        }
    }

    /// All layers, in output order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Points, Self::Lines, Self::Polygons]
    }
}

/// Policy for geometry collections encountered during partitioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionPolicy {
    /// Exclude collection geometries from every layer.
    #[default]
    Drop,
    /// Route each member of a collection as its own record.
    Flatten,
}

/// The three geometry-uniform partitions of a normalised record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSet {
    /// Point-kind records, promoted to `MultiPoint`.
    pub points: Vec<NormalisedFeature>,
    /// Line-kind records, promoted to `MultiLineString`.
    pub lines: Vec<NormalisedFeature>,
    /// Polygon-kind records, promoted to `MultiPolygon`.
    pub polygons: Vec<NormalisedFeature>,
}

impl LayerSet {
    /// Records held by `kind`.
    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> &[NormalisedFeature] {
        match kind {
            LayerKind::Points => &self.points,
            LayerKind::Lines => &self.lines,
            LayerKind::Polygons => &self.polygons,
        }
    }

    /// Total record count across all layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len() + self.lines.len() + self.polygons.len()
    }

    /// Whether every layer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, kind: LayerKind, feature: NormalisedFeature) {
        match kind {
            LayerKind::Points => self.points.push(feature),
            LayerKind::Lines => self.lines.push(feature),
            LayerKind::Polygons => self.polygons.push(feature),
        }
    }
}

/// Promote a geometry to the multi form of its primitive kind.
///
/// Already-multi geometries pass through unchanged, so promotion is
/// idempotent. Kinds with no output layer (collections, rects, triangles,
/// lines) return `None`.
///
/// # Examples
/// ```
/// use geo::{Geometry, MultiPoint, Point};
/// use parklands_core::{LayerKind, promote_geometry};
///
/// let point = Point::new(1.0, 2.0);
/// let promoted = promote_geometry(Geometry::Point(point));
/// assert_eq!(
///     promoted,
///     Some((
///         LayerKind::Points,
///         Geometry::MultiPoint(MultiPoint::new(vec![point]))
///     ))
/// );
/// ```
#[must_use]
pub fn promote_geometry(geometry: Geometry<f64>) -> Option<(LayerKind, Geometry<f64>)> {
    match geometry {
        Geometry::Point(point) => Some((
            LayerKind::Points,
            Geometry::MultiPoint(MultiPoint::new(vec![point])),
        )),
        Geometry::MultiPoint(points) => Some((LayerKind::Points, Geometry::MultiPoint(points))),
        Geometry::LineString(line) => Some((
            LayerKind::Lines,
            Geometry::MultiLineString(MultiLineString::new(vec![line])),
        )),
        Geometry::MultiLineString(lines) => {
            Some((LayerKind::Lines, Geometry::MultiLineString(lines)))
        }
        Geometry::Polygon(polygon) => Some((
            LayerKind::Polygons,
            Geometry::MultiPolygon(MultiPolygon::new(vec![polygon])),
        )),
        Geometry::MultiPolygon(polygons) => {
            Some((LayerKind::Polygons, Geometry::MultiPolygon(polygons)))
        }
        _ => None,
    }
}

/// Split records into geometry-uniform layers.
///
/// Partitioning is total and disjoint over the supported kinds; unsupported
/// kinds are silently excluded except for geometry collections, whose
/// handling follows `policy`.
#[must_use]
pub fn partition_features(
    features: Vec<NormalisedFeature>,
    policy: CollectionPolicy,
) -> LayerSet {
    let mut layers = LayerSet::default();
    for feature in features {
        route_feature(feature, policy, &mut layers);
    }
    layers
}

fn route_feature(feature: NormalisedFeature, policy: CollectionPolicy, layers: &mut LayerSet) {
    match feature.geometry {
        Geometry::GeometryCollection(collection) => {
            if policy == CollectionPolicy::Flatten {
                for member in collection.0 {
                    let part = NormalisedFeature {
                        name: feature.name.clone(),
                        geometry: member,
                        properties: feature.properties.clone(),
                    };
                    route_feature(part, policy, layers);
                }
            }
        }
        geometry => {
            if let Some((kind, promoted)) = promote_geometry(geometry) {
                layers.push(
                    kind,
                    NormalisedFeature {
                        geometry: promoted,
                        ..feature
                    },
                );
            }
        }
    }
}
