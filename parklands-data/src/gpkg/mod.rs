//! GeoPackage persistence for the partitioned layers.
//!
//! The writer creates or overwrites one SQLite container holding the three
//! feature layers, their `gpkg_contents`/`gpkg_geometry_columns` metadata
//! and the WGS84 spatial reference entry. Any failure here is fatal to the
//! run; there is nothing to recover per record.

mod wkb;

pub use wkb::UnsupportedGeometry;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{BoundingRect, Coord, Rect};
use log::info;
use parklands_core::{LayerKind, LayerSet, NormalisedFeature};
use rusqlite::{Connection, params};
use thiserror::Error;

use crate::paths::{ensure_parent_dir, remove_file_if_exists};

/// WGS84 spatial reference identifier used throughout the pipeline.
pub const WGS84_SRS_ID: i32 = 4326;

/// GeoPackage application id, the ASCII bytes `GPKG`.
const APPLICATION_ID: i32 = 0x4750_4B47;
/// GeoPackage 1.3 user version.
const USER_VERSION: i32 = 10300;

const WGS84_DEFINITION: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",\
    SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],\
    UNIT[\"degree\",0.0174532925199433]]";

/// Policy for layers that received no records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyLayerPolicy {
    /// Emit all layers, including empty ones.
    #[default]
    WriteEmpty,
    /// Omit layers with no records from the container.
    SkipEmpty,
}

/// Options governing one write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// How layers without records are handled.
    pub empty_layers: EmptyLayerPolicy,
}

/// Summary of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Location of the container.
    pub path: Utf8PathBuf,
    /// Layer names actually written, with their record counts.
    pub layers: Vec<(&'static str, usize)>,
}

/// Errors raised while writing the output container.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeoPackageError {
    /// Preparing the output location failed.
    #[error("failed to prepare output path {path}: {source}")]
    PreparePath {
        /// Output location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A database operation failed.
    #[error("failed to write GeoPackage at {path}: {source}")]
    Database {
        /// Output location.
        path: Utf8PathBuf,
        /// SQLite error.
        #[source]
        source: rusqlite::Error,
    },
    /// A record carried a geometry with no layer encoding.
    #[error("cannot encode a record in layer {layer}: {source}")]
    Encode {
        /// Layer being written.
        layer: &'static str,
        /// Rejected geometry kind.
        #[source]
        source: UnsupportedGeometry,
    },
}

/// Create or overwrite the GeoPackage at `path` with one layer per partition.
///
/// Every requested layer is registered in the container metadata with its
/// bounding box; `options.empty_layers` decides whether empty partitions
/// still produce a layer.
///
/// # Errors
///
/// Fatal on any filesystem or database failure; nothing is retried.
pub fn write_layers(
    path: &Utf8Path,
    layers: &LayerSet,
    options: &WriteOptions,
) -> Result<WriteSummary, GeoPackageError> {
    ensure_parent_dir(path).map_err(|source| GeoPackageError::PreparePath {
        path: path.to_path_buf(),
        source,
    })?;
    remove_file_if_exists(path).map_err(|source| GeoPackageError::PreparePath {
        path: path.to_path_buf(),
        source,
    })?;

    let mut connection = Connection::open(path.as_std_path())
        .map_err(|source| database_error(path, source))?;
    initialise_container(&connection).map_err(|source| database_error(path, source))?;

    let mut written = Vec::new();
    for kind in LayerKind::all() {
        let records = layers.layer(kind);
        if records.is_empty() && options.empty_layers == EmptyLayerPolicy::SkipEmpty {
            info!("skipping empty layer {}", kind.name());
            continue;
        }
        write_layer(&mut connection, kind, records, path)?;
        written.push((kind.name(), records.len()));
    }

    Ok(WriteSummary {
        path: path.to_path_buf(),
        layers: written,
    })
}

fn database_error(path: &Utf8Path, source: rusqlite::Error) -> GeoPackageError {
    GeoPackageError::Database {
        path: path.to_path_buf(),
        source,
    }
}

fn initialise_container(connection: &Connection) -> rusqlite::Result<()> {
    connection.pragma_update(None, "application_id", APPLICATION_ID)?;
    connection.pragma_update(None, "user_version", USER_VERSION)?;
    connection.execute_batch(
        "CREATE TABLE gpkg_spatial_ref_sys (
            srs_name TEXT NOT NULL,
            srs_id INTEGER PRIMARY KEY,
            organization TEXT NOT NULL,
            organization_coordsys_id INTEGER NOT NULL,
            definition TEXT NOT NULL,
            description TEXT
        );
        CREATE TABLE gpkg_contents (
            table_name TEXT NOT NULL PRIMARY KEY,
            data_type TEXT NOT NULL,
            identifier TEXT UNIQUE,
            description TEXT DEFAULT '',
            last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            min_x DOUBLE,
            min_y DOUBLE,
            max_x DOUBLE,
            max_y DOUBLE,
            srs_id INTEGER,
            CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id)
                REFERENCES gpkg_spatial_ref_sys(srs_id)
        );
        CREATE TABLE gpkg_geometry_columns (
            table_name TEXT NOT NULL,
            column_name TEXT NOT NULL,
            geometry_type_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL,
            z TINYINT NOT NULL,
            m TINYINT NOT NULL,
            CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
            CONSTRAINT fk_gc_tn FOREIGN KEY (table_name)
                REFERENCES gpkg_contents(table_name),
            CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id)
                REFERENCES gpkg_spatial_ref_sys(srs_id)
        );",
    )?;

    let insert_srs =
        "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
    connection.execute(
        insert_srs,
        params![
            "WGS 84 geodetic",
            WGS84_SRS_ID,
            "EPSG",
            WGS84_SRS_ID,
            WGS84_DEFINITION,
            "longitude/latitude in decimal degrees",
        ],
    )?;
    connection.execute(
        insert_srs,
        params!["undefined cartesian SRS", -1, "NONE", -1, "undefined", None::<String>],
    )?;
    connection.execute(
        insert_srs,
        params!["undefined geographic SRS", 0, "NONE", 0, "undefined", None::<String>],
    )?;
    Ok(())
}

const fn geometry_type_name(kind: LayerKind) -> &'static str {
    match kind {
        LayerKind::Points => "MULTIPOINT",
        LayerKind::Lines => "MULTILINESTRING",
        LayerKind::Polygons => "MULTIPOLYGON",
    }
}

fn write_layer(
    connection: &mut Connection,
    kind: LayerKind,
    records: &[NormalisedFeature],
    path: &Utf8Path,
) -> Result<(), GeoPackageError> {
    let table = kind.name();
    let geometry_type = geometry_type_name(kind);

    connection
        .execute_batch(&format!(
            "CREATE TABLE {table} (
                fid INTEGER PRIMARY KEY AUTOINCREMENT,
                geom {geometry_type},
                name TEXT,
                properties TEXT
            );"
        ))
        .map_err(|source| database_error(path, source))?;

    let bounds = layer_bounds(records);
    let (min_x, min_y, max_x, max_y) = match bounds {
        Some(rect) => (
            Some(rect.min().x),
            Some(rect.min().y),
            Some(rect.max().x),
            Some(rect.max().y),
        ),
        None => (None, None, None, None),
    };
    connection
        .execute(
            "INSERT INTO gpkg_contents
                (table_name, data_type, identifier, srs_id, min_x, min_y, max_x, max_y)
             VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
            params![table, WGS84_SRS_ID, min_x, min_y, max_x, max_y],
        )
        .map_err(|source| database_error(path, source))?;
    connection
        .execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
            params![table, geometry_type, WGS84_SRS_ID],
        )
        .map_err(|source| database_error(path, source))?;

    let transaction = connection
        .transaction()
        .map_err(|source| database_error(path, source))?;
    {
        let mut statement = transaction
            .prepare(&format!(
                "INSERT INTO {table} (geom, name, properties) VALUES (?1, ?2, ?3)"
            ))
            .map_err(|source| database_error(path, source))?;
        for record in records {
            let blob = wkb::geometry_blob(&record.geometry, WGS84_SRS_ID)
                .map_err(|source| GeoPackageError::Encode {
                    layer: table,
                    source,
                })?;
            statement
                .execute(params![blob, record.name, record.properties])
                .map_err(|source| database_error(path, source))?;
        }
    }
    transaction
        .commit()
        .map_err(|source| database_error(path, source))?;

    info!("wrote {} records to layer {table}", records.len());
    Ok(())
}

fn layer_bounds(records: &[NormalisedFeature]) -> Option<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;
    for record in records {
        let Some(rect) = record.geometry.bounding_rect() else {
            continue;
        };
        bounds = Some(match bounds {
            Some(existing) => merge_rects(existing, rect),
            None => rect,
        });
    }
    bounds
}

fn merge_rects(left: Rect<f64>, right: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: left.min().x.min(right.min().x),
            y: left.min().y.min(right.min().y),
        },
        Coord {
            x: left.max().x.max(right.max().x),
            y: left.max().y.max(right.max().y),
        },
    )
}
