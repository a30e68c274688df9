//! Coastline geometry.
//!
//! Coastlines are read from GeoJSON (for example a Natural Earth export) and
//! kept as plain polylines of `(lon, lat)` vertices. Every geometry type that
//! carries lines or rings is accepted; points are ignored.

use serde_json::Value;
use std::fs;
use std::path::Path;

/// A polyline of (lon, lat) vertices in degrees
pub type Polyline = Vec<(f64, f64)>;

/// Reads coastline polylines from a GeoJSON file.
pub fn read_coastlines<P: AsRef<Path>>(path: P) -> Result<Vec<Polyline>, String> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read coastline file {}: {}", path.display(), e))?;
    parse_geojson(&content)
}

/// Parses polylines from a GeoJSON document.
pub fn parse_geojson(json: &str) -> Result<Vec<Polyline>, String> {
    let value: Value = serde_json::from_str(json).map_err(|e| format!("Invalid GeoJSON: {}", e))?;
    let mut lines = Vec::new();
    collect(&value, &mut lines)?;
    Ok(lines)
}

fn collect(value: &Value, out: &mut Vec<Polyline>) -> Result<(), String> {
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or("GeoJSON object without 'type'")?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(|f| f.as_array())
                .ok_or("FeatureCollection without 'features' array")?;
            for feature in features {
                collect(feature, out)?;
            }
        }
        "Feature" => match value.get("geometry") {
            Some(Value::Null) | None => {}
            Some(geometry) => collect(geometry, out)?,
        },
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(|g| g.as_array())
                .ok_or("GeometryCollection without 'geometries' array")?;
            for geometry in geometries {
                collect(geometry, out)?;
            }
        }
        "LineString" => out.push(line(coordinates(value)?)?),
        "MultiLineString" | "Polygon" => {
            for ring in array(coordinates(value)?)? {
                out.push(line(ring)?);
            }
        }
        "MultiPolygon" => {
            for polygon in array(coordinates(value)?)? {
                for ring in array(polygon)? {
                    out.push(line(ring)?);
                }
            }
        }
        "Point" | "MultiPoint" => {}
        other => return Err(format!("Unsupported GeoJSON type '{}'", other)),
    }
    Ok(())
}

fn coordinates(value: &Value) -> Result<&Value, String> {
    value
        .get("coordinates")
        .ok_or_else(|| "Geometry without 'coordinates'".to_string())
}

fn array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("Expected an array, found {}", value))
}

fn line(value: &Value) -> Result<Polyline, String> {
    array(value)?
        .iter()
        .map(|pos| {
            let pos = array(pos)?;
            match (pos.first().and_then(Value::as_f64), pos.get(1).and_then(Value::as_f64)) {
                (Some(lon), Some(lat)) => Ok((lon, lat)),
                _ => Err(format!("Invalid position {:?}", pos)),
            }
        })
        .collect()
}
