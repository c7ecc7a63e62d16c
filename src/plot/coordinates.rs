use crate::error::ValidationError;
use geojson::{Geometry, JsonObject, JsonValue, Position};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// WGS84, the only spatial reference plots are stored in.
pub const SRID: i32 = 4326;

pub const FIELD: &str = "coordinates";

const ACCEPTED_CRS_NAMES: [&str; 5] = [
    "EPSG:4326",
    "urn:ogc:def:crs:EPSG::4326",
    "CRS84",
    "urn:ogc:def:crs:OGC:1.3:CRS84",
    "urn:ogc:def:crs:OGC::CRS84",
];

/// A well-formed GeoJSON geometry tagged with its spatial reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    geometry: Geometry,
    srid: i32,
}

impl Coordinates {
    /// Parses a wire value into a geometry. The value can be a GeoJSON geometry
    /// object or a string holding one. The input is only ever parsed as JSON data.
    pub fn decode(raw: &JsonValue) -> Result<Coordinates, ValidationError> {
        let parsed;
        let value = match raw {
            JsonValue::Null => return Err(invalid("This field may not be null.")),
            JsonValue::String(text) => {
                parsed = serde_json::from_str::<JsonValue>(text)
                    .map_err(|e| invalid(format!("Invalid GeoJSON: {e}.")))?;
                &parsed
            }
            other => other,
        };
        let object = value
            .as_object()
            .ok_or_else(|| invalid("Expected a GeoJSON geometry object."))?;
        match object.get("type").and_then(JsonValue::as_str) {
            Some(kind @ ("Feature" | "FeatureCollection")) => {
                return Err(invalid(format!(
                    "Expected a GeoJSON geometry, got a {kind}."
                )))
            }
            Some(_) => {}
            None => return Err(invalid("GeoJSON geometry is missing its type.")),
        }
        let geometry = Geometry::from_json_object(object.clone())
            .map_err(|e| invalid(format!("Invalid GeoJSON geometry: {e}.")))?;
        check_crs(&geometry).map_err(invalid)?;
        check_geometry(&geometry).map_err(invalid)?;
        Ok(Coordinates {
            geometry,
            srid: SRID,
        })
    }

    /// Returns the canonical GeoJSON structure of this geometry.
    pub fn encode(&self) -> JsonValue {
        JsonValue::Object(JsonObject::from(&self.geometry))
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn type_name(&self) -> &'static str {
        type_name(&self.geometry.value)
    }

    fn to_json_string(&self) -> String {
        self.encode().to_string()
    }
}

impl ToSql for Coordinates {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_json_string()))
    }
}

impl FromSql for Coordinates {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        let json: JsonValue =
            serde_json::from_str(text).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        let geometry =
            Geometry::from_json_value(json).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        Ok(Coordinates {
            geometry,
            srid: SRID,
        })
    }
}

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError::single(FIELD, message)
}

fn type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn check_crs(geometry: &Geometry) -> Result<(), String> {
    let Some(crs) = geometry
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
    else {
        return Ok(());
    };
    let name = crs
        .get("properties")
        .and_then(|it| it.get("name"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    if ACCEPTED_CRS_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported coordinate reference system '{name}', expected EPSG:{SRID}."
        ))
    }
}

fn check_geometry(geometry: &Geometry) -> Result<(), String> {
    use geojson::Value;
    if let Some(bbox) = &geometry.bbox {
        check_bbox(bbox)?;
    }
    match &geometry.value {
        Value::Point(position) => check_position(position),
        Value::MultiPoint(positions) => {
            non_empty(positions)?;
            positions.iter().try_for_each(check_position)
        }
        Value::LineString(line) => check_line(line),
        Value::MultiLineString(lines) => {
            non_empty(lines)?;
            lines.iter().try_for_each(|it| check_line(it))
        }
        Value::Polygon(rings) => check_polygon(rings),
        Value::MultiPolygon(polygons) => {
            non_empty(polygons)?;
            polygons.iter().try_for_each(|it| check_polygon(it))
        }
        Value::GeometryCollection(geometries) => {
            non_empty(geometries)?;
            geometries.iter().try_for_each(check_geometry)
        }
    }
}

// Plot geometries need at least one position
fn non_empty<T>(members: &[T]) -> Result<(), String> {
    if members.is_empty() {
        Err("Empty geometries are not allowed.".into())
    } else {
        Ok(())
    }
}

// Either [west, south, east, north] or the same with elevations
fn check_bbox(bbox: &[f64]) -> Result<(), String> {
    if bbox.len() != 4 && bbox.len() != 6 {
        return Err(format!(
            "A bbox must have 4 or 6 values, got {}.",
            bbox.len()
        ));
    }
    if bbox.iter().any(|it| !it.is_finite()) {
        return Err("Bbox values must be finite numbers.".into());
    }
    Ok(())
}

fn check_position(position: &Position) -> Result<(), String> {
    if position.len() < 2 || position.len() > 3 {
        return Err(format!(
            "A position must have 2 or 3 values, got {}.",
            position.len()
        ));
    }
    if position.iter().any(|it| !it.is_finite()) {
        return Err("Position values must be finite numbers.".into());
    }
    let (lon, lat) = (position[0], position[1]);
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Longitude {lon} is out of range [-180, 180]."));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Latitude {lat} is out of range [-90, 90]."));
    }
    Ok(())
}

fn check_line(line: &[Position]) -> Result<(), String> {
    if line.len() < 2 {
        return Err("A LineString must have at least 2 positions.".into());
    }
    line.iter().try_for_each(check_position)
}

fn check_polygon(rings: &[Vec<Position>]) -> Result<(), String> {
    non_empty(rings)?;
    for ring in rings {
        if ring.len() < 4 {
            return Err("A polygon ring must have at least 4 positions.".into());
        }
        ring.iter().try_for_each(check_position)?;
        if ring.first() != ring.last() {
            return Err("A polygon ring must be closed.".into());
        }
    }
    Ok(())
}
