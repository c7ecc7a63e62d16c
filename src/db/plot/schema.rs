use crate::plot::coordinates::Coordinates;
use crate::plot::model::CropType;
use rusqlite::types::Type;
use rusqlite::Row;
use std::fmt;
use std::sync::OnceLock;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

pub const TABLE_NAME: &str = "plot";

pub enum Columns {
    Id,
    Name,
    Coordinates,
    Srid,
    Area,
    Exploitation,
    CropType,
    HasManager,
    CreatedAt,
    UpdatedAt,
}

impl Columns {
    pub fn as_str(&self) -> &'static str {
        match self {
            Columns::Id => "id",
            Columns::Name => "name",
            Columns::Coordinates => "coordinates",
            Columns::Srid => "srid",
            Columns::Area => "area",
            Columns::Exploitation => "exploitation",
            Columns::CropType => "crop_type",
            Columns::HasManager => "has_manager",
            Columns::CreatedAt => "created_at",
            Columns::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub id: i64,
    pub name: String,
    pub coordinates: Coordinates,
    pub srid: i32,
    pub area: f64,
    pub exploitation: String,
    pub crop_type: Option<CropType>,
    pub has_manager: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Plot {
    pub fn projection() -> &'static str {
        static PROJECTION: OnceLock<String> = OnceLock::new();
        PROJECTION.get_or_init(|| {
            [
                Columns::Id,
                Columns::Name,
                Columns::Coordinates,
                Columns::Srid,
                Columns::Area,
                Columns::Exploitation,
                Columns::CropType,
                Columns::HasManager,
                Columns::CreatedAt,
                Columns::UpdatedAt,
            ]
            .iter()
            .map(Columns::as_str)
            .collect::<Vec<_>>()
            .join(", ")
        })
    }

    pub const fn mapper() -> fn(&Row) -> rusqlite::Result<Plot> {
        |row| {
            let crop_type: String = row.get(Columns::CropType.as_str())?;
            let crop_type = CropType::parse_blank(&crop_type).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
            })?;
            Ok(Plot {
                id: row.get(Columns::Id.as_str())?,
                name: row.get(Columns::Name.as_str())?,
                coordinates: row.get(Columns::Coordinates.as_str())?,
                srid: row.get(Columns::Srid.as_str())?,
                area: row.get(Columns::Area.as_str())?,
                exploitation: row.get(Columns::Exploitation.as_str())?,
                crop_type,
                has_manager: row.get(Columns::HasManager.as_str())?,
                created_at: row.get(Columns::CreatedAt.as_str())?,
                updated_at: row.get(Columns::UpdatedAt.as_str())?,
            })
        }
    }
}

/// Formats a timestamp the way the database writes them, so that stored
/// values compare correctly as text.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, time::error::Format> {
    value.to_offset(UtcOffset::UTC).format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
}

impl fmt::Display for Plot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
