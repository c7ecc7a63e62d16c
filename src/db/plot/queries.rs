use super::schema::{self, format_timestamp, Columns, Plot};
use crate::error::ValidationError;
use crate::plot::model::{self, CropType, NewPlot, PlotChanges};
use crate::{Error, Result};
use rusqlite::types::ToSql;
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension};
use time::OffsetDateTime;

pub const NAME_TAKEN: &str = "plot with this name already exists.";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ')";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub crop_type: Option<Option<CropType>>,
    pub has_manager: Option<bool>,
    pub exploitation: Option<String>,
    pub updated_since: Option<OffsetDateTime>,
    pub limit: Option<i64>,
}

pub fn insert(plot: &NewPlot, conn: &Connection) -> Result<Plot> {
    let sql = format!(
        r#"
            INSERT INTO {table} (
                {name},
                {coordinates},
                {srid},
                {area},
                {exploitation},
                {crop_type},
                {has_manager}
            ) VALUES (
                ?1,
                ?2,
                ?3,
                ?4,
                ?5,
                ?6,
                ?7
            )
        "#,
        table = schema::TABLE_NAME,
        name = Columns::Name.as_str(),
        coordinates = Columns::Coordinates.as_str(),
        srid = Columns::Srid.as_str(),
        area = Columns::Area.as_str(),
        exploitation = Columns::Exploitation.as_str(),
        crop_type = Columns::CropType.as_str(),
        has_manager = Columns::HasManager.as_str(),
    );
    conn.execute(
        &sql,
        params![
            plot.name,
            plot.coordinates,
            plot.coordinates.srid(),
            plot.area,
            plot.exploitation,
            CropType::as_blank_str(plot.crop_type),
            plot.has_manager,
        ],
    )
    .map_err(map_integrity_error)?;
    select_by_id(conn.last_insert_rowid(), conn)
}

pub fn select(filter: &Filter, conn: &Connection) -> Result<Vec<Plot>> {
    let mut conditions = vec![];
    if filter.crop_type.is_some() {
        conditions.push(format!("AND {} = :crop_type", Columns::CropType.as_str()));
    }
    if filter.has_manager.is_some() {
        conditions.push(format!("AND {} = :has_manager", Columns::HasManager.as_str()));
    }
    if filter.exploitation.is_some() {
        conditions.push(format!("AND {} = :exploitation", Columns::Exploitation.as_str()));
    }
    if filter.updated_since.is_some() {
        conditions.push(format!("AND {} > :updated_since", Columns::UpdatedAt.as_str()));
    }
    let sql = format!(
        r#"
            SELECT {projection}
            FROM {table}
            WHERE 1
            {conditions}
            ORDER BY {id}
            LIMIT :limit
        "#,
        projection = Plot::projection(),
        table = schema::TABLE_NAME,
        conditions = conditions.join("\n"),
        id = Columns::Id.as_str(),
    );
    let updated_since = filter.updated_since.map(format_timestamp).transpose()?;
    let crop_type = filter.crop_type.map(CropType::as_blank_str);
    let limit = filter.limit.unwrap_or(i64::MAX);
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":limit", &limit as &dyn ToSql)];
    if let Some(crop_type) = &crop_type {
        params.push((":crop_type", crop_type as &dyn ToSql));
    }
    if let Some(has_manager) = &filter.has_manager {
        params.push((":has_manager", has_manager as &dyn ToSql));
    }
    if let Some(exploitation) = &filter.exploitation {
        params.push((":exploitation", exploitation as &dyn ToSql));
    }
    if let Some(updated_since) = &updated_since {
        params.push((":updated_since", updated_since as &dyn ToSql));
    }
    conn.prepare(&sql)?
        .query_map(params.as_slice(), Plot::mapper())?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

pub fn select_by_id(id: i64, conn: &Connection) -> Result<Plot> {
    let sql = format!(
        r#"
            SELECT {projection}
            FROM {table}
            WHERE {id} = ?1
        "#,
        projection = Plot::projection(),
        table = schema::TABLE_NAME,
        id = Columns::Id.as_str(),
    );
    conn.query_row(&sql, params![id], Plot::mapper())
        .optional()?
        .ok_or_else(|| not_found(id))
}

pub fn select_by_name(name: &str, conn: &Connection) -> Result<Option<Plot>> {
    let sql = format!(
        r#"
            SELECT {projection}
            FROM {table}
            WHERE {name} = ?1
        "#,
        projection = Plot::projection(),
        table = schema::TABLE_NAME,
        name = Columns::Name.as_str(),
    );
    conn.query_row(&sql, params![name], Plot::mapper())
        .optional()
        .map_err(Into::into)
}

/// Writes the supplied fields and refreshes `updated_at`. `id` and
/// `created_at` are never touched.
pub fn update(id: i64, changes: &PlotChanges, conn: &Connection) -> Result<Plot> {
    let mut assignments: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(id)];
    let mut set = |column: Columns, value: Box<dyn ToSql>| {
        values.push(value);
        assignments.push(format!("{} = ?{}", column.as_str(), values.len()));
    };
    if let Some(name) = &changes.name {
        set(Columns::Name, Box::new(name.clone()));
    }
    if let Some(coordinates) = &changes.coordinates {
        set(Columns::Coordinates, Box::new(coordinates.clone()));
        set(Columns::Srid, Box::new(coordinates.srid()));
    }
    if let Some(area) = changes.area {
        set(Columns::Area, Box::new(area));
    }
    if let Some(exploitation) = &changes.exploitation {
        set(Columns::Exploitation, Box::new(exploitation.clone()));
    }
    if let Some(crop_type) = changes.crop_type {
        set(Columns::CropType, Box::new(CropType::as_blank_str(crop_type)));
    }
    if let Some(has_manager) = changes.has_manager {
        set(Columns::HasManager, Box::new(has_manager));
    }
    // updated_at has to move forward even when two writes land in the same millisecond
    assignments.push(format!(
        "{updated_at} = CASE WHEN {NOW} > {updated_at} THEN {NOW} ELSE strftime('%Y-%m-%dT%H:%M:%fZ', {updated_at}, '+0.001 seconds') END",
        updated_at = Columns::UpdatedAt.as_str(),
    ));
    let sql = format!(
        r#"
            UPDATE {table}
            SET {assignments}
            WHERE {id} = ?1
        "#,
        table = schema::TABLE_NAME,
        assignments = assignments.join(", "),
        id = Columns::Id.as_str(),
    );
    let updated = conn
        .execute(&sql, params_from_iter(values.iter()))
        .map_err(map_integrity_error)?;
    if updated == 0 {
        return Err(not_found(id));
    }
    select_by_id(id, conn)
}

pub fn delete(id: i64, conn: &Connection) -> Result<()> {
    let sql = format!(
        r#"
            DELETE FROM {table}
            WHERE {id} = ?1
        "#,
        table = schema::TABLE_NAME,
        id = Columns::Id.as_str(),
    );
    match conn.execute(&sql, params![id])? {
        0 => Err(not_found(id)),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub fn set_updated_at(id: i64, updated_at: &OffsetDateTime, conn: &Connection) -> Result<Plot> {
    let sql = format!(
        r#"
            UPDATE {table}
            SET {updated_at} = ?2
            WHERE {id} = ?1
        "#,
        table = schema::TABLE_NAME,
        updated_at = Columns::UpdatedAt.as_str(),
        id = Columns::Id.as_str(),
    );
    conn.execute(&sql, params![id, format_timestamp(*updated_at)?])?;
    select_by_id(id, conn)
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("Plot with id = {id} doesn't exist"))
}

// The only unique column besides the primary key is the plot name
fn map_integrity_error(error: rusqlite::Error) -> Error {
    match &error {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            ValidationError::single(model::NAME, NAME_TAKEN).into()
        }
        _ => error.into(),
    }
}
