use super::model::{self, NewPlot, PlotChanges, Presence};
use crate::db::plot::queries;
use crate::db::plot::schema::Plot;
use crate::error::ValidationError;
use crate::Result;
use deadpool_sqlite::Pool;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::{Map, Value};
use tracing::info;

pub async fn create(raw: Map<String, Value>, pool: &Pool) -> Result<Plot> {
    pool.get()
        .await?
        .interact(move |conn| create_blocking(&raw, conn))
        .await?
}

/// `Presence::Full` replaces every supplied field and requires the required
/// ones, `Presence::Partial` only touches what was supplied.
pub async fn update(
    id: i64,
    raw: Map<String, Value>,
    presence: Presence,
    pool: &Pool,
) -> Result<Plot> {
    pool.get()
        .await?
        .interact(move |conn| update_blocking(id, &raw, presence, conn))
        .await?
}

pub fn create_blocking(raw: &Map<String, Value>, conn: &mut Connection) -> Result<Plot> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let changes = validate(raw, Presence::Full, None, &tx)?;
    let plot = queries::insert(&NewPlot::try_from(changes)?, &tx)?;
    tx.commit()?;
    info!(
        id = plot.id,
        name = %plot.name,
        geometry = plot.coordinates.type_name(),
        "Created plot"
    );
    Ok(plot)
}

pub fn update_blocking(
    id: i64,
    raw: &Map<String, Value>,
    presence: Presence,
    conn: &mut Connection,
) -> Result<Plot> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    queries::select_by_id(id, &tx)?;
    let changes = validate(raw, presence, Some(id), &tx)?;
    let plot = queries::update(id, &changes, &tx)?;
    tx.commit()?;
    info!(
        id = plot.id,
        name = %plot.name,
        coordinates_replaced = changes.coordinates.is_some(),
        "Updated plot"
    );
    Ok(plot)
}

// Field errors and the name uniqueness check are reported together
fn validate(
    raw: &Map<String, Value>,
    presence: Presence,
    plot_id: Option<i64>,
    conn: &Connection,
) -> Result<PlotChanges> {
    let (changes, mut errors) = match PlotChanges::validate(raw, presence) {
        Ok(changes) => (Some(changes), ValidationError::new()),
        Err(errors) => (None, errors),
    };
    if !errors.contains(model::NAME) {
        if let Some(name) = raw.get(model::NAME).and_then(Value::as_str) {
            let taken = queries::select_by_name(name.trim(), conn)?
                .is_some_and(|it| Some(it.id) != plot_id);
            if taken {
                errors.add(model::NAME, queries::NAME_TAKEN);
            }
        }
    }
    match changes {
        Some(changes) if errors.is_empty() => Ok(changes),
        _ => Err(errors.into()),
    }
}

#[cfg(test)]
mod test {
    use crate::db::plot::queries;
    use crate::db::test::conn;
    use crate::plot::model::{CropType, Presence};
    use crate::{Error, Result};
    use serde_json::{json, Map, Value};
    use time::macros::datetime;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn north_field() -> Map<String, Value> {
        raw(json!({
            "name": "North Field",
            "coordinates": {"type": "Point", "coordinates": [-7.5, 33.4]},
            "area": 2.5,
            "exploitation": "Bouskoura",
            "crop_type": "cereals",
            "has_manager": false
        }))
    }

    fn square() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
        })
    }

    fn validation_fields(res: Result<impl std::fmt::Debug>) -> Vec<String> {
        match res {
            Err(Error::Validation(err)) => err.fields().keys().cloned().collect(),
            other => panic!("Expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn create() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        assert_eq!("North Field", plot.name);
        assert_eq!(Some(CropType::Cereals), plot.crop_type);
        assert_eq!(
            json!({"type": "Point", "coordinates": [-7.5, 33.4]}),
            plot.coordinates.encode()
        );
        Ok(())
    }

    #[test]
    fn create_zero_and_negative_area() -> Result<()> {
        let mut conn = conn();
        let mut raw = north_field();
        raw.insert("area".into(), json!(-1));
        assert_eq!(
            vec!["area"],
            validation_fields(super::create_blocking(&raw, &mut conn))
        );
        raw.insert("area".into(), json!(0));
        assert_eq!(0.0, super::create_blocking(&raw, &mut conn)?.area);
        Ok(())
    }

    #[test]
    fn create_duplicate_name() -> Result<()> {
        let mut conn = conn();
        let mut raw = north_field();
        raw.insert("name".into(), json!("Field A"));
        super::create_blocking(&raw, &mut conn)?;
        assert_eq!(
            vec!["name"],
            validation_fields(super::create_blocking(&raw, &mut conn))
        );
        Ok(())
    }

    #[test]
    fn create_reports_duplicate_name_with_other_errors() -> Result<()> {
        let mut conn = conn();
        super::create_blocking(&north_field(), &mut conn)?;
        let mut raw = north_field();
        raw.insert("crop_type".into(), json!("minerals"));
        assert_eq!(
            vec!["crop_type", "name"],
            validation_fields(super::create_blocking(&raw, &mut conn))
        );
        Ok(())
    }

    #[test]
    fn create_invalid_coordinates_stores_nothing() -> Result<()> {
        let mut conn = conn();
        let mut raw = north_field();
        raw.insert(
            "coordinates".into(),
            json!({"type": "Polygon", "coordinates": "not-an-array"}),
        );
        assert_eq!(
            vec!["coordinates"],
            validation_fields(super::create_blocking(&raw, &mut conn))
        );
        assert!(queries::select(&Default::default(), &conn)?.is_empty());
        Ok(())
    }

    #[test]
    fn patch_without_coordinates_keeps_geometry() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        let patched = super::update_blocking(
            plot.id,
            &raw(json!({"has_manager": true})),
            Presence::Partial,
            &mut conn,
        )?;
        assert_eq!(plot.coordinates, patched.coordinates);
        assert!(patched.has_manager);
        Ok(())
    }

    #[test]
    fn patch_with_polygon_replaces_geometry() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        let plot = queries::set_updated_at(plot.id, &datetime!(2020-01-01 00:00 UTC), &conn)?;
        let patched = super::update_blocking(
            plot.id,
            &raw(json!({"coordinates": square()})),
            Presence::Partial,
            &mut conn,
        )?;
        assert_eq!(square(), patched.coordinates.encode());
        assert!(patched.updated_at > plot.updated_at);
        assert_eq!(plot.created_at, patched.created_at);
        Ok(())
    }

    #[test]
    fn patch_is_atomic() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        let res = super::update_blocking(
            plot.id,
            &raw(json!({
                "name": "Renamed",
                "coordinates": {"type": "Point", "coordinates": "nope"}
            })),
            Presence::Partial,
            &mut conn,
        );
        assert_eq!(vec!["coordinates"], validation_fields(res));
        assert_eq!(plot, queries::select_by_id(plot.id, &conn)?);
        Ok(())
    }

    #[test]
    fn patch_keeps_own_name() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        let patched = super::update_blocking(
            plot.id,
            &raw(json!({"name": "North Field", "area": 3.0})),
            Presence::Partial,
            &mut conn,
        )?;
        assert_eq!(3.0, patched.area);
        Ok(())
    }

    #[test]
    fn patch_to_taken_name() -> Result<()> {
        let mut conn = conn();
        super::create_blocking(&north_field(), &mut conn)?;
        let mut other = north_field();
        other.insert("name".into(), json!("South Field"));
        let other = super::create_blocking(&other, &mut conn)?;
        let res = super::update_blocking(
            other.id,
            &raw(json!({"name": "North Field"})),
            Presence::Partial,
            &mut conn,
        );
        assert_eq!(vec!["name"], validation_fields(res));
        Ok(())
    }

    #[test]
    fn put_requires_required_fields() -> Result<()> {
        let mut conn = conn();
        let plot = super::create_blocking(&north_field(), &mut conn)?;
        let res = super::update_blocking(
            plot.id,
            &raw(json!({"area": 1.0})),
            Presence::Full,
            &mut conn,
        );
        assert_eq!(vec!["coordinates", "name"], validation_fields(res));
        Ok(())
    }

    #[test]
    fn update_not_found() {
        let mut conn = conn();
        let res = super::update_blocking(1, &north_field(), Presence::Full, &mut conn);
        assert!(matches!(res, Err(Error::NotFound(_))));
    }
}
