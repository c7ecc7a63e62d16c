use crate::db;
use crate::db::plot::queries::Filter;
use crate::db::plot::schema::Plot;
use crate::plot::model::{blank_crop_type, CropType, FieldSpec, Presence, FIELDS};
use crate::plot::service;
use crate::rest::error::{RestApiError, RestResult};
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post, put, route, HttpResponse};
use deadpool_sqlite::Pool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

#[derive(Deserialize)]
pub struct GetArgs {
    crop_type: Option<String>,
    has_manager: Option<bool>,
    exploitation: Option<String>,
    #[serde(default)]
    #[serde(with = "time::serde::rfc3339::option")]
    updated_since: Option<OffsetDateTime>,
    limit: Option<i64>,
}

impl TryFrom<GetArgs> for Filter {
    type Error = RestApiError;

    fn try_from(args: GetArgs) -> Result<Self, Self::Error> {
        let crop_type = args
            .crop_type
            .map(|it| {
                CropType::parse_blank(&it).map_err(|_| {
                    RestApiError::invalid_input(format!("Unknown crop_type: {it}"))
                })
            })
            .transpose()?;
        if args.limit.is_some_and(|it| it < 0) {
            return Err(RestApiError::invalid_input("limit can't be negative"));
        }
        Ok(Filter {
            crop_type,
            has_manager: args.has_manager,
            exploitation: args.exploitation,
            updated_since: args.updated_since,
            limit: args.limit,
        })
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub coordinates: Value,
    pub area: f64,
    pub exploitation: String,
    #[serde(with = "blank_crop_type")]
    pub crop_type: Option<CropType>,
    pub has_manager: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Plot> for Item {
    fn from(val: Plot) -> Self {
        Item {
            id: val.id,
            coordinates: val.coordinates.encode(),
            name: val.name,
            area: val.area,
            exploitation: val.exploitation,
            crop_type: val.crop_type,
            has_manager: val.has_manager,
            created_at: val.created_at,
            updated_at: val.updated_at,
        }
    }
}

impl From<Plot> for Json<Item> {
    fn from(val: Plot) -> Self {
        Json(val.into())
    }
}

#[derive(Serialize)]
pub struct Metadata {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

#[get("")]
pub async fn get(args: Query<GetArgs>, pool: Data<Pool>) -> RestResult<Vec<Item>> {
    let filter = Filter::try_from(args.into_inner())?;
    let plots = db::plot::queries_async::select(filter, &pool).await?;
    Ok(Json(plots.into_iter().map(Into::into).collect()))
}

#[get("{id}")]
pub async fn get_by_id(id: Path<i64>, pool: Data<Pool>) -> RestResult<Item> {
    db::plot::queries_async::select_by_id(*id, &pool)
        .await
        .map(Into::into)
        .map_err(Into::into)
}

#[post("")]
pub async fn post(
    args: Json<Map<String, Value>>,
    pool: Data<Pool>,
) -> Result<HttpResponse, RestApiError> {
    let plot = service::create(args.into_inner(), &pool).await?;
    Ok(HttpResponse::Created().json(Item::from(plot)))
}

#[put("{id}")]
pub async fn put(
    id: Path<i64>,
    args: Json<Map<String, Value>>,
    pool: Data<Pool>,
) -> RestResult<Item> {
    service::update(*id, args.into_inner(), Presence::Full, &pool)
        .await
        .map(Into::into)
        .map_err(Into::into)
}

#[patch("{id}")]
pub async fn patch(
    id: Path<i64>,
    args: Json<Map<String, Value>>,
    pool: Data<Pool>,
) -> RestResult<Item> {
    service::update(*id, args.into_inner(), Presence::Partial, &pool)
        .await
        .map(Into::into)
        .map_err(Into::into)
}

#[delete("{id}")]
pub async fn delete(id: Path<i64>, pool: Data<Pool>) -> Result<HttpResponse, RestApiError> {
    db::plot::queries_async::delete(*id, &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[route("", method = "OPTIONS")]
pub async fn options() -> Json<Metadata> {
    Json(Metadata {
        name: "Plot",
        fields: &FIELDS,
    })
}
