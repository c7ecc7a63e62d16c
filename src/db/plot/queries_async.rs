use super::queries::{self, Filter};
use super::schema::Plot;
use crate::Result;
use deadpool_sqlite::Pool;
#[cfg(test)]
use time::OffsetDateTime;

pub async fn select(filter: Filter, pool: &Pool) -> Result<Vec<Plot>> {
    pool.get()
        .await?
        .interact(move |conn| queries::select(&filter, conn))
        .await?
}

pub async fn select_by_id(id: i64, pool: &Pool) -> Result<Plot> {
    pool.get()
        .await?
        .interact(move |conn| queries::select_by_id(id, conn))
        .await?
}

pub async fn delete(id: i64, pool: &Pool) -> Result<()> {
    pool.get()
        .await?
        .interact(move |conn| queries::delete(id, conn))
        .await?
}

#[cfg(test)]
pub async fn set_updated_at(id: i64, updated_at: OffsetDateTime, pool: &Pool) -> Result<Plot> {
    pool.get()
        .await?
        .interact(move |conn| queries::set_updated_at(id, &updated_at, conn))
        .await?
}
