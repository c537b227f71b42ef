use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use super::require_text;
use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CreateBrandRequest {
    pub name: String,
}

pub async fn create_brand(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateBrandRequest>,
) -> ApiResult<(StatusCode, Json<Brand>)> {
    require_text("name", &request.name)?;

    let mut conn = state.pool.get().await?;

    let brand = diesel::insert_into(brands::table)
        .values(&NewBrand { name: request.name })
        .get_result::<Brand>(&mut conn)
        .await?;

    Ok((StatusCode::CREATED, Json(brand)))
}

pub async fn list_brands(State(state): State<AppState>) -> ApiResult<Json<Vec<Brand>>> {
    let mut conn = state.pool.get().await?;

    let brands = brands::table
        .order(brands::name.asc())
        .load::<Brand>(&mut conn)
        .await?;

    Ok(Json(brands))
}

pub async fn get_brand(
    State(state): State<AppState>,
    Path(brand_id): Path<i32>,
) -> ApiResult<Json<Brand>> {
    let mut conn = state.pool.get().await?;

    let brand = brands::table
        .find(brand_id)
        .first::<Brand>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Brand"))?;

    Ok(Json(brand))
}
