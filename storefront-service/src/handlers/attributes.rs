use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use super::require_text;
use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct AttributeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub product_id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttributeQuery {
    pub product_id: Option<i32>,
}

pub async fn create_attribute(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AttributeRequest>,
) -> ApiResult<(StatusCode, Json<ProductAttribute>)> {
    require_text("name", &request.name)?;

    let mut conn = state.pool.get().await?;

    let attribute = diesel::insert_into(product_attributes::table)
        .values(&NewProductAttribute {
            name: request.name,
            description: request.description,
            product_id: request.product_id,
        })
        .get_result::<ProductAttribute>(&mut conn)
        .await?;

    Ok((StatusCode::CREATED, Json(attribute)))
}

pub async fn list_attributes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AttributeQuery>,
) -> ApiResult<Json<Vec<ProductAttribute>>> {
    let mut conn = state.pool.get().await?;

    let mut select = product_attributes::table.into_boxed();
    if let Some(product_id) = query.product_id {
        select = select.filter(product_attributes::product_id.eq(product_id));
    }

    let attributes = select
        .order(product_attributes::id.asc())
        .load::<ProductAttribute>(&mut conn)
        .await?;

    Ok(Json(attributes))
}

pub async fn update_attribute(
    State(state): State<AppState>,
    Path(attribute_id): Path<i32>,
    ApiJson(request): ApiJson<AttributeRequest>,
) -> ApiResult<Json<ProductAttribute>> {
    require_text("name", &request.name)?;

    let mut conn = state.pool.get().await?;

    let attribute = diesel::update(product_attributes::table.find(attribute_id))
        .set(&ProductAttributeChanges {
            name: request.name,
            description: request.description,
            product_id: request.product_id,
            updated_at: Utc::now(),
        })
        .get_result::<ProductAttribute>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Product attribute"))?;

    Ok(Json(attribute))
}

pub async fn delete_attribute(
    State(state): State<AppState>,
    Path(attribute_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(product_attributes::table.find(attribute_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Product attribute"));
    }

    Ok(StatusCode::NO_CONTENT)
}
