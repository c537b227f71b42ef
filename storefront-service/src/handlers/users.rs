use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use storefront_shared::UserRole;
use tracing::info;

use super::require_text;
use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub phone_number: Option<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_text("name", &request.name)?;
    require_text("email", &request.email)?;

    let mut conn = state.pool.get().await?;

    let user = diesel::insert_into(users::table)
        .values(&NewUser {
            name: request.name,
            email: request.email,
            phone_number: request.phone_number,
            role: request.role.as_str().to_string(),
        })
        .get_result::<User>(&mut conn)
        .await?;

    info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<User>> {
    let mut conn = state.pool.get().await?;

    let user = users::table
        .find(user_id)
        .first::<User>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_text("name", &request.name)?;

    let mut conn = state.pool.get().await?;

    let user = diesel::update(users::table.find(user_id))
        .set(&UserChanges {
            name: request.name,
            phone_number: request.phone_number,
            updated_at: Utc::now(),
        })
        .get_result::<User>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}
