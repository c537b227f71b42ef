use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use storefront_shared::DomainError;
use tracing::info;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub user_id: i32,
    pub product_id: i32,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize, Queryable)]
pub struct Reviewer {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user: Reviewer,
}

fn ensure_rating(rating: i32) -> ApiResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(DomainError::InvalidRating(rating).into());
    }
    Ok(())
}

pub async fn create_review(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    ensure_rating(request.rating)?;

    let mut conn = state.pool.get().await?;

    let review = diesel::insert_into(reviews::table)
        .values(&NewReview {
            user_id: request.user_id,
            product_id: request.product_id,
            rating: request.rating,
            comment: request.comment,
            created_at: request.created_at.unwrap_or_else(Utc::now),
        })
        .get_result::<Review>(&mut conn)
        .await?;

    info!("User {} reviewed product {}", review.user_id, review.product_id);
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<i32>,
) -> ApiResult<Json<ReviewView>> {
    let mut conn = state.pool.get().await?;

    let (review, user) = reviews::table
        .inner_join(users::table)
        .filter(reviews::id.eq(review_id))
        .select((reviews::all_columns, (users::id, users::name)))
        .first::<(Review, Reviewer)>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Review"))?;

    Ok(Json(ReviewView { review, user }))
}

pub async fn get_reviews_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    let mut conn = state.pool.get().await?;

    let found = reviews::table
        .inner_join(users::table)
        .filter(reviews::product_id.eq(product_id))
        .order((reviews::created_at.desc(), reviews::id.desc()))
        .select((reviews::all_columns, (users::id, users::name)))
        .load::<(Review, Reviewer)>(&mut conn)
        .await?
        .into_iter()
        .map(|(review, user)| ReviewView { review, user })
        .collect();

    Ok(Json(found))
}

pub async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    ensure_rating(request.rating)?;

    let mut conn = state.pool.get().await?;

    let review = diesel::update(reviews::table.find(review_id))
        .set(&ReviewChanges {
            rating: request.rating,
            comment: request.comment,
        })
        .get_result::<Review>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Review"))?;

    Ok(Json(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Path(review_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(reviews::table.find(review_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Review"));
    }

    Ok(StatusCode::NO_CONTENT)
}
