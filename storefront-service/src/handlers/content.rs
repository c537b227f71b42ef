use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use storefront_shared::BannerPosition;
use tracing::info;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct BannerRequest {
    pub position: String,
    #[serde(alias = "image")]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BannerAdded {
    pub message: String,
    pub stored: usize,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct BannerImages {
    pub left_banner: Vec<String>,
    pub right_banner_1: Vec<String>,
    pub right_banner_2: Vec<String>,
}

/// Decodes every image up front so that one bad entry stores nothing.
fn decode_images(position: BannerPosition, images: &[String]) -> ApiResult<Vec<NewContentImage>> {
    if images.is_empty() {
        return Err(ApiError::bad_request("at least one image is required"));
    }
    images
        .iter()
        .map(|encoded| -> ApiResult<NewContentImage> {
            Ok(NewContentImage {
                position: position.as_str().to_string(),
                image: STANDARD.decode(encoded.trim())?,
            })
        })
        .collect()
}

/// Buckets stored rows by position, re-encoding the bytes. Input order is kept.
fn group_banners(rows: Vec<ContentImage>) -> BannerImages {
    let mut banners = BannerImages::default();
    for row in rows {
        let bucket = match row.position.parse::<BannerPosition>() {
            Ok(BannerPosition::LeftBanner) => &mut banners.left_banner,
            Ok(BannerPosition::RightBanner1) => &mut banners.right_banner_1,
            Ok(BannerPosition::RightBanner2) => &mut banners.right_banner_2,
            Err(_) => continue,
        };
        bucket.push(STANDARD.encode(&row.image));
    }
    banners
}

pub async fn add_banner_images(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BannerRequest>,
) -> ApiResult<(StatusCode, Json<BannerAdded>)> {
    let position: BannerPosition = request.position.parse()?;
    let rows = decode_images(position, &request.images)?;

    let mut conn = state.pool.get().await?;

    let stored = diesel::insert_into(content_images::table)
        .values(&rows)
        .execute(&mut conn)
        .await?;

    info!("Stored {} banner images at {}", stored, position);
    Ok((
        StatusCode::CREATED,
        Json(BannerAdded {
            message: "content added successfully".to_string(),
            stored,
        }),
    ))
}

pub async fn get_banner_images(State(state): State<AppState>) -> ApiResult<Json<BannerImages>> {
    let mut conn = state.pool.get().await?;

    let rows = content_images::table
        .order((content_images::created_at.desc(), content_images::id.desc()))
        .load::<ContentImage>(&mut conn)
        .await?;

    Ok(Json(group_banners(rows)))
}
