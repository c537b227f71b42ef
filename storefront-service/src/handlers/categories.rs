use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use storefront_shared::{ensure_acyclic, CategoryType, DomainError};
use tracing::info;

use super::catalog::load_category_path;
use super::require_text;
use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    pub category_type: Option<CategoryType>,
    pub parent_id: Option<i32>,
    pub nested: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub sub_categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CategoryListing {
    Flat(Vec<Category>),
    Nested(Vec<CategoryNode>),
}

#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

/// Checks the type string and the parent rule shared by create and update.
fn validate(request: &CategoryRequest) -> ApiResult<CategoryType> {
    require_text("name", &request.name)?;
    let category_type: CategoryType = request.category_type.parse()?;
    match (category_type, request.parent_id) {
        (CategoryType::Child, None) => Err(DomainError::MissingParentCategory.into()),
        (CategoryType::Parent, Some(_)) => Err(DomainError::UnexpectedParentCategory.into()),
        _ => Ok(category_type),
    }
}

async fn ensure_parent_exists(conn: &mut AsyncPgConnection, parent_id: Option<i32>) -> ApiResult<()> {
    if let Some(parent_id) = parent_id {
        let found = categories::table
            .find(parent_id)
            .select(categories::id)
            .first::<i32>(conn)
            .await
            .optional()?;
        if found.is_none() {
            return Err(ApiError::bad_request(format!(
                "parent category {} does not exist",
                parent_id
            )));
        }
    }
    Ok(())
}

pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category_type = validate(&request)?;

    let mut conn = state.pool.get().await?;
    ensure_parent_exists(&mut conn, request.parent_id).await?;

    let category = diesel::insert_into(categories::table)
        .values(&NewCategory {
            name: request.name,
            category_type: category_type.as_str().to_string(),
            parent_id: request.parent_id,
        })
        .get_result::<Category>(&mut conn)
        .await?;

    info!("Created category {} ({})", category.id, category.category_type);
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> ApiResult<Json<CategoryListing>> {
    let mut conn = state.pool.get().await?;

    if query.nested.unwrap_or(false) {
        let all = categories::table
            .order(categories::id.asc())
            .load::<Category>(&mut conn)
            .await?;
        return Ok(Json(CategoryListing::Nested(nest(all))));
    }

    let mut select = categories::table.into_boxed();
    if let Some(category_type) = query.category_type {
        select = select.filter(categories::category_type.eq(category_type.as_str()));
    }
    if let Some(parent_id) = query.parent_id {
        select = select.filter(categories::parent_id.eq(parent_id));
    }

    let found = select
        .order(categories::id.asc())
        .load::<Category>(&mut conn)
        .await?;

    Ok(Json(CategoryListing::Flat(found)))
}

/// Top-level categories, each with its direct sub-categories.
fn nest(all: Vec<Category>) -> Vec<CategoryNode> {
    let mut children: HashMap<i32, Vec<Category>> = HashMap::new();
    let mut roots = Vec::new();
    for category in all {
        match category.parent_id {
            Some(parent_id) => children.entry(parent_id).or_default().push(category),
            None => roots.push(category),
        }
    }
    roots
        .into_iter()
        .map(|category| CategoryNode {
            sub_categories: children.remove(&category.id).unwrap_or_default(),
            category,
        })
        .collect()
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> ApiResult<Json<CategoryDetail>> {
    let mut conn = state.pool.get().await?;

    let category = categories::table
        .find(category_id)
        .first::<Category>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    let products = products::table
        .filter(products::category_id.eq(category_id))
        .order(products::id.asc())
        .load::<Product>(&mut conn)
        .await?;

    Ok(Json(CategoryDetail { category, products }))
}

/// Reparenting walks the new parent's ancestry and refuses a move that would
/// place the category inside its own subtree. The table is locked for the
/// check so two concurrent moves cannot close a loop between them.
pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> ApiResult<Json<Category>> {
    let category_type = validate(&request)?;
    if request.parent_id == Some(category_id) {
        return Err(DomainError::CategoryCycle(category_id).into());
    }

    let mut conn = state.pool.get().await?;
    let category = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                diesel::sql_query("LOCK TABLE categories IN SHARE ROW EXCLUSIVE MODE")
                    .execute(conn)
                    .await?;
                categories::table
                    .find(category_id)
                    .select(categories::id)
                    .first::<i32>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Category"))?;
                ensure_parent_exists(conn, request.parent_id).await?;
                if let Some(parent_id) = request.parent_id {
                    let parent_path = load_category_path(conn, parent_id).await?;
                    ensure_acyclic(category_id, &parent_path)?;
                }

                let category = diesel::update(categories::table.find(category_id))
                    .set(&CategoryChanges {
                        name: request.name,
                        category_type: category_type.as_str().to_string(),
                        parent_id: request.parent_id,
                        updated_at: Utc::now(),
                    })
                    .get_result::<Category>(conn)
                    .await?;
                Ok(category)
            })
        })
        .await?;

    info!("Updated category {}", category.id);
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(categories::table.find(category_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Category"));
    }

    info!("Deleted category {}", category_id);
    Ok(StatusCode::NO_CONTENT)
}
