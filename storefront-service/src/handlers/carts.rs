use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use storefront_shared::ensure_positive_quantity;
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CreateCartRequest {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub cart_id: Uuid,
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: ShoppingCart,
    pub items: Vec<CartLine>,
}

fn validate_item(cart_id: Uuid, quantity: i32) -> ApiResult<()> {
    if cart_id.is_nil() {
        return Err(ApiError::bad_request("cart_id is required"));
    }
    ensure_positive_quantity(quantity)?;
    Ok(())
}

async fn touch_cart(conn: &mut AsyncPgConnection, cart_id: Uuid) -> QueryResult<()> {
    diesel::update(shopping_carts::table.find(cart_id))
        .set(shopping_carts::updated_at.eq(Utc::now()))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn create_cart(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateCartRequest>,
) -> ApiResult<(StatusCode, Json<ShoppingCart>)> {
    let mut conn = state.pool.get().await?;

    let cart = diesel::insert_into(shopping_carts::table)
        .values(&NewShoppingCart {
            id: Uuid::new_v4(),
            user_id: request.user_id,
        })
        .get_result::<ShoppingCart>(&mut conn)
        .await?;

    info!("Created cart {} for user {}", cart.id, cart.user_id);
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn get_cart_by_user(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CartQuery>,
) -> ApiResult<Json<CartView>> {
    let mut conn = state.pool.get().await?;

    let cart = shopping_carts::table
        .filter(shopping_carts::user_id.eq(query.user_id))
        .order(shopping_carts::created_at.desc())
        .first::<ShoppingCart>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Cart"))?;

    let items = CartItem::belonging_to(&cart)
        .inner_join(products::table)
        .order(cart_items::id.asc())
        .load::<(CartItem, Product)>(&mut conn)
        .await?
        .into_iter()
        .map(|(item, product)| CartLine { item, product })
        .collect();

    Ok(Json(CartView { cart, items }))
}

pub async fn delete_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(shopping_carts::table.find(cart_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Cart"));
    }

    info!("Deleted cart {}", cart_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_cart_item(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddCartItemRequest>,
) -> ApiResult<(StatusCode, Json<CartItem>)> {
    validate_item(request.cart_id, request.quantity)?;

    let mut conn = state.pool.get().await?;

    let cart_exists = shopping_carts::table
        .find(request.cart_id)
        .select(shopping_carts::id)
        .first::<Uuid>(&mut conn)
        .await
        .optional()?
        .is_some();
    if !cart_exists {
        return Err(ApiError::not_found("Cart"));
    }

    let item = diesel::insert_into(cart_items::table)
        .values(&NewCartItem {
            cart_id: request.cart_id,
            product_id: request.product_id,
            quantity: request.quantity,
        })
        .get_result::<CartItem>(&mut conn)
        .await?;
    touch_cart(&mut conn, item.cart_id).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateCartItemRequest>,
) -> ApiResult<Json<CartItem>> {
    ensure_positive_quantity(request.quantity)?;

    let mut conn = state.pool.get().await?;

    let item = diesel::update(cart_items::table.find(item_id))
        .set(cart_items::quantity.eq(request.quantity))
        .get_result::<CartItem>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Cart item"))?;
    touch_cart(&mut conn, item.cart_id).await?;

    Ok(Json(item))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(cart_items::table.find(item_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Cart item"));
    }

    Ok(StatusCode::NO_CONTENT)
}
