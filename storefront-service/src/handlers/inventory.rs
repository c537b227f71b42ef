use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use storefront_shared::{available, ensure_positive_quantity, restocked_level, ChangeType};
use tracing::info;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub inventory: Inventory,
    pub available: i32,
}

impl From<Inventory> for InventoryView {
    fn from(inventory: Inventory) -> Self {
        Self {
            available: available(inventory.stock_level, inventory.in_open),
            inventory,
        }
    }
}

/// Adds stock: the first restock creates the row, later ones accumulate onto
/// `stock_level`. Reservations are left untouched. A restock that would push
/// `stock_level` past `i32::MAX` is refused before the upsert runs.
pub async fn restock_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RestockRequest>,
) -> ApiResult<Json<InventoryView>> {
    let RestockRequest {
        product_id,
        quantity,
    } = request;
    ensure_positive_quantity(quantity)?;

    let mut conn = state.pool.get().await?;
    let now = Utc::now();

    let inventory = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let current = inventories::table
                    .filter(inventories::product_id.eq(product_id))
                    .select(inventories::stock_level)
                    .for_update()
                    .first::<i32>(conn)
                    .await
                    .optional()?;
                restocked_level(product_id, current.unwrap_or(0), quantity)?;

                let inventory = diesel::insert_into(inventories::table)
                    .values(&NewInventory {
                        product_id,
                        stock_level: quantity,
                        in_open: 0,
                        change_type: ChangeType::Restock.as_str().to_string(),
                        change_date: now,
                    })
                    .on_conflict(inventories::product_id)
                    .do_update()
                    .set((
                        inventories::stock_level
                            .eq(inventories::stock_level + excluded(inventories::stock_level)),
                        inventories::change_type.eq(ChangeType::Restock.as_str()),
                        inventories::change_date.eq(now),
                        inventories::updated_at.eq(now),
                    ))
                    .get_result::<Inventory>(conn)
                    .await?;
                Ok(inventory)
            })
        })
        .await?;

    info!(
        "Restocked product {} by {}, stock level now {}",
        inventory.product_id, quantity, inventory.stock_level
    );
    Ok(Json(inventory.into()))
}

pub async fn get_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<Json<InventoryView>> {
    let mut conn = state.pool.get().await?;

    let inventory = inventories::table
        .filter(inventories::product_id.eq(product_id))
        .first::<Inventory>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Inventory"))?;

    Ok(Json(inventory.into()))
}
