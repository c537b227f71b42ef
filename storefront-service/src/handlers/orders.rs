//! Order placement and lifecycle.
//!
//! Placing an order reserves stock: every line raises its product's
//! `in_open` counter with a single conditional update that only matches while
//! `stock_level - in_open >= quantity`. The order, its lines, the reservations
//! and the shipping address commit or roll back together.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use storefront_shared::{
    available, ensure_available, ensure_positive_quantity, ChangeType, DomainError, OrderStatus,
    StockEffect,
};
use tracing::{info, warn};

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::identifiers::order_identifier;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingAddressInput {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i32,
    pub currency: Option<String>,
    #[serde(default)]
    pub discount_amount: BigDecimal,
    #[serde(default)]
    pub shipping_cost: BigDecimal,
    pub items: Vec<OrderItemInput>,
    pub shipping_address: Option<ShippingAddressInput>,
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

fn validate(request: &CreateOrderRequest) -> ApiResult<()> {
    if request.items.is_empty() {
        return Err(ApiError::bad_request("order must contain at least one item"));
    }
    for item in &request.items {
        ensure_positive_quantity(item.quantity)?;
    }
    if request.discount_amount < BigDecimal::zero() || request.shipping_cost < BigDecimal::zero() {
        return Err(ApiError::bad_request(
            "discount_amount and shipping_cost must not be negative",
        ));
    }
    if let Some(currency) = &request.currency {
        if currency.chars().count() != 3 {
            return Err(ApiError::bad_request(format!(
                "currency must be a 3 letter code, got '{}'",
                currency
            )));
        }
    }
    Ok(())
}

/// Explains why the conditional reservation for `product_id` matched no row.
fn reservation_error(product_id: i32, row: Option<&Inventory>, requested: i32) -> ApiError {
    match row {
        None => ApiError::bad_request(format!("no inventory for product {}", product_id)),
        Some(row) => match ensure_available(product_id, row.stock_level, row.in_open, requested) {
            Err(err) => err.into(),
            // The row moved between the update and this read.
            Ok(()) => DomainError::InsufficientStock {
                product_id,
                available: available(row.stock_level, row.in_open),
                requested,
            }
            .into(),
        },
    }
}

/// `item_price - discount + shipping`, rejecting a discount larger than the
/// order value.
fn order_total(
    item_price: &BigDecimal,
    discount_amount: &BigDecimal,
    shipping_cost: &BigDecimal,
) -> ApiResult<BigDecimal> {
    if discount_amount > item_price {
        return Err(ApiError::bad_request("discount_amount exceeds the item total"));
    }
    Ok(item_price - discount_amount + shipping_cost)
}

/// Raises `in_open` by `quantity` if enough unreserved stock is left.
async fn reserve_stock(conn: &mut AsyncPgConnection, product_id: i32, quantity: i32) -> ApiResult<()> {
    let now = Utc::now();
    let reserved = diesel::update(
        inventories::table
            .filter(inventories::product_id.eq(product_id))
            .filter((inventories::stock_level - inventories::in_open).ge(quantity)),
    )
    .set((
        inventories::in_open.eq(inventories::in_open + quantity),
        inventories::change_type.eq(ChangeType::Purchase.as_str()),
        inventories::change_date.eq(now),
        inventories::updated_at.eq(now),
    ))
    .execute(conn)
    .await?;

    if reserved == 0 {
        let row = inventories::table
            .filter(inventories::product_id.eq(product_id))
            .first::<Inventory>(conn)
            .await
            .optional()?;
        let err = reservation_error(product_id, row.as_ref(), quantity);
        warn!("Reservation rejected: {}", err);
        return Err(err);
    }
    Ok(())
}

async fn load_order_view(conn: &mut AsyncPgConnection, order: Order) -> QueryResult<OrderView> {
    let items = OrderItem::belonging_to(&order)
        .inner_join(products::table)
        .order(order_items::id.asc())
        .load::<(OrderItem, Product)>(conn)
        .await?
        .into_iter()
        .map(|(item, product)| OrderLine { item, product })
        .collect();

    let shipping_address = ShippingAddress::belonging_to(&order)
        .first::<ShippingAddress>(conn)
        .await
        .optional()?;

    Ok(OrderView {
        order,
        items,
        shipping_address,
    })
}

pub async fn create_order(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    validate(&request)?;

    let mut conn = state.pool.get().await?;
    let identifier = order_identifier();

    let order = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let currency = match request.currency {
                    Some(currency) => currency,
                    None => products::table
                        .find(request.items[0].product_id)
                        .select(products::currency)
                        .first::<String>(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| ApiError::not_found("Product"))?,
                };

                let order = diesel::insert_into(orders::table)
                    .values(&NewOrder {
                        order_identifier: identifier,
                        user_id: request.user_id,
                        order_status: OrderStatus::Pending.as_str().to_string(),
                        currency,
                        item_price: BigDecimal::zero(),
                        discount_amount: request.discount_amount.clone(),
                        shipping_cost: request.shipping_cost.clone(),
                        total_price: BigDecimal::zero(),
                    })
                    .get_result::<Order>(conn)
                    .await?;

                let mut item_price = BigDecimal::zero();
                for item in &request.items {
                    let price = products::table
                        .find(item.product_id)
                        .select(products::price)
                        .first::<BigDecimal>(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| {
                            ApiError::NotFound(format!("Product {} not found", item.product_id))
                        })?;

                    reserve_stock(conn, item.product_id, item.quantity).await?;

                    diesel::insert_into(order_items::table)
                        .values(&NewOrderItem {
                            order_id: order.id,
                            product_id: item.product_id,
                            quantity: item.quantity,
                            price_at_purchase: price.clone(),
                        })
                        .execute(conn)
                        .await?;

                    item_price += price * BigDecimal::from(item.quantity);
                }

                let total_price =
                    order_total(&item_price, &request.discount_amount, &request.shipping_cost)?;
                let order = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::item_price.eq(item_price),
                        orders::total_price.eq(total_price),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .get_result::<Order>(conn)
                    .await?;

                if let Some(address) = request.shipping_address {
                    diesel::insert_into(shipping_addresses::table)
                        .values(&NewShippingAddress {
                            order_id: order.id,
                            address_line1: address.address_line1,
                            address_line2: address.address_line2,
                            city: address.city,
                            state: address.state,
                            postal_code: address.postal_code,
                            country: address.country,
                        })
                        .execute(conn)
                        .await?;
                }

                Ok(order)
            })
        })
        .await?;

    info!(
        "Created order {} ({}) for user {}, total {}",
        order.id, order.order_identifier, order.user_id, order.total_price
    );

    let view = load_order_view(&mut conn, order).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> ApiResult<Json<OrderView>> {
    let mut conn = state.pool.get().await?;

    let order = orders::table
        .find(order_id)
        .first::<Order>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Order"))?;

    Ok(Json(load_order_view(&mut conn, order).await?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> ApiResult<Json<Vec<OrderSummary>>> {
    let mut conn = state.pool.get().await?;

    let found = orders::table
        .filter(orders::user_id.eq(query.user_id))
        .order((orders::created_at.desc(), orders::id.desc()))
        .load::<Order>(&mut conn)
        .await?;

    let items = OrderItem::belonging_to(&found)
        .order(order_items::id.asc())
        .load::<OrderItem>(&mut conn)
        .await?
        .grouped_by(&found);

    let summaries = found
        .into_iter()
        .zip(items)
        .map(|(order, items)| OrderSummary { order, items })
        .collect();

    Ok(Json(summaries))
}

/// Applies a status transition and its inventory effect to every line.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateOrderStatusRequest>,
) -> ApiResult<Json<Order>> {
    let mut conn = state.pool.get().await?;
    let target = request.status;

    let order = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let order = orders::table
                    .find(order_id)
                    .for_update()
                    .first::<Order>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Order"))?;

                let current: OrderStatus = order
                    .order_status
                    .parse()
                    .map_err(|err: DomainError| ApiError::Internal(err.to_string()))?;
                let effect = current.transition(target)?;

                let lines = OrderItem::belonging_to(&order)
                    .load::<OrderItem>(conn)
                    .await?;
                let now = Utc::now();
                for line in &lines {
                    let target_row = inventories::table.filter(inventories::product_id.eq(line.product_id));
                    match effect {
                        StockEffect::None => {}
                        StockEffect::Release => {
                            diesel::update(target_row)
                                .set((
                                    inventories::in_open.eq(inventories::in_open - line.quantity),
                                    inventories::updated_at.eq(now),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        StockEffect::Consume => {
                            diesel::update(target_row)
                                .set((
                                    inventories::stock_level.eq(inventories::stock_level - line.quantity),
                                    inventories::in_open.eq(inventories::in_open - line.quantity),
                                    inventories::change_type.eq(ChangeType::Purchase.as_str()),
                                    inventories::change_date.eq(now),
                                    inventories::updated_at.eq(now),
                                ))
                                .execute(conn)
                                .await?;
                        }
                    }
                }

                let order = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::order_status.eq(target.as_str()),
                        orders::updated_at.eq(now),
                    ))
                    .get_result::<Order>(conn)
                    .await?;

                Ok(order)
            })
        })
        .await?;

    info!("Order {} moved to {}", order.id, order.order_status);
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn request(items: Vec<(i32, i32)>) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: 1,
            currency: None,
            discount_amount: BigDecimal::zero(),
            shipping_cost: BigDecimal::zero(),
            items: items
                .into_iter()
                .map(|(product_id, quantity)| OrderItemInput { product_id, quantity })
                .collect(),
            shipping_address: None,
        }
    }

    fn inventory(stock_level: i32, in_open: i32) -> Inventory {
        Inventory {
            id: 1,
            product_id: 7,
            stock_level,
            in_open,
            change_type: "restock".to_string(),
            change_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_order_rejected() {
        assert!(matches!(validate(&request(vec![])), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        assert!(validate(&request(vec![(1, 2), (2, 0)])).is_err());
        assert!(validate(&request(vec![(1, -1)])).is_err());
        assert!(validate(&request(vec![(1, 1), (1, 4)])).is_ok());
    }

    #[test]
    fn test_negative_discount_rejected() {
        let mut req = request(vec![(1, 1)]);
        req.discount_amount = decimal("-5");
        assert!(validate(&req).is_err());
    }

    #[test]
    fn test_missing_inventory_is_reported() {
        match reservation_error(7, None, 1) {
            ApiError::BadRequest(message) => assert_eq!(message, "no inventory for product 7"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_insufficient_stock_reports_available_units() {
        // stock 10 with 8 reserved by two earlier lines of 4
        match reservation_error(7, Some(&inventory(10, 8)), 4) {
            ApiError::BadRequest(message) => {
                assert!(message.contains("Not enough stock available for product 7"));
                assert!(message.contains("available 2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_order_total() {
        let total = order_total(&decimal("100.00"), &decimal("10.00"), &decimal("5.50")).unwrap();
        assert_eq!(total, decimal("95.50"));
        assert!(order_total(&decimal("10.00"), &decimal("10.01"), &decimal("0")).is_err());
    }
}
