use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use num_traits::Zero;
use serde::Deserialize;
use storefront_shared::{PaymentMethod, PaymentStatus};
use tracing::info;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::identifiers::transaction_id;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: i32,
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Defaults to the order's total.
    pub amount: Option<BigDecimal>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

pub async fn create_payment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let method: PaymentMethod = request.payment_method.parse()?;
    if let Some(amount) = &request.amount {
        if *amount < BigDecimal::zero() {
            return Err(ApiError::bad_request("amount must not be negative"));
        }
    }

    let mut conn = state.pool.get().await?;

    let order_total = orders::table
        .find(request.order_id)
        .select(orders::total_price)
        .first::<BigDecimal>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Order"))?;

    let payment = diesel::insert_into(payments::table)
        .values(&NewPayment {
            order_id: request.order_id,
            payment_method: method.as_str().to_string(),
            payment_status: request.payment_status.as_str().to_string(),
            amount: request.amount.unwrap_or(order_total),
            transaction_id: Some(request.transaction_id.unwrap_or_else(transaction_id)),
            payment_date: request.payment_date.unwrap_or_else(Utc::now),
        })
        .get_result::<Payment>(&mut conn)
        .await?;

    info!(
        "Recorded {} payment {} for order {}",
        payment.payment_method, payment.id, payment.order_id
    );
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<i32>,
    ApiJson(request): ApiJson<UpdatePaymentStatusRequest>,
) -> ApiResult<Json<Payment>> {
    let mut conn = state.pool.get().await?;

    let payment = diesel::update(payments::table.find(payment_id))
        .set((
            payments::payment_status.eq(request.payment_status.as_str()),
            payments::updated_at.eq(Utc::now()),
        ))
        .get_result::<Payment>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Payment"))?;

    info!("Payment {} is now {}", payment.id, payment.payment_status);
    Ok(Json(payment))
}

pub async fn get_payments_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> ApiResult<Json<Vec<Payment>>> {
    let mut conn = state.pool.get().await?;

    let found = payments::table
        .filter(payments::order_id.eq(order_id))
        .order(payments::payment_date.desc())
        .load::<Payment>(&mut conn)
        .await?;

    Ok(Json(found))
}
