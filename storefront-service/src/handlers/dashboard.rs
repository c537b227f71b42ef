use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use chrono::{Datelike, Duration, Months, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Integer, Numeric, Text, Timestamptz};
use diesel_async::RunQueryDsl;
use num_traits::Zero;
use serde::Serialize;
use storefront_shared::UserRole;

use crate::api::AppState;
use crate::error::ApiResult;
use crate::schema::*;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_order: i64,
    pub total_revenue: BigDecimal,
    pub total_customer: i64,
}

#[derive(Debug, Serialize, QueryableByName)]
pub struct MonthlySales {
    #[diesel(sql_type = Integer)]
    pub month: i32,
    #[diesel(sql_type = Numeric)]
    pub sales: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct MonthlySalesReport {
    pub monthly_sales: Vec<MonthlySales>,
}

#[derive(Debug, Serialize, QueryableByName)]
pub struct MonthlyRevenue {
    #[diesel(sql_type = Text)]
    pub month: String,
    #[diesel(sql_type = Numeric)]
    pub revenue: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct YearlyRevenueReport {
    pub yearly_revenue: Vec<MonthlyRevenue>,
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    let mut conn = state.pool.get().await?;

    let total_order = orders::table.count().get_result::<i64>(&mut conn).await?;
    let total_revenue = orders::table
        .select(diesel::dsl::sum(orders::total_price))
        .first::<Option<BigDecimal>>(&mut conn)
        .await?
        .unwrap_or_else(BigDecimal::zero);
    let total_customer = users::table
        .filter(users::role.eq(UserRole::Customer.as_str()))
        .count()
        .get_result::<i64>(&mut conn)
        .await?;

    Ok(Json(Stats {
        total_order,
        total_revenue,
        total_customer,
    }))
}

/// Order totals per calendar month of the current year.
pub async fn get_monthly_sales(State(state): State<AppState>) -> ApiResult<Json<MonthlySalesReport>> {
    let mut conn = state.pool.get().await?;

    let monthly_sales = diesel::sql_query(
        "SELECT EXTRACT(MONTH FROM created_at)::int AS month, SUM(total_price) AS sales \
         FROM orders \
         WHERE EXTRACT(YEAR FROM created_at)::int = $1 \
         GROUP BY 1 \
         ORDER BY 1",
    )
    .bind::<Integer, _>(Utc::now().year())
    .load::<MonthlySales>(&mut conn)
    .await?;

    Ok(Json(MonthlySalesReport { monthly_sales }))
}

/// Order totals per month over the trailing twelve months, oldest first.
pub async fn get_yearly_revenue(State(state): State<AppState>) -> ApiResult<Json<YearlyRevenueReport>> {
    let mut conn = state.pool.get().await?;

    let now = Utc::now();
    let start = now
        .checked_sub_months(Months::new(12))
        .unwrap_or_else(|| now - Duration::days(365));

    let yearly_revenue = diesel::sql_query(
        "SELECT TO_CHAR(DATE_TRUNC('month', created_at), 'Mon YYYY') AS month, \
                SUM(total_price) AS revenue \
         FROM orders \
         WHERE created_at BETWEEN $1 AND $2 \
         GROUP BY DATE_TRUNC('month', created_at) \
         ORDER BY DATE_TRUNC('month', created_at)",
    )
    .bind::<Timestamptz, _>(start)
    .bind::<Timestamptz, _>(now)
    .load::<MonthlyRevenue>(&mut conn)
    .await?;

    Ok(Json(YearlyRevenueReport { yearly_revenue }))
}
