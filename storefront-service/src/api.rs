use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    attributes, brands, carts, catalog, categories, content, dashboard, inventory, orders,
    payments, products, reviews, users,
};
use crate::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/api/user", post(users::create_user))
        .route("/api/user/:id", get(users::get_user).put(users::update_user))
        .route("/api/brands", post(brands::create_brand).get(brands::list_brands))
        .route("/api/brands/:id", get(brands::get_brand))
        .route(
            "/categories",
            post(categories::create_category).get(categories::list_categories),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/api/products",
            get(catalog::list_products).post(products::create_product),
        )
        .route("/api/products/search", get(catalog::search_products))
        .route("/api/products/new-arrival", get(catalog::new_arrival_products))
        .route("/api/products/trending", get(catalog::trending_products))
        .route(
            "/api/products/:id",
            get(catalog::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/api/products/variation", post(products::create_variation))
        .route(
            "/api/products/variation/:id",
            put(products::update_variation).delete(products::delete_variation),
        )
        .route(
            "/api/product-attributes",
            post(attributes::create_attribute).get(attributes::list_attributes),
        )
        .route(
            "/api/product-attributes/:id",
            put(attributes::update_attribute).delete(attributes::delete_attribute),
        )
        .route("/api/cart", post(carts::create_cart).get(carts::get_cart_by_user))
        .route("/api/cart/:uuid", axum::routing::delete(carts::delete_cart))
        .route("/api/cart/item", post(carts::add_cart_item))
        .route(
            "/api/cart/item/:id",
            put(carts::update_cart_item).delete(carts::remove_cart_item),
        )
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_order_status))
        .route("/inventory/restock", post(inventory::restock_product))
        .route("/inventory/:product_id", get(inventory::get_inventory))
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route("/reviews/product/:product_id", get(reviews::get_reviews_by_product))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id/status", patch(payments::update_payment_status))
        .route("/payments/order/:order_id", get(payments::get_payments_by_order))
        .route(
            "/api/content/banner",
            post(content::add_banner_images).get(content::get_banner_images),
        )
        .route("/api/dashboard/stats", get(dashboard::get_stats))
        .route("/api/dashboard/monthly-sales", get(dashboard::get_monthly_sales))
        .route("/api/dashboard/yearly-revenue", get(dashboard::get_yearly_revenue))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Router wrapped so that `/reviews/` and `/reviews` resolve to the same route.
pub fn create_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

pub async fn health_check() -> &'static str {
    "OK"
}
