//! Order and inventory behaviour against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`. The
//! database must be disposable: migrations are applied and rows are added.

use std::sync::OnceLock;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use diesel::prelude::*;
use diesel::{Connection, PgConnection};
use diesel_async::{
    pooled_connection::{bb8::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection, RunQueryDsl,
};
use diesel_migrations::MigrationHarness;
use serde_json::{json, Value};
use storefront_service::api::{create_router, AppState};
use storefront_service::schema::{cart_items, inventories, orders};
use storefront_service::{DbPool, MIGRATIONS};
use tokio::task::JoinSet;
use tower::ServiceExt;
use uuid::Uuid;

static MIGRATED: OnceLock<()> = OnceLock::new();

async fn setup(test: &str) -> Option<(Router, DbPool)> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping {}: DATABASE_URL not set", test);
            return None;
        }
    };

    MIGRATED.get_or_init(|| {
        let mut conn = PgConnection::establish(&database_url).expect("connect for migrations");
        conn.run_pending_migrations(MIGRATIONS).expect("run migrations");
    });

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&database_url);
    let pool = Pool::builder().max_size(4).build(manager).await.expect("build pool");
    let router = create_router(AppState { pool: pool.clone() });
    Some((router, pool))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

fn id_of(body: &Value) -> i64 {
    body["id"].as_i64().unwrap_or_else(|| panic!("missing id in {}", body))
}

async fn create_user(app: &Router) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/user",
        Some(json!({"name": "Test Customer", "email": format!("{}@example.com", unique("user"))})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn create_category(app: &Router, parent_id: Option<i64>) -> i64 {
    let category_type = if parent_id.is_some() { "child" } else { "parent" };
    let (status, body) = send(
        app,
        Method::POST,
        "/categories",
        Some(json!({"name": unique("category"), "category_type": category_type, "parent_id": parent_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn create_product(app: &Router, category_id: i64, stock: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/products",
        Some(json!({
            "name": "Cotton Tee",
            "sku": unique("TEE"),
            "price": "12.50",
            "currency": "BDT",
            "category_id": category_id,
            "status": "published",
            "stock": stock
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn inventory(app: &Router, product_id: i64) -> Value {
    let (status, body) = send(app, Method::GET, &format!("/inventory/{}", product_id), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

async fn order(app: &Router, user_id: i64, lines: &[(i64, i32)]) -> (StatusCode, Value) {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product_id, quantity)| json!({"product_id": product_id, "quantity": quantity}))
        .collect();
    send(
        app,
        Method::POST,
        "/orders",
        Some(json!({"user_id": user_id, "items": items})),
    )
    .await
}

async fn order_count(pool: &DbPool, user_id: i64) -> i64 {
    let mut conn = pool.get().await.unwrap();
    orders::table
        .filter(orders::user_id.eq(user_id as i32))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn duplicate_sku_is_rejected() {
    let Some((app, _pool)) = setup("duplicate_sku_is_rejected").await else { return };
    let category_id = create_category(&app, None).await;

    let payload = json!({
        "name": "Denim Jacket",
        "sku": unique("JKT"),
        "price": "80.00",
        "currency": "BDT",
        "category_id": category_id,
        "stock": 3
    });
    let (status, _) = send(&app, Method::POST, "/api/products", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/products", Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn variants_are_created_with_their_own_stock() {
    let Some((app, _pool)) = setup("variants_are_created_with_their_own_stock").await else { return };
    let category_id = create_category(&app, None).await;

    let sku = unique("TEE");
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(json!({
            "name": "Striped Tee",
            "sku": sku,
            "price": "15.00",
            "currency": "BDT",
            "category_id": category_id,
            "status": "published",
            "attributes": [
                {"color": "red", "image": "red.png", "variation": [{"size": "M", "quantity": 3}, {"size": "L", "quantity": 0}]},
                {"color": "blue", "image": "blue.png", "variation": [{"size": "S", "quantity": 5}]}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let variants = body["variants"].as_array().unwrap();
    assert_eq!(variants.len(), 3);
    assert!(variants.iter().any(|v| v["sku"] == format!("{}-M-red", sku)));
    assert_eq!(body["images"].as_array().unwrap().len(), 2);

    let (status, detail) = send(&app, Method::GET, &format!("/api/products/{}", id_of(&body)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["in_stock"], true);
    let groups = detail["attributes"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["color"], "blue");
    assert_eq!(groups[0]["image"], "blue.png");
    assert_eq!(groups[1]["variation"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn repeated_lines_reserve_cumulatively() {
    let Some((app, pool)) = setup("repeated_lines_reserve_cumulatively").await else { return };
    let user_id = create_user(&app).await;
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 10).await;

    let (status, body) = order(&app, user_id, &[(product_id, 4), (product_id, 4)]).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["order_status"], "pending");
    assert!(body["order_identifier"].as_str().unwrap().starts_with("HC"));

    let stock = inventory(&app, product_id).await;
    assert_eq!(stock["stock_level"], 10);
    assert_eq!(stock["in_open"], 8);
    assert_eq!(stock["available"], 2);
    assert_eq!(stock["change_type"], "purchase");

    // a third line of 4 no longer fits
    let (status, body) = order(&app, user_id, &[(product_id, 4)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(inventory(&app, product_id).await["in_open"], 8);
    assert_eq!(order_count(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn concurrent_orders_never_oversell() {
    let Some((app, pool)) = setup("concurrent_orders_never_oversell").await else { return };
    let user_id = create_user(&app).await;
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 10).await;

    let mut tasks = JoinSet::new();
    for _ in 0..40 {
        let app = app.clone();
        tasks.spawn(async move { order(&app, user_id, &[(product_id, 1)]).await });
    }

    let (mut created, mut rejected) = (0, 0);
    while let Some(result) = tasks.join_next().await {
        let (status, body) = result.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {}: {}", other, body),
        }
    }
    assert_eq!((created, rejected), (10, 30));

    let stock = inventory(&app, product_id).await;
    assert_eq!(stock["stock_level"], 10);
    assert_eq!(stock["in_open"], 10);
    assert_eq!(stock["available"], 0);
    assert_eq!(order_count(&pool, user_id).await, 10);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn failed_order_leaves_no_trace() {
    let Some((app, pool)) = setup("failed_order_leaves_no_trace").await else { return };
    let user_id = create_user(&app).await;
    let category_id = create_category(&app, None).await;
    let plenty = create_product(&app, category_id, 5).await;
    let scarce = create_product(&app, category_id, 1).await;

    let (status, body) = order(&app, user_id, &[(plenty, 2), (scarce, 3)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["error"].as_str().unwrap().contains("Not enough stock"));

    assert_eq!(inventory(&app, plenty).await["in_open"], 0);
    assert_eq!(inventory(&app, scarce).await["in_open"], 0);
    assert_eq!(order_count(&pool, user_id).await, 0);

    let (status, _) = order(&app, user_id, &[(plenty, 1), (i32::MAX as i64, 1)]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(inventory(&app, plenty).await["in_open"], 0);
    assert_eq!(order_count(&pool, user_id).await, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn restock_creates_then_accumulates() {
    let Some((app, pool)) = setup("restock_creates_then_accumulates").await else { return };
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 0).await;

    {
        let mut conn = pool.get().await.unwrap();
        diesel::delete(inventories::table.filter(inventories::product_id.eq(product_id as i32)))
            .execute(&mut conn)
            .await
            .unwrap();
    }
    let (status, _) = send(&app, Method::GET, &format!("/inventory/{}", product_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let restock = |quantity: i32| json!({"product_id": product_id, "quantity": quantity});
    let (status, body) = send(&app, Method::POST, "/inventory/restock", Some(restock(5))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["stock_level"], 5);
    assert_eq!(body["in_open"], 0);
    assert_eq!(body["change_type"], "restock");

    let (_, body) = send(&app, Method::POST, "/inventory/restock", Some(restock(3))).await;
    assert_eq!(body["stock_level"], 8);

    // 8 + i32::MAX does not fit the column
    let (status, body) = send(&app, Method::POST, "/inventory/restock", Some(restock(i32::MAX))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["error"].as_str().unwrap().contains("maximum stock level"));
    assert_eq!(inventory(&app, product_id).await["stock_level"], 8);

    let mut conn = pool.get().await.unwrap();
    let rows = inventories::table
        .filter(inventories::product_id.eq(product_id as i32))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/inventory/restock",
        Some(json!({"product_id": i32::MAX, "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn category_path_runs_root_to_leaf() {
    let Some((app, _pool)) = setup("category_path_runs_root_to_leaf").await else { return };
    let root = create_category(&app, None).await;
    let sub = create_category(&app, Some(root)).await;
    let leaf = create_category(&app, Some(sub)).await;
    let product_id = create_product(&app, leaf, 1).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/products/{}", product_id), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["category_path"], json!([root, sub, leaf]));
    assert_eq!(body["category_id"], leaf);
    assert_eq!(body["category_levels"]["category_id"], root);
    assert_eq!(body["category_levels"]["sub_category_id"], sub);
    assert_eq!(body["category_levels"]["sub_sub_category_id"], leaf);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn category_cannot_move_under_its_descendant() {
    let Some((app, _pool)) = setup("category_cannot_move_under_its_descendant").await else { return };
    let root = create_category(&app, None).await;
    let sub = create_category(&app, Some(root)).await;
    let leaf = create_category(&app, Some(sub)).await;
    let product_id = create_product(&app, leaf, 1).await;

    let move_under = |parent_id: i64| {
        json!({"name": unique("category"), "category_type": "child", "parent_id": parent_id})
    };

    let (status, body) = send(&app, Method::PUT, &format!("/categories/{}", root), Some(move_under(sub))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["error"].as_str().unwrap().contains("cyclic"));

    let (status, _) = send(&app, Method::PUT, &format!("/categories/{}", root), Some(move_under(leaf))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::PUT, &format!("/categories/{}", sub), Some(move_under(sub))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, &format!("/api/products/{}", product_id), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["category_path"], json!([root, sub, leaf]));

    // unknown target is reported before the parent is looked at
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/categories/{}", i32::MAX),
        Some(move_under(root)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::PUT, &format!("/categories/{}", leaf), Some(move_under(root))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, body) = send(&app, Method::GET, &format!("/api/products/{}", product_id), None).await;
    assert_eq!(body["category_path"], json!([root, leaf]));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn search_key_wildcards_match_literally() {
    let Some((app, _pool)) = setup("search_key_wildcards_match_literally").await else { return };
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 1).await;

    let (status, body) = send(&app, Method::GET, "/api/products/search?key=%25", None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(!body.as_array().unwrap().iter().any(|p| p["id"] == product_id));

    let (_, body) = send(&app, Method::GET, "/api/products/search?key=Cotton_Tee", None).await;
    assert!(!body.as_array().unwrap().iter().any(|p| p["id"] == product_id));

    let (_, body) = send(&app, Method::GET, "/api/products/search?key=Cotton%20Tee", None).await;
    assert!(body.as_array().unwrap().iter().any(|p| p["id"] == product_id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn deleting_a_cart_removes_its_items() {
    let Some((app, pool)) = setup("deleting_a_cart_removes_its_items").await else { return };
    let user_id = create_user(&app).await;
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 2).await;

    let (status, cart) = send(&app, Method::POST, "/api/cart", Some(json!({"user_id": user_id}))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", cart);
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart/item",
        Some(json!({"cart_id": cart_id, "product_id": product_id, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, &format!("/api/cart?user_id={}", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/cart/{}", cart_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let cart_uuid = Uuid::parse_str(&cart_id).unwrap();
    let mut conn = pool.get().await.unwrap();
    let remaining = cart_items::table
        .filter(cart_items::cart_id.eq(cart_uuid))
        .count()
        .get_result::<i64>(&mut conn)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn status_changes_release_or_consume_reservations() {
    let Some((app, _pool)) = setup("status_changes_release_or_consume_reservations").await else { return };
    let user_id = create_user(&app).await;
    let category_id = create_category(&app, None).await;
    let product_id = create_product(&app, category_id, 10).await;

    let (_, cancelled) = order(&app, user_id, &[(product_id, 3)]).await;
    let (_, shipped) = order(&app, user_id, &[(product_id, 2)]).await;
    assert_eq!(inventory(&app, product_id).await["in_open"], 5);

    let status_of = |status: &str| json!({"status": status});
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/orders/{}/status", id_of(&cancelled)),
        Some(status_of("cancelled")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stock = inventory(&app, product_id).await;
    assert_eq!((stock["stock_level"].clone(), stock["in_open"].clone()), (json!(10), json!(2)));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/orders/{}/status", id_of(&shipped)),
        Some(status_of("shipped")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stock = inventory(&app, product_id).await;
    assert_eq!((stock["stock_level"].clone(), stock["in_open"].clone()), (json!(8), json!(0)));

    // cancelled orders cannot be reopened
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/orders/{}/status", id_of(&cancelled)),
        Some(status_of("shipped")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
