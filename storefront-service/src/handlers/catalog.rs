//! Read side of the product catalog.
//!
//! List views page over parent products only (`is_child = false`) and
//! decorate each page with its category, brand, images, inventory, review
//! totals and a derived `in_stock` flag. Decoration is done with one batched
//! query per relation rather than per product.

use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::BigDecimal;
use diesel::dsl::{avg, count, count_distinct};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Nullable};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use storefront_shared::{
    available, category_path, group_by_color, like_pattern, resolve_in_stock, round_rating,
    CategoryLevels, ColorGroup, Page, PageRequest, ProductStatus, VariantStock, MAX_CATEGORY_DEPTH,
};

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub key: Option<String>,
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub color: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl ProductQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            size: self.size,
        }
    }

    fn search_key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub brand: Option<Brand>,
    pub images: Vec<ProductImage>,
    pub inventory: Option<Inventory>,
    pub total_reviews: i64,
    pub rating: Option<i32>,
    pub in_stock: bool,
}

#[derive(Debug, Serialize, Queryable)]
pub struct ProductName {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub brand: Option<Brand>,
    pub images: Vec<ProductImage>,
    pub inventory: Option<Inventory>,
    pub specifications: Vec<ProductAttribute>,
    pub category_path: Vec<i32>,
    pub category_levels: CategoryLevels,
    pub total_reviews: i64,
    pub rating: Option<i32>,
    pub in_stock: bool,
    pub attributes: Vec<ColorGroup>,
}

#[derive(Debug, QueryableByName)]
struct CategoryLink {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Nullable<Integer>)]
    parent_id: Option<i32>,
}

/// Parent products matching the query filters, unordered and unpaged.
fn filtered(query: &ProductQuery) -> products::BoxedQuery<'static, Pg> {
    let mut select = products::table
        .filter(products::is_child.eq(false))
        .into_boxed();

    if let Some(key) = query.search_key() {
        let pattern = like_pattern(key);
        let category_ids = categories::table
            .filter(categories::name.ilike(pattern.clone()))
            .select(categories::id);
        let brand_ids = brands::table
            .filter(brands::name.ilike(pattern.clone()))
            .select(brands::id.nullable());
        select = select.filter(
            products::name
                .ilike(pattern.clone())
                .or(products::sku.ilike(pattern.clone()))
                .or(products::size.ilike(pattern))
                .or(products::category_id.eq_any(category_ids))
                .or(products::brand_id.eq_any(brand_ids)),
        );
    }
    if let Some(category_id) = query.category_id {
        select = select.filter(products::category_id.eq(category_id));
    }
    if let Some(brand_id) = query.brand_id {
        select = select.filter(products::brand_id.eq(brand_id));
    }
    if let Some(status) = query.status {
        select = select.filter(products::status.eq(status.as_str()));
    }
    if let Some(featured) = query.featured {
        select = select.filter(products::featured.eq(featured));
    }
    if let Some(min_price) = query.min_price.clone() {
        select = select.filter(products::price.ge(min_price));
    }
    if let Some(max_price) = query.max_price.clone() {
        select = select.filter(products::price.le(max_price));
    }
    if let Some(color) = query.color.clone() {
        select = select.filter(products::color.eq(color));
    }
    select
}

fn validate(query: &ProductQuery) -> ApiResult<()> {
    if let (Some(min), Some(max)) = (&query.min_price, &query.max_price) {
        if min > max {
            return Err(ApiError::bad_request("min_price must not exceed max_price"));
        }
    }
    Ok(())
}

/// Attaches relations and review totals to a page of products, keeping the
/// input order.
async fn summarize(conn: &mut AsyncPgConnection, found: Vec<Product>) -> QueryResult<Vec<ProductSummary>> {
    if found.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = found.iter().map(|p| p.id).collect();
    let category_ids: Vec<i32> = found.iter().map(|p| p.category_id).collect();
    let brand_ids: Vec<i32> = found.iter().filter_map(|p| p.brand_id).collect();

    let category_by_id: HashMap<i32, Category> = categories::table
        .filter(categories::id.eq_any(&category_ids))
        .load::<Category>(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let brand_by_id: HashMap<i32, Brand> = brands::table
        .filter(brands::id.eq_any(&brand_ids))
        .load::<Brand>(conn)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let mut images_by_product: HashMap<i32, Vec<ProductImage>> = HashMap::new();
    for image in product_images::table
        .filter(product_images::product_id.eq_any(&ids))
        .order(product_images::id.asc())
        .load::<ProductImage>(conn)
        .await?
    {
        images_by_product.entry(image.product_id).or_default().push(image);
    }

    let reviews_by_product: HashMap<i32, (i64, Option<BigDecimal>)> = reviews::table
        .filter(reviews::product_id.eq_any(&ids))
        .group_by(reviews::product_id)
        .select((reviews::product_id, count(reviews::id), avg(reviews::rating)))
        .load::<(i32, i64, Option<BigDecimal>)>(conn)
        .await?
        .into_iter()
        .map(|(product_id, total, average)| (product_id, (total, average)))
        .collect();

    let children: Vec<(i32, Option<i32>)> = products::table
        .filter(products::parent_id.eq_any(&ids))
        .select((products::id, products::parent_id))
        .load(conn)
        .await?;
    let mut children_by_parent: HashMap<i32, Vec<i32>> = HashMap::new();
    for (child_id, parent_id) in &children {
        if let Some(parent_id) = parent_id {
            children_by_parent.entry(*parent_id).or_default().push(*child_id);
        }
    }

    let stock_ids: Vec<i32> = ids
        .iter()
        .copied()
        .chain(children.iter().map(|(child_id, _)| *child_id))
        .collect();
    let stock_rows = inventories::table
        .filter(inventories::product_id.eq_any(&stock_ids))
        .load::<Inventory>(conn)
        .await?;
    let available_by_product: HashMap<i32, i32> = stock_rows
        .iter()
        .map(|row| (row.product_id, available(row.stock_level, row.in_open)))
        .collect();
    let mut inventory_by_product: HashMap<i32, Inventory> = stock_rows
        .into_iter()
        .map(|row| (row.product_id, row))
        .collect();

    Ok(found
        .into_iter()
        .map(|product| {
            let (total_reviews, average) = reviews_by_product
                .get(&product.id)
                .cloned()
                .unwrap_or((0, None));
            let in_stock = resolve_in_stock(
                product.id,
                children_by_parent.get(&product.id).map(Vec::as_slice).unwrap_or(&[]),
                &available_by_product,
            );
            ProductSummary {
                category: category_by_id.get(&product.category_id).cloned(),
                brand: product.brand_id.and_then(|id| brand_by_id.get(&id).cloned()),
                images: images_by_product.remove(&product.id).unwrap_or_default(),
                inventory: inventory_by_product.remove(&product.id),
                total_reviews,
                rating: round_rating(average.as_ref()),
                in_stock,
                product,
            }
        })
        .collect())
}

async fn paged(
    conn: &mut AsyncPgConnection,
    query: &ProductQuery,
    newest_first: bool,
) -> ApiResult<Page<ProductSummary>> {
    let request = query.page_request();

    let total = filtered(query).count().get_result::<i64>(conn).await?;

    let mut select = filtered(query);
    select = if newest_first {
        select.order((products::created_at.desc(), products::id.desc()))
    } else {
        select.order(products::id.asc())
    };
    let found = select
        .offset(request.offset())
        .limit(request.size())
        .load::<Product>(conn)
        .await?;

    Ok(Page::new(summarize(conn, found).await?, &request, total))
}

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Page<ProductSummary>>> {
    validate(&query)?;
    let mut conn = state.pool.get().await?;
    Ok(Json(paged(&mut conn, &query, false).await?))
}

pub async fn new_arrival_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Page<ProductSummary>>> {
    validate(&query)?;
    let mut conn = state.pool.get().await?;
    Ok(Json(paged(&mut conn, &query, true).await?))
}

/// Orders products by how many distinct orders contain them, ties by id.
fn rank_by_orders(mut found: Vec<Product>, order_counts: &HashMap<i32, i64>) -> Vec<Product> {
    found.sort_by(|a, b| {
        let a_count = order_counts.get(&a.id).copied().unwrap_or(0);
        let b_count = order_counts.get(&b.id).copied().unwrap_or(0);
        b_count.cmp(&a_count).then(a.id.cmp(&b.id))
    });
    found
}

pub async fn trending_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Page<ProductSummary>>> {
    validate(&query)?;
    let request = query.page_request();
    let mut conn = state.pool.get().await?;

    let found = filtered(&query).load::<Product>(&mut conn).await?;
    let ids: Vec<i32> = found.iter().map(|p| p.id).collect();

    let order_counts: HashMap<i32, i64> = order_items::table
        .filter(order_items::product_id.eq_any(&ids))
        .group_by(order_items::product_id)
        .select((order_items::product_id, count_distinct(order_items::order_id)))
        .load::<(i32, i64)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let page = Page::slice(rank_by_orders(found, &order_counts), &request);
    let items = summarize(&mut conn, page.items).await?;

    Ok(Json(Page::new(items, &request, page.total)))
}

pub async fn search_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Vec<ProductName>>> {
    let query = ProductQuery {
        status: Some(ProductStatus::Published),
        ..query
    };
    let mut conn = state.pool.get().await?;

    let found = filtered(&query)
        .select((products::id, products::name))
        .order(products::id.asc())
        .load::<ProductName>(&mut conn)
        .await?;

    Ok(Json(found))
}

/// Category ids from the root down to `category_id`.
pub(crate) async fn load_category_path(conn: &mut AsyncPgConnection, category_id: i32) -> ApiResult<Vec<i32>> {
    let links = diesel::sql_query(
        "WITH RECURSIVE ancestry AS ( \
             SELECT id, parent_id, 1 AS depth FROM categories WHERE id = $1 \
             UNION ALL \
             SELECT c.id, c.parent_id, a.depth + 1 \
             FROM categories c JOIN ancestry a ON c.id = a.parent_id \
             WHERE a.depth <= $2 \
         ) SELECT id, parent_id FROM ancestry",
    )
    .bind::<Integer, _>(category_id)
    .bind::<Integer, _>(MAX_CATEGORY_DEPTH as i32)
    .load::<CategoryLink>(conn)
    .await?;

    let parents: HashMap<i32, Option<i32>> = links
        .into_iter()
        .map(|link| (link.id, link.parent_id))
        .collect();
    Ok(category_path(category_id, &parents)?)
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<Json<ProductDetail>> {
    let mut conn = state.pool.get().await?;

    let product = products::table
        .find(product_id)
        .first::<Product>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    let category = categories::table
        .find(product.category_id)
        .first::<Category>(&mut conn)
        .await
        .optional()?;
    let brand = match product.brand_id {
        Some(brand_id) => brands::table
            .find(brand_id)
            .first::<Brand>(&mut conn)
            .await
            .optional()?,
        None => None,
    };
    let images = product_images::table
        .filter(product_images::product_id.eq(product.id))
        .order(product_images::id.asc())
        .load::<ProductImage>(&mut conn)
        .await?;
    let specifications = product_attributes::table
        .filter(product_attributes::product_id.eq(product.id))
        .order(product_attributes::id.asc())
        .load::<ProductAttribute>(&mut conn)
        .await?;

    let path = load_category_path(&mut conn, product.category_id).await?;

    let (total_reviews, average) = reviews::table
        .filter(reviews::product_id.eq(product.id))
        .select((count(reviews::id), avg(reviews::rating)))
        .first::<(i64, Option<BigDecimal>)>(&mut conn)
        .await?;

    let variants: Vec<(Product, Option<Inventory>)> = products::table
        .left_join(inventories::table)
        .filter(products::parent_id.eq(product.id))
        .order(products::id.asc())
        .load::<(Product, Option<Inventory>)>(&mut conn)
        .await?;
    let inventory = inventories::table
        .filter(inventories::product_id.eq(product.id))
        .first::<Inventory>(&mut conn)
        .await
        .optional()?;

    let mut available_by_product: HashMap<i32, i32> = HashMap::new();
    if let Some(row) = &inventory {
        available_by_product.insert(product.id, available(row.stock_level, row.in_open));
    }
    let stock: Vec<VariantStock> = variants
        .iter()
        .map(|(variant, row)| {
            let quantity = row
                .as_ref()
                .map(|row| available(row.stock_level, row.in_open))
                .unwrap_or(0);
            available_by_product.insert(variant.id, quantity);
            VariantStock {
                id: variant.id,
                color: variant.color.clone(),
                size: variant.size.clone(),
                quantity,
            }
        })
        .collect();
    let child_ids: Vec<i32> = stock.iter().map(|v| v.id).collect();
    let color_images: Vec<(Option<String>, String)> = images
        .iter()
        .map(|image| (image.color.clone(), image.image.clone()))
        .collect();

    Ok(Json(ProductDetail {
        in_stock: resolve_in_stock(product.id, &child_ids, &available_by_product),
        attributes: group_by_color(&stock, &color_images),
        category_levels: CategoryLevels::from_path(&path),
        category_path: path,
        rating: round_rating(average.as_ref()),
        total_reviews,
        category,
        brand,
        images,
        inventory,
        specifications,
        product,
    }))
}
