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
    expand_variants, variant_sku, AttributeInput, ChangeType, DomainError, ProductStatus,
};
use tracing::{info, warn};

use super::require_text;
use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::*;
use crate::schema::*;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInput {
    pub image: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub attributes: Vec<AttributeInput>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

/// Full overwrite of a product's editable fields.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariationRequest {
    pub parent_id: i32,
    pub color: String,
    pub size: String,
    pub sku: Option<String>,
    pub price: Option<BigDecimal>,
    #[serde(default)]
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVariationRequest {
    pub color: String,
    pub size: String,
    pub sku: Option<String>,
    pub price: Option<BigDecimal>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Product>,
    pub images: Vec<ProductImage>,
}

fn validate_price(price: &BigDecimal) -> ApiResult<()> {
    if *price < BigDecimal::zero() {
        return Err(ApiError::bad_request("price must not be negative"));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> ApiResult<()> {
    if currency.chars().count() != 3 {
        return Err(ApiError::bad_request(format!(
            "currency must be a 3 letter code, got '{}'",
            currency
        )));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> ApiResult<()> {
    if stock < 0 {
        return Err(DomainError::InvalidQuantity(stock).into());
    }
    Ok(())
}

/// Every product is created together with its single inventory row.
async fn insert_inventory(conn: &mut AsyncPgConnection, product_id: i32, stock: i32) -> QueryResult<()> {
    diesel::insert_into(inventories::table)
        .values(&NewInventory {
            product_id,
            stock_level: stock,
            in_open: 0,
            change_type: ChangeType::Restock.as_str().to_string(),
            change_date: Utc::now(),
        })
        .execute(conn)
        .await?;
    Ok(())
}

fn child_of(parent: &Product, sku: String, color: String, size: String, price: BigDecimal) -> NewProduct {
    NewProduct {
        name: parent.name.clone(),
        description: parent.description.clone(),
        sku,
        barcode: parent.barcode.clone(),
        price,
        currency: parent.currency.clone(),
        category_id: parent.category_id,
        brand_id: parent.brand_id,
        parent_id: Some(parent.id),
        status: parent.status.clone(),
        featured: false,
        is_child: true,
        color,
        size,
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductWithVariants>)> {
    require_text("name", &request.name)?;
    require_text("sku", &request.sku)?;
    validate_price(&request.price)?;
    validate_currency(&request.currency)?;
    validate_stock(request.stock)?;
    let variants_to_create = expand_variants(&request.sku, &request.attributes)?;

    let mut conn = state.pool.get().await?;

    let created = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let parent = diesel::insert_into(products::table)
                    .values(&NewProduct {
                        name: request.name,
                        description: request.description,
                        sku: request.sku,
                        barcode: request.barcode,
                        price: request.price,
                        currency: request.currency,
                        category_id: request.category_id,
                        brand_id: request.brand_id,
                        parent_id: None,
                        status: request.status.as_str().to_string(),
                        featured: request.featured,
                        is_child: false,
                        color: request.color,
                        size: request.size,
                    })
                    .get_result::<Product>(conn)
                    .await?;
                insert_inventory(conn, parent.id, request.stock).await?;

                let mut variants = Vec::with_capacity(variants_to_create.len());
                for variant in variants_to_create {
                    let child = diesel::insert_into(products::table)
                        .values(&child_of(&parent, variant.sku, variant.color, variant.size, parent.price.clone()))
                        .get_result::<Product>(conn)
                        .await?;
                    insert_inventory(conn, child.id, variant.stock).await?;
                    variants.push(child);
                }

                // One image per attribute color, attached to the parent.
                let mut new_images: Vec<NewProductImage> = request
                    .images
                    .into_iter()
                    .map(|input| NewProductImage {
                        product_id: parent.id,
                        image: input.image,
                        color: input.color,
                    })
                    .collect();
                new_images.extend(request.attributes.into_iter().filter_map(|attribute| {
                    attribute.image.map(|image| NewProductImage {
                        product_id: parent.id,
                        image,
                        color: Some(attribute.color),
                    })
                }));

                let images = if new_images.is_empty() {
                    Vec::new()
                } else {
                    diesel::insert_into(product_images::table)
                        .values(&new_images)
                        .get_results::<ProductImage>(conn)
                        .await?
                };

                Ok(ProductWithVariants {
                    product: parent,
                    variants,
                    images,
                })
            })
        })
        .await?;

    info!(
        "Created product {} ({}) with {} variants",
        created.product.id,
        created.product.sku,
        created.variants.len()
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn find_product(conn: &mut AsyncPgConnection, product_id: i32, is_child: bool) -> ApiResult<Product> {
    products::table
        .find(product_id)
        .filter(products::is_child.eq(is_child))
        .first::<Product>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(if is_child { "Variation" } else { "Product" }))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    require_text("name", &request.name)?;
    require_text("sku", &request.sku)?;
    validate_price(&request.price)?;
    validate_currency(&request.currency)?;

    let mut conn = state.pool.get().await?;
    find_product(&mut conn, product_id, false).await?;

    let product = diesel::update(products::table.find(product_id))
        .set(&ProductChanges {
            name: request.name,
            description: request.description,
            sku: request.sku,
            barcode: request.barcode,
            price: request.price,
            currency: request.currency,
            category_id: request.category_id,
            brand_id: request.brand_id,
            status: request.status.as_str().to_string(),
            featured: request.featured,
            color: request.color,
            size: request.size,
            updated_at: Utc::now(),
        })
        .get_result::<Product>(&mut conn)
        .await?;

    info!("Updated product {}", product.id);
    Ok(Json(product))
}

async fn delete_product_row(state: &AppState, product_id: i32, is_child: bool) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;

    let deleted = diesel::delete(
        products::table
            .find(product_id)
            .filter(products::is_child.eq(is_child)),
    )
    .execute(&mut conn)
    .await?;
    if deleted == 0 {
        return Err(ApiError::not_found(if is_child { "Variation" } else { "Product" }));
    }

    info!("Deleted product {}", product_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<StatusCode> {
    delete_product_row(&state, product_id, false).await
}

pub async fn create_variation(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateVariationRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_text("color", &request.color)?;
    require_text("size", &request.size)?;
    validate_stock(request.stock)?;
    if let Some(price) = &request.price {
        validate_price(price)?;
    }

    let mut conn = state.pool.get().await?;

    let variation = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let parent = products::table
                    .find(request.parent_id)
                    .first::<Product>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Parent product"))?;
                if parent.is_child {
                    warn!("Rejected variation under variant {}", parent.id);
                    return Err(DomainError::NestedVariant(parent.id).into());
                }

                let sku = request
                    .sku
                    .unwrap_or_else(|| variant_sku(&parent.sku, &request.size, &request.color));
                let price = request.price.unwrap_or_else(|| parent.price.clone());

                let child = diesel::insert_into(products::table)
                    .values(&child_of(&parent, sku, request.color, request.size, price))
                    .get_result::<Product>(conn)
                    .await?;
                insert_inventory(conn, child.id, request.stock).await?;
                Ok(child)
            })
        })
        .await?;

    info!("Created variation {} ({})", variation.id, variation.sku);
    Ok((StatusCode::CREATED, Json(variation)))
}

pub async fn update_variation(
    State(state): State<AppState>,
    Path(variation_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateVariationRequest>,
) -> ApiResult<Json<Product>> {
    require_text("color", &request.color)?;
    require_text("size", &request.size)?;
    if let Some(price) = &request.price {
        validate_price(price)?;
    }

    let mut conn = state.pool.get().await?;
    let current = find_product(&mut conn, variation_id, true).await?;

    let sku = match request.sku {
        Some(sku) => sku,
        None => {
            let parent_sku = match current.parent_id {
                Some(parent_id) => {
                    products::table
                        .find(parent_id)
                        .select(products::sku)
                        .first::<String>(&mut conn)
                        .await?
                }
                None => current.sku.clone(),
            };
            variant_sku(&parent_sku, &request.size, &request.color)
        }
    };

    let variation = diesel::update(products::table.find(variation_id))
        .set(&ProductChanges {
            name: current.name,
            description: current.description,
            sku,
            barcode: current.barcode,
            price: request.price.unwrap_or(current.price),
            currency: current.currency,
            category_id: current.category_id,
            brand_id: current.brand_id,
            status: request
                .status
                .map(|status| status.as_str().to_string())
                .unwrap_or(current.status),
            featured: current.featured,
            color: request.color,
            size: request.size,
            updated_at: Utc::now(),
        })
        .get_result::<Product>(&mut conn)
        .await?;

    info!("Updated variation {}", variation.id);
    Ok(Json(variation))
}

pub async fn delete_variation(
    State(state): State<AppState>,
    Path(variation_id): Path<i32>,
) -> ApiResult<StatusCode> {
    delete_product_row(&state, variation_id, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_currency_must_be_three_letters() {
        assert!(validate_currency("BDT").is_ok());
        assert!(matches!(validate_currency("TAKA"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_negative_price_and_stock_rejected() {
        assert!(validate_price(&BigDecimal::from_str("0.00").unwrap()).is_ok());
        assert!(validate_price(&BigDecimal::from_str("-1.50").unwrap()).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_child_inherits_parent_fields() {
        let now = Utc::now();
        let parent = Product {
            id: 9,
            name: "Tee".to_string(),
            description: "Cotton".to_string(),
            sku: "TEE".to_string(),
            barcode: None,
            price: BigDecimal::from_str("12.50").unwrap(),
            currency: "BDT".to_string(),
            category_id: 2,
            brand_id: Some(3),
            parent_id: None,
            status: "published".to_string(),
            featured: true,
            is_child: false,
            color: String::new(),
            size: String::new(),
            created_at: now,
            updated_at: now,
        };

        let child = child_of(
            &parent,
            variant_sku(&parent.sku, "M", "red"),
            "red".to_string(),
            "M".to_string(),
            parent.price.clone(),
        );
        assert_eq!(child.sku, "TEE-M-red");
        assert_eq!(child.parent_id, Some(9));
        assert!(child.is_child);
        assert!(!child.featured);
        assert_eq!(child.category_id, 2);
        assert_eq!(child.brand_id, Some(3));
    }
}
