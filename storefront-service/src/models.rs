use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::users, treat_none_as_null = true)]
pub struct UserChanges {
    pub name: String,
    pub phone_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::brands)]
pub struct Brand {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::brands)]
pub struct NewBrand {
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::categories)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::categories, treat_none_as_null = true)]
pub struct CategoryChanges {
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub status: String,
    pub featured: bool,
    pub is_child: bool,
    pub color: String,
    pub size: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub status: String,
    pub featured: bool,
    pub is_child: bool,
    pub color: String,
    pub size: String,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::products, treat_none_as_null = true)]
pub struct ProductChanges {
    pub name: String,
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub status: String,
    pub featured: bool,
    pub color: String,
    pub size: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::product_images)]
pub struct ProductImage {
    pub id: i32,
    pub product_id: i32,
    pub image: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::product_images)]
pub struct NewProductImage {
    pub product_id: i32,
    pub image: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::product_attributes)]
pub struct ProductAttribute {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub product_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::product_attributes)]
pub struct NewProductAttribute {
    pub name: String,
    pub description: String,
    pub product_id: i32,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::product_attributes)]
pub struct ProductAttributeChanges {
    pub name: String,
    pub description: String,
    pub product_id: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::inventories)]
pub struct Inventory {
    pub id: i32,
    pub product_id: i32,
    pub stock_level: i32,
    pub in_open: i32,
    pub change_type: String,
    pub change_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::inventories)]
pub struct NewInventory {
    pub product_id: i32,
    pub stock_level: i32,
    pub in_open: i32,
    pub change_type: String,
    pub change_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: i32,
    pub order_identifier: String,
    pub user_id: i32,
    pub order_status: String,
    pub currency: String,
    pub item_price: BigDecimal,
    pub discount_amount: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub total_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub order_identifier: String,
    pub user_id: i32,
    pub order_status: String,
    pub currency: String,
    pub item_price: BigDecimal,
    pub discount_amount: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub total_price: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(belongs_to(Order))]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItem {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::shipping_addresses)]
#[diesel(belongs_to(Order))]
pub struct ShippingAddress {
    pub id: i32,
    pub order_id: i32,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::shipping_addresses)]
pub struct NewShippingAddress {
    pub order_id: i32,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reviews)]
pub struct Review {
    pub id: i32,
    pub user_id: i32,
    pub product_id: i32,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reviews)]
pub struct NewReview {
    pub user_id: i32,
    pub product_id: i32,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::reviews)]
pub struct ReviewChanges {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::shopping_carts)]
pub struct ShoppingCart {
    pub id: Uuid,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::shopping_carts)]
pub struct NewShoppingCart {
    pub id: Uuid,
    pub user_id: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(belongs_to(ShoppingCart, foreign_key = cart_id))]
pub struct CartItem {
    pub id: i32,
    pub cart_id: Uuid,
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct NewCartItem {
    pub cart_id: Uuid,
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payments)]
pub struct Payment {
    pub id: i32,
    pub order_id: i32,
    pub payment_method: String,
    pub payment_status: String,
    pub amount: BigDecimal,
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub order_id: i32,
    pub payment_method: String,
    pub payment_status: String,
    pub amount: BigDecimal,
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::content_images)]
pub struct ContentImage {
    pub id: i32,
    pub position: String,
    pub image: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::content_images)]
pub struct NewContentImage {
    pub position: String,
    pub image: Vec<u8>,
}
