//! Domain vocabulary shared by the storefront service: status enums, stock
//! rules, catalog shaping and pagination. Nothing in here touches I/O.

pub mod catalog;
pub mod inventory;
pub mod pagination;
pub mod status;

use thiserror::Error;

pub use catalog::*;
pub use inventory::*;
pub use pagination::*;
pub use status::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{kind} must be one of [{allowed}], got '{value}'")]
    InvalidEnum {
        kind: &'static str,
        allowed: String,
        value: String,
    },

    #[error("Not enough stock available for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i32,
        available: i32,
        requested: i32,
    },

    #[error("quantity must be greater than zero, got {0}")]
    InvalidQuantity(i32),

    #[error("restocking product {product_id} by {quantity} exceeds the maximum stock level")]
    StockOverflow { product_id: i32, quantity: i32 },

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("must provide parent category id when creating child category")]
    MissingParentCategory,

    #[error("a parent category cannot have a parent category")]
    UnexpectedParentCategory,

    #[error("product {0} is a variant and cannot have variants of its own")]
    NestedVariant(i32),

    #[error("category {0} has a cyclic or too deep ancestry")]
    CategoryCycle(i32),
}

pub type DomainResult<T> = Result<T, DomainError>;
