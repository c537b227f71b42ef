pub mod attributes;
pub mod brands;
pub mod carts;
pub mod catalog;
pub mod categories;
pub mod content;
pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

use crate::error::{ApiError, ApiResult};

pub(crate) fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}
