use crate::{DomainError, DomainResult};

/// Units that can still be promised to new orders.
pub fn available(stock_level: i32, in_open: i32) -> i32 {
    stock_level - in_open
}

pub fn ensure_positive_quantity(quantity: i32) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Stock level after adding `quantity` units, refused when it would not fit
/// the column.
pub fn restocked_level(product_id: i32, stock_level: i32, quantity: i32) -> DomainResult<i32> {
    ensure_positive_quantity(quantity)?;
    stock_level
        .checked_add(quantity)
        .ok_or(DomainError::StockOverflow { product_id, quantity })
}

/// A reservation of `requested` units succeeds only while
/// `stock_level - in_open >= requested`.
///
/// The database applies the same predicate in its conditional update; this
/// function is used to explain a rejected reservation to the caller.
pub fn ensure_available(
    product_id: i32,
    stock_level: i32,
    in_open: i32,
    requested: i32,
) -> DomainResult<()> {
    ensure_positive_quantity(requested)?;
    let available = available(stock_level, in_open);
    if available < requested {
        return Err(DomainError::InsufficientStock {
            product_id,
            available,
            requested,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_units_count_against_stock() {
        assert!(ensure_available(1, 10, 0, 10).is_ok());
        assert!(ensure_available(1, 10, 4, 6).is_ok());
        assert_eq!(
            ensure_available(1, 10, 4, 7),
            Err(DomainError::InsufficientStock {
                product_id: 1,
                available: 6,
                requested: 7,
            })
        );
    }

    #[test]
    fn two_lines_of_the_same_product_accumulate() {
        // stock 10, first line reserves 4, second line asks for 4 more
        assert!(ensure_available(7, 10, 0, 4).is_ok());
        assert!(ensure_available(7, 10, 4, 4).is_ok());
        // a third line of 4 would exceed the stock
        assert!(ensure_available(7, 10, 8, 4).is_err());
    }

    #[test]
    fn zero_or_negative_quantities_are_rejected() {
        assert_eq!(
            ensure_available(1, 10, 0, 0),
            Err(DomainError::InvalidQuantity(0))
        );
        assert!(ensure_positive_quantity(-3).is_err());
    }

    #[test]
    fn restock_that_would_overflow_is_refused() {
        assert_eq!(restocked_level(4, 8, 3), Ok(11));
        assert_eq!(restocked_level(4, i32::MAX - 1, 1), Ok(i32::MAX));
        assert_eq!(
            restocked_level(4, i32::MAX - 1, 2),
            Err(DomainError::StockOverflow {
                product_id: 4,
                quantity: 2,
            })
        );
    }
}
