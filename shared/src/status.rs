use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Declares a closed set of values stored as `VARCHAR` columns.
///
/// Each variant maps to exactly one lowercase string, which is also the value
/// enforced by the matching database check constraint.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(DomainError::InvalidEnum {
                        kind: $kind,
                        allowed: $name::ALL
                            .iter()
                            .map(|v| format!("'{}'", v.as_str()))
                            .collect::<Vec<_>>()
                            .join(", "),
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Lifecycle of an order. New orders always start as `Pending`.
    OrderStatus, "OrderStatus" {
        Pending => "pending",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

string_enum!(PaymentStatus, "PaymentStatus" {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

string_enum!(PaymentMethod, "PaymentMethod" {
    Card => "card",
    Bkash => "bkash",
    Rocket => "rocket",
    Nagad => "nagad",
    CashOnDelivery => "cash_on_delivery",
});

string_enum!(
    /// Kind of the last change applied to an inventory row.
    ChangeType, "ChangeType" {
        Restock => "restock",
        Purchase => "purchase",
    }
);

string_enum!(CategoryType, "CategoryType" {
    Parent => "parent",
    Child => "child",
});

string_enum!(ProductStatus, "Status" {
    Published => "published",
    Unpublished => "unpublished",
});

string_enum!(UserRole, "Role" {
    Customer => "customer",
    Admin => "admin",
});

string_enum!(BannerPosition, "Position" {
    LeftBanner => "left_banner",
    RightBanner1 => "right_banner_1",
    RightBanner2 => "right_banner_2",
});

/// What an order status change does to the inventory rows of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Nothing to adjust.
    None,
    /// Reserved units are handed back: `in_open -= quantity`.
    Release,
    /// Reserved units leave the warehouse: `stock_level -= quantity` and
    /// `in_open -= quantity`.
    Consume,
}

impl OrderStatus {
    pub fn transition(self, to: OrderStatus) -> Result<StockEffect, DomainError> {
        match (self, to) {
            (OrderStatus::Pending, OrderStatus::Shipped) => Ok(StockEffect::Consume),
            (OrderStatus::Pending, OrderStatus::Cancelled) => Ok(StockEffect::Release),
            (OrderStatus::Shipped, OrderStatus::Delivered) => Ok(StockEffect::None),
            (from, to) => Err(DomainError::InvalidTransition { from, to }),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Customer
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Unpublished
    }
}
