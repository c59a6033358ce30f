//! Order entities: status, line items with snapshotted prices, and the
//! order aggregate as hydrated from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::types::{sql_datetime, Money, MoneyError, OrderId, ProductId, Quantity, UserId};

/// Lifecycle status of an order.
///
/// Transitions are business events rather than a strict linear state
/// machine; any status may move to any other. Stock is returned to inventory
/// exactly once, on the transition into `Cancelled` or when an order that
/// still holds stock is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed but not yet picked up for processing.
    Pending,
    /// Being prepared for shipment.
    Processing,
    /// Fulfilled; its stock reservation is spent for good.
    Completed,
    /// Cancelled; its stock reservation has been returned.
    Cancelled,
}

impl OrderStatus {
    /// The wire-format string for this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status still holds reserved stock that must
    /// be returned before the order row may disappear.
    pub const fn holds_stock(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseOrderStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseOrderStatusError(other.to_string())),
        }
    }
}

/// A single line of an order.
///
/// `price` is the unit price snapshotted when the order was created; later
/// changes to the product's price never alter it. `product_name` and
/// `product_image` are display fields hydrated from the product at read
/// time and are absent when the joined product row is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// The ordered product.
    pub product_id: ProductId,
    /// Units ordered, always positive.
    pub quantity: Quantity,
    /// Unit price at order-creation time.
    pub price: Money,
    /// Product display name, hydrated at read time.
    pub product_name: Option<String>,
    /// Product image path, hydrated at read time.
    pub product_image: Option<String>,
}

impl OrderLineItem {
    /// This line's contribution to the order total.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.price.multiply_by_quantity(self.quantity)
    }
}

/// An order as hydrated from the store.
///
/// `total_amount` was computed once at creation from the snapshotted line
/// prices and is never recomputed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Sum of `price * quantity` over the line items, fixed at creation.
    pub total_amount: Money,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Optional free-form shipping address.
    pub shipping_address: Option<String>,
    /// Line items in request order.
    pub items: Vec<OrderLineItem>,
    /// When the order was created.
    #[serde(with = "sql_datetime")]
    pub created_at: DateTime<Utc>,
    /// When the order was last updated, if ever.
    #[serde(with = "sql_datetime::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One line of an order about to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    /// The ordered product.
    pub product_id: ProductId,
    /// Units to reserve, always positive.
    pub quantity: Quantity,
    /// Snapshotted unit price.
    pub price: Money,
}

/// Field set for creating an order; the store assigns id and timestamps.
///
/// Persisting a `NewOrder` is an atomic unit: the order row, every line
/// item, and every line's conditional stock decrement all commit together
/// or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Owning user.
    pub user_id: UserId,
    /// Initial status.
    pub status: OrderStatus,
    /// Optional shipping address.
    pub shipping_address: Option<String>,
    /// Total computed from the snapshotted lines.
    pub total_amount: Money,
    /// Lines in request order.
    pub lines: Vec<NewOrderLine>,
}

/// Returned to the caller after an order is successfully created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    /// Identifier of the new order.
    pub order_id: OrderId,
    /// The order's fixed total.
    pub total_amount: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 7, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn status_roundtrips_through_wire_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown order status: shipped");
    }

    #[test]
    fn only_unfulfilled_statuses_hold_stock() {
        assert!(OrderStatus::Pending.holds_stock());
        assert!(OrderStatus::Processing.holds_stock());
        assert!(!OrderStatus::Completed.holds_stock());
        assert!(!OrderStatus::Cancelled.holds_stock());
    }

    #[test]
    fn line_total_multiplies_snapshot_price() {
        let line = OrderLineItem {
            product_id: ProductId::try_new(1).unwrap(),
            quantity: Quantity::new(3).unwrap(),
            price: Money::new(dec!(10.00)).unwrap(),
            product_name: None,
            product_image: None,
        };
        assert_eq!(line.line_total().unwrap().amount(), dec!(30.00));
    }

    #[test]
    fn order_json_shape_matches_wire_format() {
        let order = Order {
            id: OrderId::try_new(42).unwrap(),
            user_id: UserId::try_new(7).unwrap(),
            total_amount: Money::new(dec!(25.00)).unwrap(),
            status: OrderStatus::Pending,
            shipping_address: Some("12 Main St".to_string()),
            items: vec![OrderLineItem {
                product_id: ProductId::try_new(1).unwrap(),
                quantity: Quantity::new(2).unwrap(),
                price: Money::new(dec!(10.00)).unwrap(),
                product_name: Some("Kettle".to_string()),
                product_image: None,
            }],
            created_at: at(8, 0, 0),
            updated_at: Some(at(9, 15, 30)),
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["items"][0]["product_name"], "Kettle");
        assert_eq!(json["items"][0]["price"], "10.00");
        assert_eq!(json["created_at"], "2024-07-14 08:00:00");
        assert_eq!(json["updated_at"], "2024-07-14 09:15:30");
    }
}
