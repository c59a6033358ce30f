//! Store abstractions for the `OrderCore` library.
//!
//! This module defines the port traits that workflow components operate
//! through. The traits are backend-independent; adapters provide the
//! persistence (`ordercore-memory` for tests and development,
//! `ordercore-postgres` for production). Multi-row writes, meaning order
//! creation with its stock reservations and order deletion, are atomic
//! units inside the adapter: all rows commit together or none do.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::order::{NewOrder, Order, OrderStatus};
use crate::product::{NewProduct, Product};
use crate::types::{OrderId, ProductId, UserId};

/// Persistence port for the product catalog.
///
/// Stock mutation during order creation does NOT go through this trait; it
/// is part of [`OrderStore::create`]'s atomic unit. Stock restoration on
/// cancel/delete does: the workflow reads a product and writes it back with
/// the restored quantity via [`ProductStore::update`].
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, optionally restricted to active ones, newest first.
    async fn find_all(&self, active_only: bool) -> StoreResult<Vec<Product>>;

    /// A product by id, active or not.
    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Active products in a category.
    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>>;

    /// Insert a product. Returns whether a row was written.
    async fn create(&self, product: NewProduct) -> StoreResult<bool>;

    /// Overwrite a product's mutable fields (the caller supplies the full
    /// object, already merged with current values). Returns whether the row
    /// existed.
    async fn update(&self, product: &Product) -> StoreResult<bool>;

    /// Clear the active flag. The row remains for order-line references.
    /// Returns whether the row existed.
    async fn soft_delete(&self, id: ProductId) -> StoreResult<bool>;
}

/// Persistence port for orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders, newest first, line items hydrated.
    async fn find_all(&self) -> StoreResult<Vec<Order>>;

    /// An order by id, line items hydrated with product display fields.
    async fn find_by_id(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// A user's orders, newest first.
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;

    /// Orders currently in `status`, newest first.
    async fn find_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>>;

    /// Orders created between `start` and `end` (inclusive, by calendar
    /// date), newest first.
    async fn find_by_date_range(&self, start: NaiveDate, end: NaiveDate)
        -> StoreResult<Vec<Order>>;

    /// Persist a new order as one atomic unit: the order row, every line
    /// item, and a conditional stock decrement per line
    /// (`quantity = quantity - n` only where `quantity >= n`). When any
    /// decrement matches no row the whole unit rolls back and the call
    /// fails with [`StoreError::StockConflict`].
    ///
    /// [`StoreError::StockConflict`]: crate::errors::StoreError::StockConflict
    async fn create(&self, order: NewOrder) -> StoreResult<OrderId>;

    /// Overwrite status, shipping address and total. Returns whether the
    /// row existed.
    async fn update(&self, order: &Order) -> StoreResult<bool>;

    /// Persist a status change with a fresh update timestamp. Returns
    /// whether the row existed.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<bool>;

    /// Remove the order's line items and then the order row, atomically.
    /// Returns whether the order existed.
    async fn delete(&self, id: OrderId) -> StoreResult<bool>;

    /// Aggregate counts and revenue over all orders.
    async fn statistics(&self) -> StoreResult<OrderStatistics>;
}

/// Aggregates over the whole orders relation.
///
/// Revenue figures are plain decimals rather than [`Money`]: an average is
/// not constrained to cent precision.
///
/// [`Money`]: crate::types::Money
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderStatistics {
    /// Number of orders ever created (minus hard-deleted ones).
    pub total_orders: u64,
    /// Sum of order totals across all statuses.
    pub total_revenue: Decimal,
    /// Mean order total, rounded to two decimal places; zero when there are
    /// no orders.
    pub average_order_value: Decimal,
    /// Orders currently `completed`.
    pub completed_orders: u64,
    /// Orders currently `pending`.
    pub pending_orders: u64,
    /// Orders currently `cancelled`.
    pub cancelled_orders: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn statistics_serialize_with_wire_field_names() {
        let stats = OrderStatistics {
            total_orders: 3,
            total_revenue: dec!(90.00),
            average_order_value: dec!(30.00),
            completed_orders: 1,
            pending_orders: 1,
            cancelled_orders: 1,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_orders"], 3);
        assert_eq!(json["total_revenue"], "90.00");
        assert_eq!(json["average_order_value"], "30.00");
    }
}
