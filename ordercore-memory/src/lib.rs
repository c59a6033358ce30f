//! In-memory adapter for the `OrderCore` store ports
//!
//! This crate provides an in-memory implementation of the `ProductStore`
//! and `OrderStore` traits from the ordercore crate, useful for testing and
//! development scenarios where persistence is not required.
//!
//! Atomicity of multi-row writes is provided by a single write lock: order
//! creation validates and applies every stock decrement and the order
//! insert inside one critical section, so a failure leaves no partial
//! writes behind and concurrent orders cannot oversell a product.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ordercore::errors::{StoreError, StoreResult};
use ordercore::order::{NewOrder, NewOrderLine, Order, OrderLineItem, OrderStatus};
use ordercore::product::{NewProduct, Product};
use ordercore::store::{OrderStatistics, OrderStore, ProductStore};
use ordercore::types::{Money, OrderId, ProductId, Quantity, UserId};
use rust_decimal::Decimal;
use tracing::debug;

/// An order row as kept in memory; line items are embedded so removal of an
/// order removes its lines with it.
#[derive(Debug, Clone)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_amount: Money,
    status: OrderStatus,
    shipping_address: Option<String>,
    lines: Vec<NewOrderLine>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, OrderRow>,
    next_product_id: i64,
    next_order_id: i64,
}

impl Inner {
    fn hydrate(&self, row: &OrderRow) -> Order {
        let items = row
            .lines
            .iter()
            .map(|line| {
                let product = self.products.get(&line.product_id);
                OrderLineItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    price: line.price,
                    product_name: product.map(|p| p.name.clone()),
                    product_image: product.and_then(|p| p.image.clone()),
                }
            })
            .collect();
        Order {
            id: row.id,
            user_id: row.user_id,
            total_amount: row.total_amount,
            status: row.status,
            shipping_address: row.shipping_address.clone(),
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn hydrate_sorted<'a, I>(&self, rows: I) -> Vec<Order>
    where
        I: Iterator<Item = &'a OrderRow>,
    {
        let mut orders: Vec<Order> = rows.map(|row| self.hydrate(row)).collect();
        // Newest first, id as the tie-breaker for orders created within the
        // same clock tick.
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        orders
    }
}

/// Thread-safe in-memory store for testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn find_all(&self, active_only: bool) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|product| !active_only || product.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(products)
    }

    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.products.get(&id).cloned())
    }

    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|product| product.is_active && product.category == category)
            .cloned()
            .collect();
        products.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(products)
    }

    async fn create(&self, product: NewProduct) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.next_product_id += 1;
        let id = ProductId::try_new(inner.next_product_id)
            .expect("sequential product ids are always positive");
        inner.products.insert(
            id,
            Product {
                id,
                name: product.name,
                description: product.description,
                price: product.price,
                quantity: product.quantity,
                image: product.image,
                category: product.category,
                is_active: product.is_active,
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        debug!(product_id = %id, "product inserted");
        Ok(true)
    }

    async fn update(&self, product: &Product) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(&product.id) {
            Some(existing) => {
                existing.name = product.name.clone();
                existing.description = product.description.clone();
                existing.price = product.price;
                existing.quantity = product.quantity;
                existing.image = product.image.clone();
                existing.category = product.category.clone();
                existing.is_active = product.is_active;
                existing.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: ProductId) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(&id) {
            Some(product) => {
                product.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn find_all(&self) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.hydrate_sorted(inner.orders.values()))
    }

    async fn find_by_id(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.orders.get(&id).map(|row| inner.hydrate(row)))
    }

    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.hydrate_sorted(
            inner
                .orders
                .values()
                .filter(|row| row.user_id == user_id),
        ))
    }

    async fn find_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.hydrate_sorted(inner.orders.values().filter(|row| row.status == status)))
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.hydrate_sorted(inner.orders.values().filter(|row| {
            let date = row.created_at.date_naive();
            date >= start && date <= end
        })))
    }

    async fn create(&self, order: NewOrder) -> StoreResult<OrderId> {
        let mut inner = self.inner.write().expect("RwLock poisoned");

        // Validate every decrement before applying any, accumulating across
        // lines so two lines for the same product reserve cumulatively.
        let mut remaining: HashMap<ProductId, Quantity> = HashMap::new();
        for line in &order.lines {
            let current = match remaining.get(&line.product_id) {
                Some(quantity) => *quantity,
                None => {
                    inner
                        .products
                        .get(&line.product_id)
                        .ok_or_else(|| {
                            StoreError::Internal(format!(
                                "order references missing product {}",
                                line.product_id
                            ))
                        })?
                        .quantity
                }
            };
            let left = current.checked_sub(line.quantity).ok_or(
                StoreError::StockConflict {
                    product_id: line.product_id,
                },
            )?;
            remaining.insert(line.product_id, left);
        }
        for (product_id, quantity) in remaining {
            if let Some(product) = inner.products.get_mut(&product_id) {
                product.quantity = quantity;
                product.updated_at = Some(Utc::now());
            }
        }

        inner.next_order_id += 1;
        let id = OrderId::try_new(inner.next_order_id)
            .expect("sequential order ids are always positive");
        inner.orders.insert(
            id,
            OrderRow {
                id,
                user_id: order.user_id,
                total_amount: order.total_amount,
                status: order.status,
                shipping_address: order.shipping_address,
                lines: order.lines,
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        debug!(order_id = %id, "order inserted");
        Ok(id)
    }

    async fn update(&self, order: &Order) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.orders.get_mut(&order.id) {
            Some(row) => {
                row.status = order.status;
                row.shipping_address = order.shipping_address.clone();
                row.total_amount = order.total_amount;
                row.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.orders.get_mut(&id) {
            Some(row) => {
                row.status = status;
                row.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: OrderId) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let removed = inner.orders.remove(&id).is_some();
        if removed {
            debug!(order_id = %id, "order removed");
        }
        Ok(removed)
    }

    async fn statistics(&self) -> StoreResult<OrderStatistics> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let total_orders = inner.orders.len() as u64;
        let total_revenue: Decimal = inner
            .orders
            .values()
            .map(|row| row.total_amount.amount())
            .sum();
        let average_order_value = if total_orders == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(total_orders)).round_dp(2)
        };
        let count = |status: OrderStatus| {
            inner
                .orders
                .values()
                .filter(|row| row.status == status)
                .count() as u64
        };
        Ok(OrderStatistics {
            total_orders,
            total_revenue,
            average_order_value,
            completed_orders: count(OrderStatus::Completed),
            pending_orders: count(OrderStatus::Pending),
            cancelled_orders: count(OrderStatus::Cancelled),
        })
    }
}
