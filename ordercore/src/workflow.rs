//! The order workflow engine.
//!
//! `OrderWorkflow` owns the business rules around order placement: request
//! validation, stock checks, price snapshotting, total computation, and the
//! compensating stock return on cancellation and deletion. It operates
//! purely through the store ports and is constructed from explicitly
//! supplied store handles; there is no hidden global state.
//!
//! Order creation is two-phase. Phase one performs reads only, walking the
//! requested items in order and aborting on the first failure. Phase two
//! hands the store a fully-built [`NewOrder`] whose persistence (order row,
//! line items, and every conditional stock decrement) is a single atomic
//! unit. A request that fails therefore leaves no partial writes behind,
//! and two racing orders cannot jointly drive a product's stock negative:
//! the losing decrement matches no row and rolls the losing order back.

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::errors::{StoreError, WorkflowError, WorkflowResult};
use crate::order::{NewOrder, NewOrderLine, Order, OrderReceipt, OrderStatus};
use crate::store::{OrderStatistics, OrderStore, ProductStore};
use crate::types::{Money, OrderId, ProductId, UserId};
use crate::validation::{CreateOrderRequest, UpdateOrderRequest};

/// The order workflow engine, generic over its store ports.
#[derive(Debug, Clone)]
pub struct OrderWorkflow<P, O> {
    products: P,
    orders: O,
}

impl<P, O> OrderWorkflow<P, O>
where
    P: ProductStore,
    O: OrderStore,
{
    /// Build a workflow from explicit store handles.
    pub const fn new(products: P, orders: O) -> Self {
        Self { products, orders }
    }

    /// Validate an order request, snapshot prices, and persist the order
    /// with its stock reservations as one atomic unit.
    ///
    /// Items are checked in request order and the first failure aborts the
    /// whole operation: a malformed item, an unknown product, or a quantity
    /// above the product's stock on hand. No writes happen until every item
    /// has passed.
    #[instrument(skip(self, request))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> WorkflowResult<OrderReceipt> {
        let user_id = request.parsed_user_id().map_err(WorkflowError::Validation)?;
        request
            .ensure_has_items()
            .map_err(WorkflowError::Validation)?;
        let status = match request.status.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|_| WorkflowError::InvalidStatus(raw.to_string()))?,
            None => OrderStatus::Pending,
        };

        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let (product_id, quantity) = item.parsed().map_err(WorkflowError::Validation)?;
            let product = self
                .products
                .find_by_id(product_id)
                .await?
                .ok_or(WorkflowError::ProductNotFound(product_id))?;
            if product.quantity < quantity {
                return Err(WorkflowError::InsufficientStock {
                    product_id,
                    product_name: product.name,
                    requested: quantity,
                    available: product.quantity,
                });
            }
            let line_total = product
                .price
                .multiply_by_quantity(quantity)
                .map_err(|error| WorkflowError::validation("items", error.to_string()))?;
            total = total
                .checked_add(line_total)
                .map_err(|error| WorkflowError::validation("items", error.to_string()))?;
            lines.push(NewOrderLine {
                product_id,
                quantity,
                price: product.price,
            });
        }

        let new_order = NewOrder {
            user_id,
            status,
            shipping_address: request.shipping_address.clone(),
            total_amount: total,
            lines,
        };
        let order_id = match self.orders.create(new_order).await {
            Ok(order_id) => order_id,
            // A concurrent order won the stock between our read and the
            // store's conditional decrement; report it as the stock failure
            // it is rather than a bare store error.
            Err(StoreError::StockConflict { product_id }) => {
                return Err(self.describe_stock_conflict(product_id, request).await);
            }
            Err(error) => return Err(error.into()),
        };

        info!(order_id = %order_id, total_amount = %total, "order created");
        Ok(OrderReceipt {
            order_id,
            total_amount: total,
        })
    }

    /// Update an order's status.
    ///
    /// Transitioning into `cancelled` from any other status returns every
    /// line's quantity to its product before the status write, so an
    /// already-cancelled order is never restored twice. The stock return is
    /// per-item read-modify-write and is not re-verified if the subsequent
    /// status write fails; the status write's outcome is authoritative.
    #[instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> WorkflowResult<()> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;
        let new_status: OrderStatus = status
            .parse()
            .map_err(|_| WorkflowError::InvalidStatus(status.to_string()))?;

        if new_status == OrderStatus::Cancelled && order.status != OrderStatus::Cancelled {
            self.return_stock(&order).await?;
        }

        if !self.orders.update_status(order_id, new_status).await? {
            return Err(WorkflowError::OrderNotFound(order_id));
        }
        info!(order_id = %order_id, status = %new_status, "order status updated");
        Ok(())
    }

    /// Cancel an order. Delegates to the status update, which handles the
    /// stock return.
    pub async fn cancel_order(&self, order_id: OrderId) -> WorkflowResult<()> {
        self.update_order_status(order_id, OrderStatus::Cancelled.as_str())
            .await
    }

    /// Merge a partial update onto an order and persist it.
    ///
    /// This is a plain field update: setting the status to `cancelled` via
    /// this operation does not return stock. Cancellation goes through
    /// [`OrderWorkflow::update_order_status`].
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: OrderId,
        request: &UpdateOrderRequest,
    ) -> WorkflowResult<()> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        if let Some(raw) = request.status.as_deref() {
            order.status = raw
                .parse()
                .map_err(|_| WorkflowError::InvalidStatus(raw.to_string()))?;
        }
        if let Some(address) = &request.shipping_address {
            order.shipping_address = Some(address.clone());
        }

        if !self.orders.update(&order).await? {
            return Err(WorkflowError::OrderNotFound(order_id));
        }
        info!(order_id = %order_id, "order updated");
        Ok(())
    }

    /// Delete an order, returning its stock first when the order still
    /// holds a reservation (status neither `completed` nor `cancelled`).
    /// The order row and its line items are removed atomically.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> WorkflowResult<()> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        if order.status.holds_stock() {
            self.return_stock(&order).await?;
        }

        if !self.orders.delete(order_id).await? {
            return Err(WorkflowError::OrderNotFound(order_id));
        }
        info!(order_id = %order_id, "order deleted");
        Ok(())
    }

    /// An order by id.
    pub async fn order(&self, order_id: OrderId) -> WorkflowResult<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))
    }

    /// All orders, newest first.
    pub async fn all_orders(&self) -> WorkflowResult<Vec<Order>> {
        Ok(self.orders.find_all().await?)
    }

    /// A user's orders, newest first.
    pub async fn user_orders(&self, user_id: UserId) -> WorkflowResult<Vec<Order>> {
        Ok(self.orders.find_by_user(user_id).await?)
    }

    /// Orders currently in the given status.
    pub async fn orders_by_status(&self, status: &str) -> WorkflowResult<Vec<Order>> {
        let status: OrderStatus = status
            .parse()
            .map_err(|_| WorkflowError::InvalidStatus(status.to_string()))?;
        Ok(self.orders.find_by_status(status).await?)
    }

    /// Orders created in the given date range (inclusive).
    pub async fn orders_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WorkflowResult<Vec<Order>> {
        Ok(self.orders.find_by_date_range(start, end).await?)
    }

    /// Aggregate order statistics.
    pub async fn statistics(&self) -> WorkflowResult<OrderStatistics> {
        Ok(self.orders.statistics().await?)
    }

    /// Return every line's quantity to its product, one read-modify-write
    /// per item. A line whose product row has gone missing is skipped with
    /// a warning rather than failing the whole restoration.
    async fn return_stock(&self, order: &Order) -> WorkflowResult<()> {
        for item in &order.items {
            let Some(mut product) = self.products.find_by_id(item.product_id).await? else {
                warn!(product_id = %item.product_id, "skipping stock return for missing product");
                continue;
            };
            product.quantity = product.quantity.checked_add(item.quantity).map_err(|error| {
                StoreError::Internal(format!(
                    "stock return for product {} failed: {error}",
                    item.product_id
                ))
            })?;
            self.products.update(&product).await?;
        }
        Ok(())
    }

    /// Turn a lost stock race into the same error shape a failed
    /// validation-phase stock check produces.
    async fn describe_stock_conflict(
        &self,
        product_id: ProductId,
        request: &CreateOrderRequest,
    ) -> WorkflowError {
        let requested = request
            .items
            .iter()
            .filter_map(|item| item.parsed().ok())
            .find(|(id, _)| *id == product_id)
            .map(|(_, quantity)| quantity);
        match (requested, self.products.find_by_id(product_id).await) {
            (Some(requested), Ok(Some(product))) => WorkflowError::InsufficientStock {
                product_id,
                product_name: product.name,
                requested,
                available: product.quantity,
            },
            (_, Ok(None)) => WorkflowError::ProductNotFound(product_id),
            (_, Err(error)) => WorkflowError::Store(error),
            (None, Ok(Some(_))) => WorkflowError::Store(StoreError::StockConflict { product_id }),
        }
    }
}
