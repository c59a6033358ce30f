//! `ProductStore` and `OrderStore` implementations over the sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ordercore::errors::{StoreError, StoreResult};
use ordercore::order::{NewOrder, Order, OrderLineItem, OrderStatus};
use ordercore::product::{NewProduct, Product};
use ordercore::store::{OrderStatistics, OrderStore, ProductStore};
use ordercore::types::{Money, OrderId, ProductId, Quantity, UserId};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{query, Row};
use tracing::{info, instrument, warn};

use crate::{map_sqlx_error, PostgresStore};

/// A stored value that failed to parse into its domain type.
fn corrupt(detail: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(detail.to_string())
}

fn decode_product(row: &PgRow) -> StoreResult<Product> {
    let col = |error| map_sqlx_error("products.decode", error);

    let id: i64 = row.try_get("id").map_err(col)?;
    let price: Decimal = row.try_get("price").map_err(col)?;
    let quantity: i32 = row.try_get("quantity").map_err(col)?;
    Ok(Product {
        id: ProductId::try_new(id).map_err(corrupt)?,
        name: row.try_get("name").map_err(col)?,
        description: row.try_get("description").map_err(col)?,
        price: Money::new(price).map_err(corrupt)?,
        quantity: Quantity::on_hand(u32::try_from(quantity).map_err(corrupt)?),
        image: row.try_get("image").map_err(col)?,
        category: row.try_get("category").map_err(col)?,
        is_active: row.try_get("is_active").map_err(col)?,
        created_at: row.try_get("created_at").map_err(col)?,
        updated_at: row.try_get("updated_at").map_err(col)?,
    })
}

/// Decode an order row; line items are hydrated separately.
fn decode_order(row: &PgRow) -> StoreResult<Order> {
    let col = |error| map_sqlx_error("orders.decode", error);

    let id: i64 = row.try_get("id").map_err(col)?;
    let user_id: i64 = row.try_get("user_id").map_err(col)?;
    let total_amount: Decimal = row.try_get("total_amount").map_err(col)?;
    let status: String = row.try_get("status").map_err(col)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(col)?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at").map_err(col)?;
    Ok(Order {
        id: OrderId::try_new(id).map_err(corrupt)?,
        user_id: UserId::try_new(user_id).map_err(corrupt)?,
        total_amount: Money::new(total_amount).map_err(corrupt)?,
        status: status.parse::<OrderStatus>().map_err(corrupt)?,
        shipping_address: row.try_get("shipping_address").map_err(col)?,
        items: Vec::new(),
        created_at,
        updated_at,
    })
}

fn decode_line_item(row: &PgRow) -> StoreResult<OrderLineItem> {
    let col = |error| map_sqlx_error("order_items.decode", error);

    let product_id: i64 = row.try_get("product_id").map_err(col)?;
    let quantity: i32 = row.try_get("quantity").map_err(col)?;
    let price: Decimal = row.try_get("price").map_err(col)?;
    let quantity = Quantity::new(u32::try_from(quantity).map_err(corrupt)?).map_err(corrupt)?;
    Ok(OrderLineItem {
        product_id: ProductId::try_new(product_id).map_err(corrupt)?,
        quantity,
        price: Money::new(price).map_err(corrupt)?,
        product_name: row.try_get("product_name").map_err(col)?,
        product_image: row.try_get("product_image").map_err(col)?,
    })
}

fn bind_quantity(quantity: Quantity) -> StoreResult<i32> {
    i32::try_from(quantity.value()).map_err(corrupt)
}

const SELECT_ORDER: &str = "SELECT id, user_id, total_amount, status, shipping_address, \
     created_at, updated_at FROM orders";

impl PostgresStore {
    async fn load_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderLineItem>> {
        let rows = query(
            "SELECT oi.product_id, oi.quantity, oi.price, \
                    p.name AS product_name, p.image AS product_image \
             FROM order_items oi \
             LEFT JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = $1 \
             ORDER BY oi.id",
        )
        .bind(i64::from(order_id))
        .fetch_all(self.pool())
        .await
        .map_err(|error| map_sqlx_error("order_items.read", error))?;

        rows.iter().map(decode_line_item).collect()
    }

    async fn hydrate_orders(&self, rows: Vec<PgRow>) -> StoreResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = decode_order(&row)?;
            order.items = self.load_items(order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[instrument(name = "postgres.products.find_all", skip(self))]
    async fn find_all(&self, active_only: bool) -> StoreResult<Vec<Product>> {
        let sql = if active_only {
            "SELECT id, name, description, price, quantity, image, category, is_active, \
             created_at, updated_at FROM products WHERE is_active ORDER BY created_at DESC, id DESC"
        } else {
            "SELECT id, name, description, price, quantity, image, category, is_active, \
             created_at, updated_at FROM products ORDER BY created_at DESC, id DESC"
        };
        let rows = query(sql)
            .fetch_all(self.pool())
            .await
            .map_err(|error| map_sqlx_error("products.read", error))?;
        rows.iter().map(decode_product).collect()
    }

    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = query(
            "SELECT id, name, description, price, quantity, image, category, is_active, \
             created_at, updated_at FROM products WHERE id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(self.pool())
        .await
        .map_err(|error| map_sqlx_error("products.read", error))?;
        row.as_ref().map(decode_product).transpose()
    }

    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
        let rows = query(
            "SELECT id, name, description, price, quantity, image, category, is_active, \
             created_at, updated_at FROM products \
             WHERE category = $1 AND is_active ORDER BY created_at DESC, id DESC",
        )
        .bind(category)
        .fetch_all(self.pool())
        .await
        .map_err(|error| map_sqlx_error("products.read", error))?;
        rows.iter().map(decode_product).collect()
    }

    #[instrument(name = "postgres.products.create", skip(self, product))]
    async fn create(&self, product: NewProduct) -> StoreResult<bool> {
        let result = query(
            "INSERT INTO products (name, description, price, quantity, image, category, \
             is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(bind_quantity(product.quantity)?)
        .bind(product.image.as_deref())
        .bind(&product.category)
        .bind(product.is_active)
        .execute(self.pool())
        .await
        .map_err(|error| map_sqlx_error("products.create", error))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "postgres.products.update", skip(self, product))]
    async fn update(&self, product: &Product) -> StoreResult<bool> {
        let result = query(
            "UPDATE products SET name = $1, description = $2, price = $3, quantity = $4, \
             image = $5, category = $6, is_active = $7, updated_at = NOW() WHERE id = $8",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(bind_quantity(product.quantity)?)
        .bind(product.image.as_deref())
        .bind(&product.category)
        .bind(product.is_active)
        .bind(i64::from(product.id))
        .execute(self.pool())
        .await
        .map_err(|error| map_sqlx_error("products.update", error))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "postgres.products.soft_delete", skip(self))]
    async fn soft_delete(&self, id: ProductId) -> StoreResult<bool> {
        let result = query("UPDATE products SET is_active = FALSE WHERE id = $1")
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|error| map_sqlx_error("products.soft_delete", error))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn find_all(&self) -> StoreResult<Vec<Order>> {
        let sql = format!("{SELECT_ORDER} ORDER BY created_at DESC, id DESC");
        let rows = query(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.read", error))?;
        self.hydrate_orders(rows).await
    }

    async fn find_by_id(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE id = $1");
        let row = query(&sql)
            .bind(i64::from(id))
            .fetch_optional(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.read", error))?;
        match row {
            Some(row) => {
                let mut order = decode_order(&row)?;
                order.items = self.load_items(order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at DESC, id DESC");
        let rows = query(&sql)
            .bind(i64::from(user_id))
            .fetch_all(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.read", error))?;
        self.hydrate_orders(rows).await
    }

    async fn find_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE status = $1 ORDER BY created_at DESC, id DESC");
        let rows = query(&sql)
            .bind(status.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.read", error))?;
        self.hydrate_orders(rows).await
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "{SELECT_ORDER} WHERE created_at::date BETWEEN $1 AND $2 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = query(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.read", error))?;
        self.hydrate_orders(rows).await
    }

    #[instrument(name = "postgres.orders.create", skip(self, order))]
    async fn create(&self, order: NewOrder) -> StoreResult<OrderId> {
        info!(
            user_id = %order.user_id,
            line_count = order.lines.len(),
            "[postgres.orders.create] persisting order with stock reservations"
        );

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|error| map_sqlx_error("orders.begin", error))?;

        let row = query(
            "INSERT INTO orders (user_id, total_amount, status, shipping_address, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING id",
        )
        .bind(i64::from(order.user_id))
        .bind(order.total_amount.amount())
        .bind(order.status.as_str())
        .bind(order.shipping_address.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| map_sqlx_error("orders.insert", error))?;
        let raw_id: i64 = row
            .try_get("id")
            .map_err(|error| map_sqlx_error("orders.insert", error))?;
        let order_id = OrderId::try_new(raw_id).map_err(corrupt)?;

        for line in &order.lines {
            let quantity = bind_quantity(line.quantity)?;
            query(
                "INSERT INTO order_items (order_id, product_id, quantity, price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(raw_id)
            .bind(i64::from(line.product_id))
            .bind(quantity)
            .bind(line.price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("order_items.insert", error))?;

            // Conditional decrement: no row matches when a concurrent order
            // already took the stock, which rolls this whole unit back.
            let reserved = query(
                "UPDATE products SET quantity = quantity - $1, updated_at = NOW() \
                 WHERE id = $2 AND quantity >= $1",
            )
            .bind(quantity)
            .bind(i64::from(line.product_id))
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("products.reserve", error))?;

            if reserved.rows_affected() == 0 {
                if let Err(error) = tx.rollback().await {
                    warn!(
                        error = %error,
                        "[postgres.orders.create] rollback after stock conflict failed"
                    );
                }
                return Err(StoreError::StockConflict {
                    product_id: line.product_id,
                });
            }
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error("orders.commit", error))?;

        info!(order_id = %order_id, "[postgres.orders.create] order committed");
        Ok(order_id)
    }

    #[instrument(name = "postgres.orders.update", skip(self, order))]
    async fn update(&self, order: &Order) -> StoreResult<bool> {
        let result = query(
            "UPDATE orders SET status = $1, shipping_address = $2, total_amount = $3, \
             updated_at = NOW() WHERE id = $4",
        )
        .bind(order.status.as_str())
        .bind(order.shipping_address.as_deref())
        .bind(order.total_amount.amount())
        .bind(i64::from(order.id))
        .execute(self.pool())
        .await
        .map_err(|error| map_sqlx_error("orders.update", error))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "postgres.orders.update_status", skip(self))]
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<bool> {
        let result = query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|error| map_sqlx_error("orders.update_status", error))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "postgres.orders.delete", skip(self))]
    async fn delete(&self, id: OrderId) -> StoreResult<bool> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|error| map_sqlx_error("orders.begin", error))?;

        query("DELETE FROM order_items WHERE order_id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("order_items.delete", error))?;

        let result = query("DELETE FROM orders WHERE id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("orders.delete", error))?;

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error("orders.commit", error))?;

        Ok(result.rows_affected() > 0)
    }

    async fn statistics(&self) -> StoreResult<OrderStatistics> {
        let row = query(
            "SELECT COUNT(*) AS total_orders, \
                    COALESCE(SUM(total_amount), 0) AS total_revenue, \
                    ROUND(COALESCE(AVG(total_amount), 0), 2) AS average_order_value, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_orders, \
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders, \
                    COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders \
             FROM orders",
        )
        .fetch_one(self.pool())
        .await
        .map_err(|error| map_sqlx_error("orders.statistics", error))?;

        let col = |error| map_sqlx_error("orders.statistics", error);
        let count = |name: &str| -> StoreResult<u64> {
            let raw: i64 = row.try_get(name).map_err(col)?;
            u64::try_from(raw).map_err(corrupt)
        };
        Ok(OrderStatistics {
            total_orders: count("total_orders")?,
            total_revenue: row.try_get("total_revenue").map_err(col)?,
            average_order_value: row.try_get("average_order_value").map_err(col)?,
            completed_orders: count("completed_orders")?,
            pending_orders: count("pending_orders")?,
            cancelled_orders: count("cancelled_orders")?,
        })
    }
}
