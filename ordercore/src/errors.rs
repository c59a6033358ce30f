//! Error types for `OrderCore`.
//!
//! Two layers, converted explicitly at the boundary between them:
//!
//! - **`WorkflowError`**: business failures from the order workflow and the
//!   product catalog. These carry enough context to render a
//!   `{"success": false, "errors": {...}}` response.
//! - **`StoreError`**: persistence failures from a store adapter. A store
//!   never decides business outcomes; it reports what happened to the
//!   transaction and the workflow layer interprets it.
//!
//! No operation retries anywhere: every call either completes or reports a
//! failure to its caller within the same request.

use thiserror::Error;

use crate::types::{OrderId, ProductId, Quantity};
use crate::validation::ValidationErrors;

/// Errors produced by workflow operations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The request shape was invalid; the map names each failing field.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The referenced order does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// A line requested more units than the product has on hand.
    #[error(
        "insufficient stock for '{product_name}': requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// The product that ran short.
        product_id: ProductId,
        /// Display name for the error message.
        product_name: String,
        /// Units the request asked for.
        requested: Quantity,
        /// Units actually on hand.
        available: Quantity,
    },

    /// A status string did not name a known order status.
    #[error("invalid order status: {0}")]
    InvalidStatus(String),

    /// The underlying store failed; the transaction was rolled back.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Shorthand for a single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }
}

/// Errors produced by store adapters.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The connection to the backing store failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A conditional stock decrement matched no row: a concurrent order
    /// drained the product's stock between validation and commit.
    #[error("stock conflict on product {product_id}")]
    StockConflict {
        /// The product whose decrement lost the race.
        product_id: ProductId,
    },

    /// A multi-row write failed and was rolled back.
    #[error("transaction rolled back: {0}")]
    TransactionRollback(String),

    /// A stored value could not be decoded into its domain type.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The adapter was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Type alias for workflow results.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Type alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
