//! Structural validation of raw request payloads.
//!
//! Requests arrive as loosely-typed JSON; every field is optional at the
//! wire level. This module parses them into domain types at the boundary
//! and collects failures into a `field -> message` map that callers can
//! hand back verbatim in a `{"success": false, "errors": {...}}` response.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::product::{NewProduct, Product};
use crate::types::{Money, ProductId, Quantity, UserId};

/// A map of field name to human-readable failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// An empty error map.
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding a single entry.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    /// Record a failure for `field`. A later failure for the same field
    /// overwrites the earlier one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Whether any failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The message recorded for `field`, if any.
    pub fn message(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// One requested line of a new order, as received on the wire.
///
/// A client-supplied `price` is accepted for wire compatibility but
/// ignored: the unit price snapshotted onto the line is always read from
/// the product at creation time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderItemRequest {
    /// Product to order.
    pub product_id: Option<i64>,
    /// Units to order.
    pub quantity: Option<u32>,
    /// Ignored; the server's price snapshot is authoritative.
    pub price: Option<Decimal>,
}

impl OrderItemRequest {
    /// Parse this line's identifying fields, rejecting missing or
    /// non-positive values with the request-level `items` failure message.
    pub fn parsed(&self) -> Result<(ProductId, Quantity), ValidationErrors> {
        let invalid =
            || ValidationErrors::single("items", "each item requires a product_id and a quantity");
        let product_id = self
            .product_id
            .and_then(|raw| ProductId::try_new(raw).ok())
            .ok_or_else(invalid)?;
        let quantity = self
            .quantity
            .and_then(|raw| Quantity::new(raw).ok())
            .ok_or_else(invalid)?;
        Ok((product_id, quantity))
    }
}

/// A new-order request as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrderRequest {
    /// Owning user; required.
    pub user_id: Option<i64>,
    /// Requested lines; required and non-empty.
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    /// Optional free-form shipping address.
    pub shipping_address: Option<String>,
    /// Optional initial status; must parse as a known status when present.
    pub status: Option<String>,
    /// Accepted on the wire but not persisted.
    pub phone: Option<String>,
    /// Accepted on the wire but not persisted.
    pub comment: Option<String>,
}

impl CreateOrderRequest {
    /// Parse the required owning user.
    pub fn parsed_user_id(&self) -> Result<UserId, ValidationErrors> {
        self.user_id
            .and_then(|raw| UserId::try_new(raw).ok())
            .ok_or_else(|| ValidationErrors::single("user_id", "user id is required"))
    }

    /// Reject requests without at least one item.
    pub fn ensure_has_items(&self) -> Result<(), ValidationErrors> {
        if self.items.is_empty() {
            return Err(ValidationErrors::single(
                "items",
                "order must contain at least one item",
            ));
        }
        Ok(())
    }
}

/// A partial order update: absent fields keep their current values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderRequest {
    /// New status; must parse as a known status when present.
    pub status: Option<String>,
    /// New shipping address.
    pub shipping_address: Option<String>,
}

/// A product create/update payload as received on the wire.
///
/// For creation every field except `image` is required; for updates absent
/// fields keep the stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    /// Display name.
    pub name: Option<String>,
    /// Long-form description.
    pub description: Option<String>,
    /// Unit price; must be greater than zero.
    pub price: Option<Decimal>,
    /// Stock on hand; zero is allowed, negative values are not.
    pub quantity: Option<i64>,
    /// Optional image path.
    pub image: Option<String>,
    /// Category label.
    pub category: Option<String>,
}

impl ProductPayload {
    /// Validate all fields for creation, collecting every failure rather
    /// than stopping at the first, then build the insertable product.
    pub fn into_new_product(self) -> Result<NewProduct, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = non_empty(&self.name);
        if name.is_none() {
            errors.insert("name", "name is required");
        }
        let description = non_empty(&self.description);
        if description.is_none() {
            errors.insert("description", "description is required");
        }
        let price = match self.price {
            Some(raw) if raw > Decimal::ZERO => match Money::new(raw) {
                Ok(price) => Some(price),
                Err(error) => {
                    errors.insert("price", error.to_string());
                    None
                }
            },
            _ => {
                errors.insert("price", "price must be greater than 0");
                None
            }
        };
        let quantity = match self.quantity {
            Some(raw) if raw >= 0 => u32::try_from(raw).ok().map(Quantity::on_hand),
            _ => None,
        };
        if quantity.is_none() {
            errors.insert("quantity", "quantity cannot be negative");
        }
        let category = non_empty(&self.category);
        if category.is_none() {
            errors.insert("category", "category is required");
        }

        match (name, description, price, quantity, category) {
            (Some(name), Some(description), Some(price), Some(quantity), Some(category))
                if errors.is_empty() =>
            {
                Ok(NewProduct {
                    name,
                    description,
                    price,
                    quantity,
                    image: self.image,
                    category,
                    is_active: true,
                })
            }
            _ => Err(errors),
        }
    }

    /// Merge present fields onto a loaded product, validating each one.
    /// Absent fields keep the stored values; the active flag and the
    /// timestamps are not touched here.
    pub fn apply_to(&self, product: &mut Product) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.is_some() {
            match non_empty(&self.name) {
                Some(name) => product.name = name,
                None => errors.insert("name", "name is required"),
            }
        }
        if self.description.is_some() {
            match non_empty(&self.description) {
                Some(description) => product.description = description,
                None => errors.insert("description", "description is required"),
            }
        }
        if let Some(raw) = self.price {
            if raw > Decimal::ZERO {
                match Money::new(raw) {
                    Ok(price) => product.price = price,
                    Err(error) => errors.insert("price", error.to_string()),
                }
            } else {
                errors.insert("price", "price must be greater than 0");
            }
        }
        if let Some(raw) = self.quantity {
            match u32::try_from(raw) {
                Ok(value) => product.quantity = Quantity::on_hand(value),
                Err(_) => errors.insert("quantity", "quantity cannot be negative"),
            }
        }
        if let Some(image) = &self.image {
            product.image = Some(image.clone());
        }
        if self.category.is_some() {
            match non_empty(&self.category) {
                Some(category) => product.category = category,
                None => errors.insert("category", "category is required"),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToString::to_string)
}
