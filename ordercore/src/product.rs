//! Product catalog entities.
//!
//! Products own the stock-on-hand counter that the order workflow reserves
//! against. A product is never deleted physically; retiring one clears its
//! active flag so existing order lines keep a valid reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{sql_datetime, Money, ProductId, Quantity};

/// A catalog product as stored, including its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Current unit price. Order lines snapshot this at creation time.
    pub price: Money,
    /// Units on hand and available for reservation.
    pub quantity: Quantity,
    /// Optional image path.
    pub image: Option<String>,
    /// Category label used for catalog filtering.
    pub category: String,
    /// Cleared instead of deleting the row.
    pub is_active: bool,
    /// When the product was created.
    #[serde(with = "sql_datetime")]
    pub created_at: DateTime<Utc>,
    /// When the product was last updated, if ever.
    #[serde(with = "sql_datetime::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field set for inserting a product; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Unit price.
    pub price: Money,
    /// Initial stock level.
    pub quantity: Quantity,
    /// Optional image path.
    pub image: Option<String>,
    /// Category label.
    pub category: String,
    /// New products start active.
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn product_serializes_with_sql_timestamps() {
        let created_at = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        let product = Product {
            id: ProductId::try_new(3).unwrap(),
            name: "Kettle".to_string(),
            description: "Stovetop kettle".to_string(),
            price: Money::new(dec!(24.90)).unwrap(),
            quantity: Quantity::on_hand(12),
            image: None,
            category: "kitchen".to_string(),
            is_active: true,
            created_at,
            updated_at: None,
        };

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["quantity"], 12);
        assert_eq!(json["is_active"], true);
        assert_eq!(json["created_at"], "2024-05-02 09:30:00");
        assert_eq!(json["updated_at"], serde_json::Value::Null);
    }
}
