use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::OrderStatus;

/// One product entry within an order. `price` and `name` are snapshots taken
/// from the catalog at the moment the line was created or last recalculated;
/// they never change afterwards, even if the catalog does. Historical orders
/// must reflect the price that was actually charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    pub name: String,
}

impl OrderLine {
    /// `price * quantity`, rounded to 2 decimals.
    pub fn subtotal(&self) -> BigDecimal {
        (&self.price * BigDecimal::from(self.quantity))
            .with_scale_round(2, bigdecimal::RoundingMode::HalfUp)
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable business key, `ORD-YYYYMMDD-XXXXXX`. Unique via a
    /// store-level constraint.
    pub identifier: String,
    pub client_id: Uuid,
    /// Display name captured at creation time, independent of later changes
    /// to the client's profile.
    pub client_name: String,
    pub products: Vec<OrderLine>,
    pub total: BigDecimal,
    pub total_quantity: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product reference as requested by the caller, before prices and names
/// have been resolved against the catalog.
#[derive(Debug, Clone)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub client_id: Uuid,
    pub client_name: String,
    pub products: Vec<LineRequest>,
}

/// Partial update. `products` implies recomputation of totals; totals are
/// never patched on their own.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub client_name: Option<String>,
    pub products: Option<Vec<LineRequest>>,
    pub status: Option<OrderStatus>,
}

/// Resolved field changes handed to the store for a single atomic write.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub client_name: Option<String>,
    pub products: Option<Vec<OrderLine>>,
    pub total: Option<BigDecimal>,
    pub total_quantity: Option<i32>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub status: Option<OrderStatus>,
    /// Exact match, compared uppercased.
    pub identifier: Option<String>,
    /// Case-insensitive substring match.
    pub client_name: Option<String>,
    /// Inclusive bounds, independently optional.
    pub min_total: Option<BigDecimal>,
    pub max_total: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Catalog entry as returned by the product lookup collaborator.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub id: Uuid,
    pub price: BigDecimal,
    pub name: String,
}
