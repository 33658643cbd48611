use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::OrderError;
use crate::domain::order::{Order, OrderLine};
use crate::domain::status::OrderStatus;
use crate::schema::{orders, products};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub identifier: String,
    pub client_id: Uuid,
    pub client_name: String,
    /// Embedded order lines, document-style.
    pub products: Value,
    pub total: BigDecimal,
    pub total_quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Rows are written exclusively through the domain types, so a status or
    /// line payload that fails to decode means the stored data is corrupt.
    pub fn into_domain(self) -> Result<Order, OrderError> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(|e| OrderError::store("orders.decode", e))?;
        let lines: Vec<OrderLine> = serde_json::from_value(self.products)
            .map_err(|e| OrderError::store("orders.decode", e))?;
        Ok(Order {
            id: self.id,
            identifier: self.identifier,
            client_id: self.client_id,
            client_name: self.client_name,
            products: lines,
            total: self.total,
            total_quantity: self.total_quantity,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub identifier: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub products: Value,
    pub total: BigDecimal,
    pub total_quantity: i32,
    pub status: String,
}

/// Partial update row; `None` fields are left untouched by diesel.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderChangesRow {
    pub client_name: Option<String>,
    pub products: Option<Value>,
    pub total: Option<BigDecimal>,
    pub total_quantity: Option<i32>,
    pub status: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

pub fn lines_to_json(lines: &[OrderLine]) -> Result<Value, OrderError> {
    serde_json::to_value(lines).map_err(|e| OrderError::store("orders.encode", e))
}
