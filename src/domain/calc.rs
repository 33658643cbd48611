//! Pure order arithmetic: line resolution against a catalog snapshot, total
//! computation, and business-identifier generation. No I/O happens here.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use super::errors::OrderError;
use super::order::{LineRequest, OrderLine, ProductInfo};

/// Bounds enforced on order contents before any store or catalog call.
pub const MAX_LINES: usize = 50;
pub const MAX_QUANTITY: i32 = 1000;

const IDENTIFIER_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const IDENTIFIER_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub total: BigDecimal,
    pub total_quantity: i32,
}

/// Freezes a price/name snapshot onto every requested line. Unresolvable
/// product ids are collected and reported together, not one at a time.
pub fn resolve_lines(
    requested: &[LineRequest],
    catalog: &HashMap<Uuid, ProductInfo>,
) -> Result<Vec<OrderLine>, OrderError> {
    let missing: Vec<Uuid> = requested
        .iter()
        .map(|r| r.product_id)
        .filter(|id| !catalog.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(OrderError::ProductsNotFound(missing));
    }

    Ok(requested
        .iter()
        .map(|r| {
            let detail = &catalog[&r.product_id];
            OrderLine {
                product_id: r.product_id,
                quantity: r.quantity,
                price: detail.price.clone(),
                name: detail.name.clone(),
            }
        })
        .collect())
}

/// `total = round(Σ price·quantity, 2)` (half-up), `total_quantity = Σ quantity`.
pub fn compute_totals(lines: &[OrderLine]) -> Totals {
    let total: BigDecimal = lines
        .iter()
        .map(|l| &l.price * BigDecimal::from(l.quantity))
        .sum();
    Totals {
        total: total.with_scale_round(2, RoundingMode::HalfUp),
        total_quantity: lines.iter().map(|l| l.quantity).sum(),
    }
}

/// `ORD-{YYYYMMDD}-{R}` with a 6-character uppercase base-36 suffix.
/// Collisions are not checked here; the store's unique constraint on
/// `identifier` surfaces them as an insert error.
pub fn generate_identifier(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..IDENTIFIER_SUFFIX_LEN)
        .map(|_| IDENTIFIER_CHARSET[rng.gen_range(0..IDENTIFIER_CHARSET.len())] as char)
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

/// True when the product list satisfies the line-count and quantity bounds.
pub fn lines_are_valid(requested: &[LineRequest]) -> bool {
    !requested.is_empty()
        && requested.len() <= MAX_LINES
        && requested
            .iter()
            .all(|r| r.quantity >= 1 && r.quantity <= MAX_QUANTITY)
}
