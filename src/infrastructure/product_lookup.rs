use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::OrderError;
use crate::domain::order::ProductInfo;
use crate::domain::ports::ProductLookup;
use crate::schema::products;

use super::models::ProductRow;

/// Read-only catalog access. Returns one entry per known id and omits the
/// rest; callers detect missing products by set difference.
pub struct DieselProductLookup {
    pool: DbPool,
}

impl DieselProductLookup {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProductLookup for DieselProductLookup {
    fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ProductInfo>, OrderError> {
        let mut conn = self.pool.get().map_err(|e| {
            log::error!("could not get a connection for products.find_many: {}", e);
            OrderError::store("products.find_many", e)
        })?;
        let rows = products::table
            .filter(products::id.eq_any(ids))
            .select(ProductRow::as_select())
            .load::<ProductRow>(&mut conn)
            .map_err(|e| {
                log::error!("store operation products.find_many failed: {}", e);
                OrderError::store("products.find_many", e)
            })?;
        Ok(rows
            .into_iter()
            .map(|p| ProductInfo {
                id: p.id,
                price: p.price,
                name: p.name,
            })
            .collect())
    }
}
