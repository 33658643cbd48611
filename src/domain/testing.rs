//! In-memory fakes of the store and catalog ports plus small factories,
//! shared by the unit tests of the repository and the reporting engine.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::calc;
use super::errors::OrderError;
use super::order::{NewOrder, Order, OrderChanges, OrderLine, ProductInfo, SearchFilter};
use super::ports::{OrderStore, ProductLookup};
use super::reports::{ReportQuery, ReportSummary, SortKey};
use super::status::OrderStatus;

#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<Vec<Order>>,
    calls: Mutex<Vec<&'static str>>,
    fail_ops: Mutex<HashSet<&'static str>>,
    insert_conflicts: Mutex<u32>,
    insert_attempts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn seed(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }

    /// Operations recorded so far, in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes every subsequent call to `op` fail with a store error.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().insert(op);
    }

    /// Makes the next `n` inserts fail as if the identifier were taken.
    pub fn conflict_on_insert(&self, n: u32) {
        *self.insert_conflicts.lock().unwrap() = n;
    }

    /// Identifiers handed to `insert`, in order, including rejected ones.
    pub fn insert_attempts(&self) -> Vec<String> {
        self.insert_attempts.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) -> Result<(), OrderError> {
        self.calls.lock().unwrap().push(op);
        if self.fail_ops.lock().unwrap().contains(op) {
            return Err(OrderError::store(op, "injected failure"));
        }
        Ok(())
    }

    fn matches_report(order: &Order, query: &ReportQuery) -> bool {
        order.created_at >= query.start
            && order.created_at < query.end_exclusive
            && query.client_id.map_or(true, |id| order.client_id == id)
            && query
                .product_id
                .map_or(true, |id| order.products.iter().any(|l| l.product_id == id))
    }

    fn sort(orders: &mut [Order], key: SortKey) {
        match key {
            SortKey::TotalDesc => orders.sort_by(|a, b| b.total.cmp(&a.total)),
            SortKey::TotalAsc => orders.sort_by(|a, b| a.total.cmp(&b.total)),
            SortKey::DateDesc => orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortKey::DateAsc => orders.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortKey::QuantityDesc => {
                orders.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity))
            }
            SortKey::QuantityAsc => orders.sort_by(|a, b| a.total_quantity.cmp(&b.total_quantity)),
            SortKey::ClientNameAsc => {
                orders.sort_by(|a, b| a.client_name.to_lowercase().cmp(&b.client_name.to_lowercase()))
            }
            SortKey::ClientNameDesc => {
                orders.sort_by(|a, b| b.client_name.to_lowercase().cmp(&a.client_name.to_lowercase()))
            }
        }
    }
}

impl OrderStore for MemoryStore {
    fn insert(
        &self,
        new: &NewOrder,
        identifier: &str,
        lines: &[OrderLine],
        total: &BigDecimal,
        total_quantity: i32,
    ) -> Result<Order, OrderError> {
        self.record("orders.insert")?;
        self.insert_attempts
            .lock()
            .unwrap()
            .push(identifier.to_string());
        {
            let mut conflicts = self.insert_conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(OrderError::CreateConflict);
            }
        }
        let mut orders = self.orders.lock().unwrap();
        if orders.iter().any(|o| o.identifier == identifier) {
            return Err(OrderError::CreateConflict);
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            client_id: new.client_id,
            client_name: new.client_name.clone(),
            products: lines.to_vec(),
            total: total.clone(),
            total_quantity,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        orders.push(order.clone());
        Ok(order)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        self.record("orders.find_by_id")?;
        Ok(self.orders.lock().unwrap().iter().find(|o| o.id == id).cloned())
    }

    fn update_where_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        changes: &OrderChanges,
    ) -> Result<Option<Order>, OrderError> {
        self.record("orders.update")?;
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.iter_mut().find(|o| o.id == id && o.status == expected) else {
            return Ok(None);
        };
        if let Some(name) = &changes.client_name {
            order.client_name = name.clone();
        }
        if let Some(lines) = &changes.products {
            order.products = lines.clone();
        }
        if let Some(total) = &changes.total {
            order.total = total.clone();
        }
        if let Some(quantity) = changes.total_quantity {
            order.total_quantity = quantity;
        }
        if let Some(status) = changes.status {
            order.status = status;
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    fn delete_by_id(&self, id: Uuid) -> Result<bool, OrderError> {
        self.record("orders.delete")?;
        let mut orders = self.orders.lock().unwrap();
        let before = orders.len();
        orders.retain(|o| o.id != id);
        Ok(orders.len() < before)
    }

    fn search(
        &self,
        filter: &SearchFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), OrderError> {
        self.record("orders.search")?;
        let mut matches: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| {
                filter.status.map_or(true, |s| o.status == s)
                    && filter
                        .identifier
                        .as_ref()
                        .map_or(true, |i| o.identifier.eq_ignore_ascii_case(i))
                    && filter.client_name.as_ref().map_or(true, |n| {
                        o.client_name.to_lowercase().contains(&n.to_lowercase())
                    })
                    && filter.min_total.as_ref().map_or(true, |min| &o.total >= min)
                    && filter.max_total.as_ref().map_or(true, |max| &o.total <= max)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let start = ((page - 1) * limit).max(0) as usize;
        let items = matches
            .into_iter()
            .skip(start)
            .take(limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    fn find_for_report(&self, query: &ReportQuery) -> Result<(Vec<Order>, i64), OrderError> {
        self.record("orders.report_rows")?;
        let mut matches: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| Self::matches_report(o, query))
            .cloned()
            .collect();
        Self::sort(&mut matches, query.sort_by);
        let total = matches.len() as i64;
        let items = match (query.page, query.limit) {
            (Some(page), Some(limit)) => matches
                .into_iter()
                .skip(((page - 1) * limit).max(0) as usize)
                .take(limit.max(0) as usize)
                .collect(),
            _ => matches,
        };
        Ok((items, total))
    }

    fn report_summary(&self, query: &ReportQuery) -> Result<ReportSummary, OrderError> {
        self.record("orders.report_summary")?;
        let orders = self.orders.lock().unwrap();
        let matches: Vec<&Order> = orders
            .iter()
            .filter(|o| Self::matches_report(o, query))
            .collect();
        if matches.is_empty() {
            return Ok(ReportSummary::empty());
        }
        let revenue: BigDecimal = matches.iter().map(|o| o.total.clone()).sum();
        let count = matches.len() as i64;
        let average = (&revenue / BigDecimal::from(count)).with_scale_round(2, RoundingMode::HalfUp);
        Ok(ReportSummary {
            total_orders: count,
            total_revenue: revenue.with_scale_round(2, RoundingMode::HalfUp),
            total_quantity_sold: matches.iter().map(|o| o.total_quantity as i64).sum(),
            average_order_value: average,
        })
    }
}

/// Catalog fake with a lookup counter, so tests can assert that validation
/// failures never reach the collaborator. Prices can be repointed to verify
/// that persisted snapshots do not follow the catalog.
#[derive(Default)]
pub struct StaticProducts {
    catalog: Mutex<Vec<ProductInfo>>,
    lookups: AtomicUsize,
}

impl StaticProducts {
    pub fn with(catalog: Vec<ProductInfo>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_price(&self, id: Uuid, price: BigDecimal) {
        let mut catalog = self.catalog.lock().unwrap();
        if let Some(entry) = catalog.iter_mut().find(|p| p.id == id) {
            entry.price = price;
        }
    }
}

impl ProductLookup for StaticProducts {
    fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ProductInfo>, OrderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|p| wanted.contains(&p.id))
            .cloned()
            .collect())
    }
}

/// A persisted pending order with a single consistent line, for report and
/// search fixtures.
pub fn order_with(total: &str, quantity: i32, created_at: DateTime<Utc>) -> Order {
    let total = BigDecimal::from_str(total).expect("valid decimal literal");
    let price =
        (&total / BigDecimal::from(quantity.max(1))).with_scale_round(2, RoundingMode::HalfUp);
    Order {
        id: Uuid::new_v4(),
        identifier: calc::generate_identifier(created_at),
        client_id: Uuid::new_v4(),
        client_name: "Test Client".to_string(),
        products: vec![OrderLine {
            product_id: Uuid::new_v4(),
            quantity: quantity.max(1),
            price,
            name: "Fixture product".to_string(),
        }],
        total,
        total_quantity: quantity,
        status: OrderStatus::Pending,
        created_at,
        updated_at: created_at,
    }
}
