//! Ports the order core depends on. The HTTP layer and the diesel-backed
//! infrastructure plug in at these seams; tests plug in in-memory fakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use super::errors::OrderError;
use super::order::{NewOrder, Order, OrderChanges, OrderLine, ProductInfo, SearchFilter};
use super::reports::{ReportQuery, ReportSummary};
use super::status::OrderStatus;

/// Product catalog collaborator, read-only. Returns at most one entry per
/// requested id and silently omits unknown ids; callers detect omissions by
/// set difference.
pub trait ProductLookup: Send + Sync + 'static {
    fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ProductInfo>, OrderError>;
}

/// Persistence collaborator for orders.
pub trait OrderStore: Send + Sync + 'static {
    /// Persists a new order. A duplicate business identifier must surface as
    /// [`OrderError::CreateConflict`] so the caller can retry with a fresh one.
    fn insert(
        &self,
        new: &NewOrder,
        identifier: &str,
        lines: &[OrderLine],
        total: &bigdecimal::BigDecimal,
        total_quantity: i32,
    ) -> Result<Order, OrderError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    /// Atomic conditional update: applies `changes` only if the row still has
    /// status `expected`, returning `None` when no row matched (the order is
    /// gone or another writer moved its status first). This is what closes
    /// the lost-update window between concurrent transitions.
    fn update_where_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        changes: &OrderChanges,
    ) -> Result<Option<Order>, OrderError>;

    /// Hard delete. Returns false when no row had this id.
    fn delete_by_id(&self, id: Uuid) -> Result<bool, OrderError>;

    /// Filtered, paginated listing. Returns the matching page plus the total
    /// match count across all pages.
    fn search(
        &self,
        filter: &SearchFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), OrderError>;

    /// Sorted (optionally paginated) report rows plus the unpaginated match
    /// count for the same predicate.
    fn find_for_report(&self, query: &ReportQuery) -> Result<(Vec<Order>, i64), OrderError>;

    /// Server-side summary aggregation over the report predicate.
    fn report_summary(&self, query: &ReportQuery) -> Result<ReportSummary, OrderError>;
}

/// Request-scoped cancellation signal. The core checks it before each store
/// call and surfaces [`OrderError::Cancelled`] instead of a partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), OrderError> {
        if self.is_cancelled() {
            Err(OrderError::Cancelled)
        } else {
            Ok(())
        }
    }
}
