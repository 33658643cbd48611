use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::OrderError;
use crate::domain::order::{NewOrder, Order, OrderPatch, Page, SearchFilter};
use crate::domain::ports::{CancelToken, OrderStore, ProductLookup};
use crate::domain::reports::{ReportEngine, ReportOutput, ReportRequest};
use crate::domain::repository::OrderRepository;

pub const DELETED_MESSAGE: &str = "Order deleted successfully";

/// Thin façade over the repository and the reporting engine; the HTTP layer
/// talks to this and nothing below it.
pub struct OrderService<S, P> {
    repo: OrderRepository<S, P>,
    reports: ReportEngine<S>,
}

impl<S, P> Clone for OrderService<S, P> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            reports: self.reports.clone(),
        }
    }
}

impl<S: OrderStore, P: ProductLookup> OrderService<S, P> {
    pub fn new(store: Arc<S>, products: Arc<P>) -> Self {
        Self {
            repo: OrderRepository::new(Arc::clone(&store), products),
            reports: ReportEngine::new(store),
        }
    }

    pub fn create(&self, request: &NewOrder, cancel: &CancelToken) -> Result<Order, OrderError> {
        self.repo.create(request, cancel)
    }

    pub fn find_one(&self, id: Uuid) -> Result<Order, OrderError> {
        self.repo.find_by_id(id)?.ok_or(OrderError::OrderNotFound)
    }

    pub fn find_all(&self, page: i64, limit: i64) -> Result<Page<Order>, OrderError> {
        self.repo.find_all(page, limit)
    }

    pub fn update(
        &self,
        id: Uuid,
        patch: &OrderPatch,
        cancel: &CancelToken,
    ) -> Result<Order, OrderError> {
        self.repo.update_by_id(id, patch, cancel)
    }

    pub fn remove(&self, id: Uuid) -> Result<&'static str, OrderError> {
        self.repo.delete_by_id(id)?;
        Ok(DELETED_MESSAGE)
    }

    pub fn search(
        &self,
        filter: &SearchFilter,
        page: i64,
        limit: i64,
    ) -> Result<Page<Order>, OrderError> {
        self.repo.search(filter, page, limit)
    }

    pub fn generate_report(
        &self,
        request: &ReportRequest,
        cancel: &CancelToken,
    ) -> Result<ReportOutput, OrderError> {
        self.reports.generate(request, cancel)
    }
}
