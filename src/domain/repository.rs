//! Orchestrates order mutations: validation first, then the catalog lookup,
//! then a single store write. Every path either persists a complete order or
//! leaves the store untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::calc;
use super::errors::OrderError;
use super::order::{
    LineRequest, NewOrder, Order, OrderChanges, OrderPatch, Page, ProductInfo, SearchFilter,
};
use super::ports::{CancelToken, OrderStore, ProductLookup};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

pub struct OrderRepository<S, P> {
    store: Arc<S>,
    products: Arc<P>,
}

impl<S, P> Clone for OrderRepository<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            products: Arc::clone(&self.products),
        }
    }
}

impl<S: OrderStore, P: ProductLookup> OrderRepository<S, P> {
    pub fn new(store: Arc<S>, products: Arc<P>) -> Self {
        Self { store, products }
    }

    /// Creates an order with status `pending`. Product bounds are checked
    /// before the catalog is consulted; prices and names are frozen onto the
    /// lines at this moment. An identifier collision is retried once with a
    /// fresh identifier before the conflict is surfaced.
    pub fn create(&self, request: &NewOrder, cancel: &CancelToken) -> Result<Order, OrderError> {
        if !calc::lines_are_valid(&request.products) {
            return Err(OrderError::InvalidOrderProducts);
        }
        cancel.check()?;

        let catalog = self.load_catalog(&request.products)?;
        let lines = calc::resolve_lines(&request.products, &catalog)?;
        let totals = calc::compute_totals(&lines);

        cancel.check()?;
        let identifier = calc::generate_identifier(Utc::now());
        match self
            .store
            .insert(request, &identifier, &lines, &totals.total, totals.total_quantity)
        {
            Err(OrderError::CreateConflict) => {
                log::warn!(
                    "order identifier {} already taken, retrying with a fresh one",
                    identifier
                );
                let retry = calc::generate_identifier(Utc::now());
                self.store
                    .insert(request, &retry, &lines, &totals.total, totals.total_quantity)
            }
            other => other,
        }
    }

    /// Applies a partial update. All validation happens against the loaded
    /// order before anything is written, and the write itself is conditional
    /// on the status still being the one the validation saw.
    pub fn update_by_id(
        &self,
        id: Uuid,
        patch: &OrderPatch,
        cancel: &CancelToken,
    ) -> Result<Order, OrderError> {
        cancel.check()?;
        let existing = self
            .store
            .find_by_id(id)?
            .ok_or(OrderError::OrderNotFound)?;
        if !existing.status.is_modifiable() {
            return Err(OrderError::OrderNotModifiable);
        }
        if let Some(to) = patch.status {
            existing.status.validate_transition(to)?;
        }

        let mut changes = OrderChanges {
            client_name: patch.client_name.clone(),
            status: patch.status,
            ..Default::default()
        };
        if let Some(requested) = &patch.products {
            if !calc::lines_are_valid(requested) {
                return Err(OrderError::InvalidOrderProducts);
            }
            cancel.check()?;
            let catalog = self.load_catalog(requested)?;
            let lines = calc::resolve_lines(requested, &catalog)?;
            let totals = calc::compute_totals(&lines);
            changes.products = Some(lines);
            changes.total = Some(totals.total);
            changes.total_quantity = Some(totals.total_quantity);
        }

        cancel.check()?;
        match self
            .store
            .update_where_status(id, existing.status, &changes)?
        {
            Some(updated) => Ok(updated),
            // The conditional write matched nothing: the order vanished or a
            // concurrent writer moved its status first. Reload and re-derive
            // the precise error instead of reporting a silent no-op.
            None => match self.store.find_by_id(id)? {
                None => Err(OrderError::OrderNotFound),
                Some(current) => {
                    if !current.status.is_modifiable() {
                        Err(OrderError::OrderNotModifiable)
                    } else if let Some(to) = patch.status {
                        current
                            .status
                            .validate_transition(to)
                            .and(Err(concurrent_update_error()))
                    } else {
                        Err(concurrent_update_error())
                    }
                }
            },
        }
    }

    pub fn delete_by_id(&self, id: Uuid) -> Result<(), OrderError> {
        if self.store.delete_by_id(id)? {
            Ok(())
        } else {
            Err(OrderError::OrderNotFound)
        }
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        self.store.find_by_id(id)
    }

    pub fn find_all(&self, page: i64, limit: i64) -> Result<Page<Order>, OrderError> {
        self.search(&SearchFilter::default(), page, limit)
    }

    pub fn search(
        &self,
        filter: &SearchFilter,
        page: i64,
        limit: i64,
    ) -> Result<Page<Order>, OrderError> {
        let page = page.max(DEFAULT_PAGE);
        let limit = limit.clamp(1, MAX_LIMIT);
        let (items, total) = self.store.search(filter, page, limit)?;
        Ok(Page::new(items, total, page, limit))
    }

    /// Batch catalog call with all requested product ids, deduplicated.
    fn load_catalog(
        &self,
        requested: &[LineRequest],
    ) -> Result<HashMap<Uuid, ProductInfo>, OrderError> {
        let mut ids: Vec<Uuid> = requested.iter().map(|r| r.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let found = self.products.find_many_by_ids(&ids)?;
        Ok(found.into_iter().map(|p| (p.id, p)).collect())
    }
}

fn concurrent_update_error() -> OrderError {
    OrderError::store("orders.update", "lost a concurrent update, please retry")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::domain::status::OrderStatus;
    use crate::domain::testing::{order_with, MemoryStore, StaticProducts};

    fn product(price: &str, name: &str) -> ProductInfo {
        ProductInfo {
            id: Uuid::new_v4(),
            price: BigDecimal::from_str(price).unwrap(),
            name: name.to_string(),
        }
    }

    fn repo_with(
        catalog: Vec<ProductInfo>,
    ) -> (
        Arc<MemoryStore>,
        Arc<StaticProducts>,
        OrderRepository<MemoryStore, StaticProducts>,
    ) {
        let store = Arc::new(MemoryStore::default());
        let products = Arc::new(StaticProducts::with(catalog));
        let repo = OrderRepository::new(Arc::clone(&store), Arc::clone(&products));
        (store, products, repo)
    }

    fn new_order(products: Vec<LineRequest>) -> NewOrder {
        NewOrder {
            client_id: Uuid::new_v4(),
            client_name: "Ada Lovelace".to_string(),
            products,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> LineRequest {
        LineRequest {
            product_id,
            quantity,
        }
    }

    #[test]
    fn create_freezes_prices_and_computes_totals() {
        let keyboard = product("10.00", "Keyboard");
        let mouse = product("5.00", "Mouse");
        let (_, _, repo) = repo_with(vec![keyboard.clone(), mouse.clone()]);

        let order = repo
            .create(
                &new_order(vec![line(keyboard.id, 2), line(mouse.id, 1)]),
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, BigDecimal::from_str("25.00").unwrap());
        assert_eq!(order.total_quantity, 3);
        assert_eq!(order.products[0].price, keyboard.price);
        assert_eq!(order.products[0].name, "Keyboard");
        assert!(order.identifier.starts_with("ORD-"));
    }

    #[test]
    fn create_rejects_empty_products_before_any_lookup() {
        let (store, products, repo) = repo_with(vec![]);
        let err = repo
            .create(&new_order(vec![]), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidOrderProducts));
        assert_eq!(products.lookup_count(), 0);
        assert_eq!(store.calls(), Vec::<&str>::new());
    }

    #[test]
    fn create_rejects_non_positive_quantities() {
        let p = product("1.00", "Widget");
        let (_, products, repo) = repo_with(vec![p.clone()]);
        let err = repo
            .create(&new_order(vec![line(p.id, 0)]), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidOrderProducts));
        assert_eq!(products.lookup_count(), 0);
    }

    #[test]
    fn create_reports_all_unknown_products() {
        let known = product("1.00", "Known");
        let (_, _, repo) = repo_with(vec![known.clone()]);
        let ghost_a = Uuid::new_v4();
        let ghost_b = Uuid::new_v4();

        let err = repo
            .create(
                &new_order(vec![line(ghost_a, 1), line(known.id, 1), line(ghost_b, 1)]),
                &CancelToken::new(),
            )
            .unwrap_err();

        match err {
            OrderError::ProductsNotFound(ids) => {
                assert!(ids.contains(&ghost_a));
                assert!(ids.contains(&ghost_b));
                assert!(!ids.contains(&known.id));
            }
            other => panic!("expected ProductsNotFound, got {:?}", other),
        }
    }

    #[test]
    fn create_retries_with_a_fresh_identifier_on_conflict() {
        let p = product("2.00", "Widget");
        let (store, _, repo) = repo_with(vec![p.clone()]);
        store.conflict_on_insert(1);

        let order = repo
            .create(&new_order(vec![line(p.id, 1)]), &CancelToken::new())
            .unwrap();

        let attempts = store.insert_attempts();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0], attempts[1], "retry must regenerate, not reuse");
        assert_eq!(order.identifier, attempts[1]);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn create_surfaces_conflict_after_second_collision() {
        let p = product("2.00", "Widget");
        let (store, _, repo) = repo_with(vec![p.clone()]);
        store.conflict_on_insert(2);

        let err = repo
            .create(&new_order(vec![line(p.id, 1)]), &CancelToken::new())
            .unwrap_err();

        // Exactly one retry, then the conflict propagates.
        assert!(matches!(err, OrderError::CreateConflict));
        assert_eq!(store.calls(), vec!["orders.insert", "orders.insert"]);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn create_does_not_retry_plain_store_failures() {
        let p = product("2.00", "Widget");
        let (store, _, repo) = repo_with(vec![p.clone()]);
        store.fail_next("orders.insert");
        let err = repo
            .create(&new_order(vec![line(p.id, 1)]), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, OrderError::Store { .. }));
        assert_eq!(store.calls(), vec!["orders.insert"]);
    }

    #[test]
    fn create_cancelled_before_lookup_touches_nothing() {
        let p = product("2.00", "Widget");
        let (store, products, repo) = repo_with(vec![p.clone()]);
        let token = CancelToken::new();
        token.cancel();
        let err = repo
            .create(&new_order(vec![line(p.id, 1)]), &token)
            .unwrap_err();
        assert!(matches!(err, OrderError::Cancelled));
        assert_eq!(products.lookup_count(), 0);
        assert_eq!(store.calls(), Vec::<&str>::new());
    }

    #[test]
    fn update_unknown_order_fails_not_found() {
        let (_, _, repo) = repo_with(vec![]);
        let err = repo
            .update_by_id(Uuid::new_v4(), &OrderPatch::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound));
    }

    #[test]
    fn update_applies_valid_status_transition() {
        let (store, _, repo) = repo_with(vec![]);
        let mut order = order_with("10.00", 1, Utc::now());
        order.status = OrderStatus::Shipped;
        let id = order.id;
        store.seed(order);

        let patch = OrderPatch {
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        };
        let updated = repo.update_by_id(id, &patch, &CancelToken::new()).unwrap();
        assert_eq!(updated.status, OrderStatus::Delivered);

        // The same order is now delivered; moving back to processing is
        // not in the table.
        let backwards = OrderPatch {
            status: Some(OrderStatus::Processing),
            ..Default::default()
        };
        let err = repo
            .update_by_id(id, &backwards, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Processing,
            }
        ));
    }

    #[test]
    fn update_rejects_any_change_to_terminal_orders() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            let (store, _, repo) = repo_with(vec![]);
            let mut order = order_with("10.00", 1, Utc::now());
            order.status = terminal;
            let id = order.id;
            store.seed(order);

            let patch = OrderPatch {
                client_name: Some("New Name".to_string()),
                ..Default::default()
            };
            let err = repo
                .update_by_id(id, &patch, &CancelToken::new())
                .unwrap_err();
            assert!(
                matches!(err, OrderError::OrderNotModifiable),
                "status {} should be frozen",
                terminal
            );
        }
    }

    #[test]
    fn update_products_recomputes_totals_and_snapshots() {
        let p = product("7.50", "Cable");
        let (store, _, repo) = repo_with(vec![p.clone()]);
        let order = order_with("10.00", 1, Utc::now());
        let id = order.id;
        store.seed(order);

        let patch = OrderPatch {
            products: Some(vec![line(p.id, 4)]),
            ..Default::default()
        };
        let updated = repo.update_by_id(id, &patch, &CancelToken::new()).unwrap();

        assert_eq!(updated.total, BigDecimal::from_str("30.00").unwrap());
        assert_eq!(updated.total_quantity, 4);
        assert_eq!(updated.products.len(), 1);
        assert_eq!(updated.products[0].price, p.price);
        assert_eq!(updated.products[0].name, "Cable");
    }

    #[test]
    fn update_rejects_empty_product_list() {
        let (store, products, repo) = repo_with(vec![]);
        let order = order_with("10.00", 1, Utc::now());
        let id = order.id;
        store.seed(order);

        let patch = OrderPatch {
            products: Some(vec![]),
            ..Default::default()
        };
        let err = repo
            .update_by_id(id, &patch, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidOrderProducts));
        assert_eq!(products.lookup_count(), 0);
        // Only the initial load hit the store; nothing was written.
        assert_eq!(store.calls(), vec!["orders.find_by_id"]);
    }

    #[test]
    fn update_lost_race_surfaces_as_store_conflict() {
        let (store, _, repo) = repo_with(vec![]);
        let order = order_with("10.00", 1, Utc::now());
        let id = order.id;
        store.seed(order);

        // Another writer moves the order between our read and our write.
        store
            .update_where_status(
                id,
                OrderStatus::Pending,
                &OrderChanges {
                    status: Some(OrderStatus::Processing),
                    ..Default::default()
                },
            )
            .unwrap();

        // Our patch was validated against pending, so the conditional write
        // matches nothing; processing -> processing is invalid on reload.
        let patch = OrderPatch {
            status: Some(OrderStatus::Processing),
            ..Default::default()
        };
        let err = repo
            .update_by_id(id, &patch, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStatusTransition { .. } | OrderError::Store { .. }
        ));
    }

    #[test]
    fn delete_is_existence_checked() {
        let (store, _, repo) = repo_with(vec![]);
        let order = order_with("10.00", 1, Utc::now());
        let id = order.id;
        store.seed(order);

        repo.delete_by_id(id).unwrap();
        assert!(store.snapshot().is_empty());
        let err = repo.delete_by_id(id).unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound));
    }

    #[test]
    fn search_combines_filters_and_paginates() {
        let (store, _, repo) = repo_with(vec![]);
        for i in 0..5 {
            let mut order = order_with("10.00", 1, Utc::now());
            order.client_name = format!("Client {}", i);
            store.seed(order);
        }
        let mut expensive = order_with("500.00", 1, Utc::now());
        expensive.client_name = "Big Spender".to_string();
        store.seed(expensive);

        let filter = SearchFilter {
            min_total: Some(BigDecimal::from_str("100.00").unwrap()),
            ..Default::default()
        };
        let page = repo.search(&filter, 1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].client_name, "Big Spender");

        let by_name = SearchFilter {
            client_name: Some("client".to_string()),
            ..Default::default()
        };
        let page = repo.search(&by_name, 1, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn search_normalizes_page_and_limit() {
        let (_, _, repo) = repo_with(vec![]);
        let page = repo.search(&SearchFilter::default(), 0, 5000).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_LIMIT);
    }

    #[test]
    fn price_snapshot_survives_catalog_changes() {
        let p = product("10.00", "Keyboard");
        let (store, products, repo) = repo_with(vec![p.clone()]);
        let order = repo
            .create(&new_order(vec![line(p.id, 2)]), &CancelToken::new())
            .unwrap();

        products.set_price(p.id, BigDecimal::from_str("99.99").unwrap());

        // A patch that does not touch products must not re-resolve prices.
        let rename = OrderPatch {
            client_name: Some("Renamed Client".to_string()),
            ..Default::default()
        };
        let updated = repo
            .update_by_id(order.id, &rename, &CancelToken::new())
            .unwrap();
        assert_eq!(
            updated.products[0].price,
            BigDecimal::from_str("10.00").unwrap()
        );
        assert_eq!(updated.total, BigDecimal::from_str("20.00").unwrap());

        // A patch that does touch products re-snapshots at the new price.
        let repatch = OrderPatch {
            products: Some(vec![line(p.id, 2)]),
            ..Default::default()
        };
        let repriced = repo
            .update_by_id(order.id, &repatch, &CancelToken::new())
            .unwrap();
        assert_eq!(
            repriced.products[0].price,
            BigDecimal::from_str("99.99").unwrap()
        );
        assert_eq!(repriced.total, BigDecimal::from_str("199.98").unwrap());

        let reloaded = store.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(reloaded.total, BigDecimal::from_str("199.98").unwrap());
    }
}
