//! Diesel-backed [`OrderStore`]. Orders live in a single `orders` row with
//! the line snapshots embedded as jsonb; `total` and `total_quantity` are
//! real columns so reporting aggregates run server-side.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::Utc;
use diesel::dsl::{avg, count_star, sql, sum};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Jsonb};
use serde_json::json;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::OrderError;
use crate::domain::order::{NewOrder, Order, OrderChanges, OrderLine, SearchFilter};
use crate::domain::ports::OrderStore;
use crate::domain::reports::{ReportQuery, ReportSummary, SortKey};
use crate::domain::status::OrderStatus;
use crate::schema::orders;

use super::models::{lines_to_json, NewOrderRow, OrderChangesRow, OrderRow};

// Needed so diesel transactions can fail with our error type; explicit
// `map_db` calls below keep the operation context for everything else.
impl From<DieselError> for OrderError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                OrderError::CreateConflict
            }
            other => OrderError::store("orders", other),
        }
    }
}

fn map_db(op: &'static str) -> impl Fn(DieselError) -> OrderError {
    move |e| match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            OrderError::CreateConflict
        }
        other => {
            log::error!("store operation {} failed: {}", op, other);
            OrderError::store(op, other)
        }
    }
}

pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
        op: &'static str,
    ) -> Result<r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, OrderError>
    {
        self.pool.get().map_err(|e| {
            log::error!("could not get a connection for {}: {}", op, e);
            OrderError::store(op, e)
        })
    }
}

type BoxedOrders<'a> = orders::BoxedQuery<'a, diesel::pg::Pg>;

fn apply_report_predicate<'a>(mut q: BoxedOrders<'a>, query: &ReportQuery) -> BoxedOrders<'a> {
    q = q
        .filter(orders::created_at.ge(query.start))
        .filter(orders::created_at.lt(query.end_exclusive));
    if let Some(client_id) = query.client_id {
        q = q.filter(orders::client_id.eq(client_id));
    }
    if let Some(product_id) = query.product_id {
        // Containment over the embedded lines; backed by a GIN index.
        q = q.filter(
            sql::<Bool>("products @> ").bind::<Jsonb, _>(json!([{ "productId": product_id }])),
        );
    }
    q
}

fn apply_search_filter<'a>(mut q: BoxedOrders<'a>, filter: &SearchFilter) -> BoxedOrders<'a> {
    if let Some(status) = filter.status {
        q = q.filter(orders::status.eq(status.as_str()));
    }
    if let Some(identifier) = &filter.identifier {
        q = q.filter(orders::identifier.eq(identifier.to_uppercase()));
    }
    if let Some(name) = &filter.client_name {
        q = q.filter(orders::client_name.ilike(format!("%{}%", name)));
    }
    if let Some(min) = &filter.min_total {
        q = q.filter(orders::total.ge(min.clone()));
    }
    if let Some(max) = &filter.max_total {
        q = q.filter(orders::total.le(max.clone()));
    }
    q
}

fn apply_sort(q: BoxedOrders<'_>, key: SortKey) -> BoxedOrders<'_> {
    match key {
        SortKey::TotalDesc => q.order(orders::total.desc()),
        SortKey::TotalAsc => q.order(orders::total.asc()),
        SortKey::DateDesc => q.order(orders::created_at.desc()),
        SortKey::DateAsc => q.order(orders::created_at.asc()),
        SortKey::QuantityDesc => q.order(orders::total_quantity.desc()),
        SortKey::QuantityAsc => q.order(orders::total_quantity.asc()),
        SortKey::ClientNameAsc => q.order(orders::client_name.asc()),
        SortKey::ClientNameDesc => q.order(orders::client_name.desc()),
    }
}

fn rows_to_domain(rows: Vec<OrderRow>) -> Result<Vec<Order>, OrderError> {
    rows.into_iter().map(OrderRow::into_domain).collect()
}

impl OrderStore for DieselOrderStore {
    fn insert(
        &self,
        new: &NewOrder,
        identifier: &str,
        lines: &[OrderLine],
        total: &BigDecimal,
        total_quantity: i32,
    ) -> Result<Order, OrderError> {
        let mut conn = self.conn("orders.insert")?;
        let row = NewOrderRow {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            client_id: new.client_id,
            client_name: new.client_name.clone(),
            products: lines_to_json(lines)?,
            total: total.clone(),
            total_quantity,
            status: OrderStatus::Pending.as_str().to_string(),
        };
        diesel::insert_into(orders::table)
            .values(&row)
            .returning(OrderRow::as_returning())
            .get_result::<OrderRow>(&mut conn)
            .map_err(map_db("orders.insert"))?
            .into_domain()
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let mut conn = self.conn("orders.find_by_id")?;
        orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first::<OrderRow>(&mut conn)
            .optional()
            .map_err(map_db("orders.find_by_id"))?
            .map(OrderRow::into_domain)
            .transpose()
    }

    fn update_where_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        changes: &OrderChanges,
    ) -> Result<Option<Order>, OrderError> {
        let mut conn = self.conn("orders.update")?;
        let row = OrderChangesRow {
            client_name: changes.client_name.clone(),
            products: changes
                .products
                .as_deref()
                .map(lines_to_json)
                .transpose()?,
            total: changes.total.clone(),
            total_quantity: changes.total_quantity,
            status: changes.status.map(|s| s.as_str().to_string()),
            updated_at: Utc::now(),
        };
        // The status predicate makes this a compare-and-set: a concurrent
        // transition invalidates the write instead of being overwritten.
        diesel::update(
            orders::table
                .filter(orders::id.eq(id))
                .filter(orders::status.eq(expected.as_str())),
        )
        .set(&row)
        .returning(OrderRow::as_returning())
        .get_result::<OrderRow>(&mut conn)
        .optional()
        .map_err(map_db("orders.update"))?
        .map(OrderRow::into_domain)
        .transpose()
    }

    fn delete_by_id(&self, id: Uuid) -> Result<bool, OrderError> {
        let mut conn = self.conn("orders.delete")?;
        let deleted = diesel::delete(orders::table.filter(orders::id.eq(id)))
            .execute(&mut conn)
            .map_err(map_db("orders.delete"))?;
        Ok(deleted > 0)
    }

    fn search(
        &self,
        filter: &SearchFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), OrderError> {
        let mut conn = self.conn("orders.search")?;
        conn.transaction::<_, OrderError, _>(|conn| {
            let total: i64 = apply_search_filter(orders::table.into_boxed(), filter)
                .count()
                .get_result(conn)
                .map_err(map_db("orders.search"))?;

            let rows = apply_search_filter(orders::table.into_boxed(), filter)
                .order(orders::created_at.desc())
                .limit(limit)
                .offset((page - 1) * limit)
                .select(OrderRow::as_select())
                .load::<OrderRow>(conn)
                .map_err(map_db("orders.search"))?;

            Ok((rows_to_domain(rows)?, total))
        })
    }

    fn find_for_report(&self, query: &ReportQuery) -> Result<(Vec<Order>, i64), OrderError> {
        let mut conn = self.conn("orders.report_rows")?;
        conn.transaction::<_, OrderError, _>(|conn| {
            let total: i64 = apply_report_predicate(orders::table.into_boxed(), query)
                .count()
                .get_result(conn)
                .map_err(map_db("orders.report_rows"))?;

            let mut q = apply_sort(
                apply_report_predicate(orders::table.into_boxed(), query),
                query.sort_by,
            );
            if let (Some(page), Some(limit)) = (query.page, query.limit) {
                q = q.limit(limit).offset((page - 1) * limit);
            }
            let rows = q
                .select(OrderRow::as_select())
                .load::<OrderRow>(conn)
                .map_err(map_db("orders.report_rows"))?;

            Ok((rows_to_domain(rows)?, total))
        })
    }

    fn report_summary(&self, query: &ReportQuery) -> Result<ReportSummary, OrderError> {
        let mut conn = self.conn("orders.report_summary")?;
        let (count, revenue, quantity, average): (
            i64,
            Option<BigDecimal>,
            Option<i64>,
            Option<BigDecimal>,
        ) = apply_report_predicate(orders::table.into_boxed(), query)
            .select((
                count_star(),
                sum(orders::total),
                sum(orders::total_quantity),
                avg(orders::total),
            ))
            .first(&mut conn)
            .map_err(map_db("orders.report_summary"))?;

        if count == 0 {
            return Ok(ReportSummary::empty());
        }
        Ok(ReportSummary {
            total_orders: count,
            total_revenue: revenue
                .unwrap_or_else(|| BigDecimal::from(0))
                .with_scale_round(2, RoundingMode::HalfUp),
            total_quantity_sold: quantity.unwrap_or(0),
            average_order_value: average
                .unwrap_or_else(|| BigDecimal::from(0))
                .with_scale_round(2, RoundingMode::HalfUp),
        })
    }
}
