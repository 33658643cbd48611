//! Sales reporting: builds the matching predicate from a report request,
//! issues the row and summary queries, and renders the result as structured
//! JSON or as flat delimited text. The query side is renderer-agnostic; both
//! outputs are derived from the same row representation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::OrderError;
use super::order::{Order, OrderLine};
use super::ports::{CancelToken, OrderStore};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// UTF-8 byte-order marker, prepended so spreadsheet tools pick the right
/// encoding.
const UTF8_BOM: &str = "\u{FEFF}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    TotalDesc,
    TotalAsc,
    DateDesc,
    DateAsc,
    QuantityDesc,
    QuantityAsc,
    ClientNameAsc,
    ClientNameDesc,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::TotalDesc => "total_desc",
            SortKey::TotalAsc => "total_asc",
            SortKey::DateDesc => "date_desc",
            SortKey::DateAsc => "date_asc",
            SortKey::QuantityDesc => "quantity_desc",
            SortKey::QuantityAsc => "quantity_asc",
            SortKey::ClientNameAsc => "client_name_asc",
            SortKey::ClientNameDesc => "client_name_desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_desc" => Ok(SortKey::TotalDesc),
            "total_asc" => Ok(SortKey::TotalAsc),
            "date_desc" => Ok(SortKey::DateDesc),
            "date_asc" => Ok(SortKey::DateAsc),
            "quantity_desc" => Ok(SortKey::QuantityDesc),
            "quantity_asc" => Ok(SortKey::QuantityAsc),
            "client_name_asc" => Ok(SortKey::ClientNameAsc),
            "client_name_desc" => Ok(SortKey::ClientNameDesc),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Inclusive civil-date range; both bounds mandatory.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub client_id: Option<Uuid>,
    /// Matches orders containing at least one line with this product.
    pub product_id: Option<Uuid>,
    pub sort_by: SortKey,
    pub format: ReportFormat,
    pub page: i64,
    pub limit: i64,
}

/// The predicate + ordering handed to the store. `end_exclusive` is the day
/// after `end_date` so the inclusive civil range becomes a half-open
/// timestamp range.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub start: DateTime<Utc>,
    pub end_exclusive: DateTime<Utc>,
    pub client_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub sort_by: SortKey,
    /// None for CSV: the flat export always covers the full result set.
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ReportQuery {
    fn from_request(req: &ReportRequest) -> Self {
        let start = req
            .start_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let end_exclusive = req
            .end_date
            .checked_add_days(Days::new(1))
            .unwrap_or(req.end_date)
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let (page, limit) = match req.format {
            ReportFormat::Csv => (None, None),
            ReportFormat::Json => (Some(req.page.max(1)), Some(req.limit.clamp(1, 100))),
        };
        Self {
            start,
            end_exclusive,
            client_id: req.client_id,
            product_id: req.product_id,
            sort_by: req.sort_by,
            page,
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_orders: i64,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    pub total_quantity_sold: i64,
    #[schema(value_type = String)]
    pub average_order_value: BigDecimal,
}

impl ReportSummary {
    pub fn empty() -> Self {
        Self {
            total_orders: 0,
            total_revenue: BigDecimal::from(0),
            total_quantity_sold: 0,
            average_order_value: BigDecimal::from(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub client_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub sort_by: SortKey,
}

/// One order in the report output, with its line snapshots.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub order_id: Uuid,
    pub identifier: String,
    pub client_id: Uuid,
    pub client_name: String,
    #[schema(value_type = String)]
    pub total: BigDecimal,
    pub total_quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub products: Vec<OrderLine>,
}

impl From<&Order> for ReportRow {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            identifier: order.identifier.clone(),
            client_id: order.client_id,
            client_name: order.client_name.clone(),
            total: order.total.clone(),
            total_quantity: order.total_quantity,
            status: order.status.to_string(),
            created_at: order.created_at,
            products: order.products.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub data: Vec<ReportRow>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub filters: AppliedFilters,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone)]
pub struct CsvReport {
    pub content: String,
    pub content_type: &'static str,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub enum ReportOutput {
    Json(JsonReport),
    Csv(CsvReport),
}

pub struct ReportEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ReportEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderStore> ReportEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Runs the row query and the summary aggregation over the same predicate
    /// and renders the requested format. The date range is validated before
    /// any store query is issued, and a summary failure aborts the whole
    /// report rather than returning zeroed statistics.
    pub fn generate(
        &self,
        req: &ReportRequest,
        cancel: &CancelToken,
    ) -> Result<ReportOutput, OrderError> {
        if req.start_date > req.end_date {
            return Err(OrderError::InvalidDateRange);
        }
        cancel.check()?;

        let query = ReportQuery::from_request(req);
        let (orders, total) = self
            .store
            .find_for_report(&query)
            .map_err(wrap_query_failure)?;
        cancel.check()?;
        let summary = self
            .store
            .report_summary(&query)
            .map_err(wrap_query_failure)?;

        let rows: Vec<ReportRow> = orders.iter().map(ReportRow::from).collect();
        let filters = AppliedFilters {
            start_date: req.start_date,
            end_date: req.end_date,
            client_id: req.client_id,
            product_id: req.product_id,
            sort_by: req.sort_by,
        };

        match req.format {
            ReportFormat::Json => {
                let page = query.page.unwrap_or(1);
                let limit = query.limit.unwrap_or(10);
                Ok(ReportOutput::Json(JsonReport {
                    data: rows,
                    total,
                    page,
                    limit,
                    total_pages: if limit > 0 { (total + limit - 1) / limit } else { 0 },
                    filters,
                    summary,
                }))
            }
            ReportFormat::Csv => {
                let generated_at = Utc::now();
                Ok(ReportOutput::Csv(CsvReport {
                    content: render_csv(&rows, &summary, &filters, generated_at),
                    content_type: CSV_CONTENT_TYPE,
                    filename: format!("order-reports-{}.csv", generated_at.format("%Y-%m-%d")),
                }))
            }
        }
    }
}

/// Store failures become `ReportFailed`; cancellation passes through so the
/// caller still sees the distinct condition.
fn wrap_query_failure(err: OrderError) -> OrderError {
    match err {
        OrderError::Cancelled => OrderError::Cancelled,
        other => OrderError::ReportFailed(other.to_string()),
    }
}

const CSV_HEADER: [&str; 13] = [
    "orderId",
    "identifier",
    "clientId",
    "clientName",
    "total",
    "totalQuantity",
    "status",
    "createdAt",
    "productId",
    "name",
    "quantity",
    "price",
    "subtotal",
];

/// Flat export: one row per order line, the parent order's fields repeated on
/// each. Data rows are followed by a blank separator and a summary block.
fn render_csv(
    rows: &[ReportRow],
    summary: &ReportSummary,
    filters: &AppliedFilters,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::from(UTF8_BOM);
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for row in rows {
        for line in &row.products {
            let subtotal = line.subtotal();
            let fields = [
                row.order_id.to_string(),
                row.identifier.clone(),
                row.client_id.to_string(),
                row.client_name.clone(),
                row.total.to_string(),
                row.total_quantity.to_string(),
                row.status.clone(),
                row.created_at.to_rfc3339(),
                line.product_id.to_string(),
                line.name.clone(),
                line.quantity.to_string(),
                line.price.to_string(),
                subtotal.to_string(),
            ];
            let escaped: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
            out.push_str(&escaped.join(","));
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str("Summary\n");
    push_summary_line(&mut out, "startDate", &filters.start_date.to_string());
    push_summary_line(&mut out, "endDate", &filters.end_date.to_string());
    push_summary_line(
        &mut out,
        "clientId",
        &filters.client_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    push_summary_line(
        &mut out,
        "productId",
        &filters.product_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    push_summary_line(&mut out, "sortBy", filters.sort_by.as_str());
    push_summary_line(&mut out, "totalOrders", &summary.total_orders.to_string());
    push_summary_line(&mut out, "totalRevenue", &summary.total_revenue.to_string());
    push_summary_line(
        &mut out,
        "totalQuantitySold",
        &summary.total_quantity_sold.to_string(),
    );
    push_summary_line(
        &mut out,
        "averageOrderValue",
        &summary.average_order_value.to_string(),
    );
    push_summary_line(&mut out, "generatedAt", &generated_at.to_rfc3339());
    out
}

fn push_summary_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push(',');
    out.push_str(&escape_csv(value));
    out.push('\n');
}

/// Quotes a field when it contains a comma, quote, or newline, doubling any
/// embedded quote character.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
