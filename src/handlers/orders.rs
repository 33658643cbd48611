use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::order::{LineRequest, NewOrder, Order, OrderPatch, Page, SearchFilter};
use crate::domain::ports::CancelToken;
use crate::domain::reports::{ReportFormat, ReportOutput, ReportRequest, SortKey};
use crate::domain::status::OrderStatus;
use crate::errors::AppError;
use crate::AppService;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    pub client_name: String,
    pub products: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub client_name: Option<String>,
    pub products: Option<Vec<OrderLineRequest>>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub identifier: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub total: String,
    pub total_quantity: i32,
    pub status: OrderStatus,
    pub products: Vec<OrderLineResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            identifier: order.identifier,
            client_id: order.client_id,
            client_name: order.client_name,
            total: order.total.to_string(),
            total_quantity: order.total_quantity,
            status: order.status,
            products: order
                .products
                .into_iter()
                .map(|l| OrderLineResponse {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    price: l.price.to_string(),
                    name: l.name,
                })
                .collect(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagedOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl From<Page<Order>> for PagedOrdersResponse {
    fn from(page: Page<Order>) -> Self {
        Self {
            items: page.items.into_iter().map(OrderResponse::from).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 10, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchOrdersParams {
    pub client_name: Option<String>,
    pub identifier: Option<String>,
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on the order total, e.g. "100.00"
    pub min_total: Option<String>,
    /// Inclusive upper bound on the order total.
    pub max_total: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    /// Start of the inclusive date range, e.g. "2025-01-01"
    pub start_date: NaiveDate,
    /// End of the inclusive date range.
    pub end_date: NaiveDate,
    pub client_id: Option<Uuid>,
    /// Restrict to orders containing this product.
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

fn parse_total(label: &str, value: Option<&String>) -> Result<Option<BigDecimal>, AppError> {
    value
        .map(|v| {
            BigDecimal::from_str(v)
                .map_err(|e| AppError::BadRequest(format!("Invalid {} '{}': {}", label, v, e)))
        })
        .transpose()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Creates an order from product references. Prices and names are resolved
/// against the catalog and frozen onto the order lines; totals are computed
/// from the snapshots and the order starts out `pending`.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Empty product list or invalid quantities"),
        (status = 404, description = "One or more referenced products do not exist"),
        (status = 409, description = "Order identifier conflict"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<AppService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = NewOrder {
        client_id: body.client_id,
        client_name: body.client_name,
        products: body
            .products
            .into_iter()
            .map(|l| LineRequest {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect(),
    };

    let order = web::block(move || service.create(&request, &CancelToken::new()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let order = web::block(move || service.find_one(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// Paginated listing of all orders, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 10, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = PagedOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<AppService>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = web::block(move || service.find_all(params.page, params.limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(PagedOrdersResponse::from(page)))
}

/// PATCH /orders/{id}
///
/// Partial update. A status change must follow the transition table; a new
/// product list is re-resolved against the catalog and totals are recomputed.
/// Completed and cancelled orders reject any change.
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid products or status transition"),
        (status = 403, description = "Order is completed or cancelled"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    service: web::Data<AppService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let body = body.into_inner();
    let patch = OrderPatch {
        client_name: body.client_name,
        products: body.products.map(|lines| {
            lines
                .into_iter()
                .map(|l| LineRequest {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect()
        }),
        status: body.status,
    };

    let order = web::block(move || service.update(id, &patch, &CancelToken::new()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// DELETE /orders/{id}
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    service: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let message = web::block(move || service.remove(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

/// GET /orders/search
///
/// Combines equality filters (status, exact identifier), a case-insensitive
/// substring filter on the client name, and an inclusive total range.
#[utoipa::path(
    get,
    path = "/orders/search",
    params(
        ("clientName" = Option<String>, Query, description = "Substring match, case-insensitive"),
        ("identifier" = Option<String>, Query, description = "Exact order identifier"),
        ("status" = Option<OrderStatus>, Query, description = "Order status"),
        ("minTotal" = Option<String>, Query, description = "Inclusive lower total bound"),
        ("maxTotal" = Option<String>, Query, description = "Inclusive upper total bound"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 10, max 100)"),
    ),
    responses(
        (status = 200, description = "Matching orders", body = PagedOrdersResponse),
        (status = 400, description = "Malformed total bound"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn search_orders(
    service: web::Data<AppService>,
    query: web::Query<SearchOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let filter = SearchFilter {
        status: params.status,
        identifier: params.identifier,
        client_name: params.client_name,
        min_total: parse_total("minTotal", params.min_total.as_ref())?,
        max_total: parse_total("maxTotal", params.max_total.as_ref())?,
    };

    let page = web::block(move || service.search(&filter, params.page, params.limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(PagedOrdersResponse::from(page)))
}

/// GET /orders/reports
///
/// Sales report over an inclusive date range, as structured JSON or as a CSV
/// attachment (one row per order line, with a trailing summary block). CSV
/// output ignores pagination and always covers the full result set.
#[utoipa::path(
    get,
    path = "/orders/reports",
    params(
        ("startDate" = NaiveDate, Query, description = "Range start, YYYY-MM-DD"),
        ("endDate" = NaiveDate, Query, description = "Range end, YYYY-MM-DD"),
        ("clientId" = Option<Uuid>, Query, description = "Filter by ordering client"),
        ("productId" = Option<Uuid>, Query, description = "Filter by contained product"),
        ("sortBy" = Option<SortKey>, Query, description = "Sort key, default total_desc"),
        ("format" = Option<ReportFormat>, Query, description = "json (default) or csv"),
        ("page" = Option<i64>, Query, description = "Page, JSON only"),
        ("limit" = Option<i64>, Query, description = "Page size, JSON only"),
    ),
    responses(
        (status = 200, description = "Report in the requested format"),
        (status = 400, description = "Report query failed"),
        (status = 422, description = "startDate is after endDate"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn order_reports(
    service: web::Data<AppService>,
    query: web::Query<ReportParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let request = ReportRequest {
        start_date: params.start_date,
        end_date: params.end_date,
        client_id: params.client_id,
        product_id: params.product_id,
        sort_by: params.sort_by,
        format: params.format,
        page: params.page,
        limit: params.limit,
    };

    let output = web::block(move || service.generate_report(&request, &CancelToken::new()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match output {
        ReportOutput::Json(report) => Ok(HttpResponse::Ok().json(report)),
        ReportOutput::Csv(csv) => Ok(HttpResponse::Ok()
            .content_type(csv.content_type)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", csv.filename),
            ))
            .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
            .body(csv.content)),
    }
}
