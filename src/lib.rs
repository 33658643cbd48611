pub mod application;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderService;
use infrastructure::order_store::DieselOrderStore;
use infrastructure::product_lookup::DieselProductLookup;

pub use db::{create_pool, DbPool};

/// Concrete service wiring used by the handlers.
pub type AppService = OrderService<DieselOrderStore, DieselProductLookup>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::orders::search_orders,
        handlers::orders::order_reports,
    ),
    components(schemas(
        handlers::orders::CreateOrderRequest,
        handlers::orders::OrderLineRequest,
        handlers::orders::UpdateOrderRequest,
        handlers::orders::OrderResponse,
        handlers::orders::OrderLineResponse,
        handlers::orders::PagedOrdersResponse,
        domain::order::OrderLine,
        domain::status::OrderStatus,
        domain::reports::SortKey,
        domain::reports::ReportFormat,
        domain::reports::JsonReport,
        domain::reports::ReportRow,
        domain::reports::ReportSummary,
        domain::reports::AppliedFilters,
    )),
    tags((name = "orders", description = "Order lifecycle and sales reporting"))
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let store = Arc::new(DieselOrderStore::new(pool.clone()));
    let products = Arc::new(DieselProductLookup::new(pool));
    let service = web::Data::new(OrderService::new(store, products));

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .service(
                // Literal segments must come before the `{id}` matcher.
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/search", web::get().to(handlers::orders::search_orders))
                    .route("/reports", web::get().to(handlers::orders::order_reports))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::patch().to(handlers::orders::update_order))
                    .route("/{id}", web::delete().to(handlers::orders::delete_order)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
