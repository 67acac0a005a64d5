pub mod application;
pub mod client;
pub mod db;
pub mod domain;
pub mod errors;
pub mod feed;
pub mod handlers;
pub mod infrastructure;
pub mod schema;
pub mod webhook;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderLifecycleService;
use infrastructure::order_repo::DieselOrderRepository;

pub use db::{create_pool, DbPool};
pub use feed::ChangeFeed;
pub use webhook::WebhookDispatcher;

/// The service as wired in production: lifecycle logic over the Postgres
/// repository.
pub type LifecycleService = OrderLifecycleService<DieselOrderRepository>;

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
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::transition_order,
        handlers::orders::replace_order_items,
        handlers::orders::list_order_events,
        handlers::kitchen::list_tickets,
        handlers::kitchen::mark_ticket_ready,
        handlers::realtime::stream_orders,
    ),
    components(schemas(
        handlers::orders::CreateOrderRequest,
        handlers::orders::OrderItemRequest,
        handlers::orders::TransitionRequest,
        handlers::orders::ReplaceOrderRequest,
        handlers::orders::OrderResponse,
        handlers::orders::OrderItemResponse,
        handlers::orders::SnapshotResponse,
        handlers::orders::OrderEventResponse,
        handlers::orders::ListOrdersParams,
        handlers::kitchen::KitchenQuery,
        domain::order::OrderStatus,
        domain::order::PaymentStatus,
        domain::order::OrderType,
    )),
    tags(
        (name = "orders", description = "Order lifecycle and snapshots"),
        (name = "kitchen", description = "Unauthenticated kitchen display surface"),
        (name = "realtime", description = "Server-sent change feed"),
    )
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The change feed and the webhook dispatcher are constructed by the caller
/// and handed in: their lifetime is the caller's, not a module-global's,
/// and tests can pass their own instances. The caller is responsible for
/// `.await`-ing (or `tokio::spawn`-ing) the returned server.
pub fn build_server(
    pool: DbPool,
    feed: ChangeFeed,
    webhook: WebhookDispatcher,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(OrderLifecycleService::new(
        DieselOrderRepository::new(pool),
        feed.clone(),
    ));
    let feed = web::Data::new(feed);
    let webhook = web::Data::new(webhook);

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(feed.clone())
            .app_data(webhook.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::patch().to(handlers::orders::transition_order))
                    .route(
                        "/{id}/items",
                        web::put().to(handlers::orders::replace_order_items),
                    )
                    .route(
                        "/{id}/events",
                        web::get().to(handlers::orders::list_order_events),
                    ),
            )
            .service(
                web::scope("/kitchen")
                    .route("/orders", web::get().to(handlers::kitchen::list_tickets))
                    .route(
                        "/orders/{id}/ready",
                        web::post().to(handlers::kitchen::mark_ticket_ready),
                    ),
            )
            .service(
                web::scope("/realtime")
                    .route("/orders", web::get().to(handlers::realtime::stream_orders)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
