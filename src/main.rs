use comanda_service::{build_server, create_pool, run_migrations, ChangeFeed, WebhookDispatcher};
use dotenvy::dotenv;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a valid number");
    let webhook_url = env::var("WEBHOOK_READY_URL").ok();
    if webhook_url.is_none() {
        log::info!("WEBHOOK_READY_URL not set, ready notifications disabled");
    }

    let pool = create_pool(&database_url);
    run_migrations(&pool);

    let feed = ChangeFeed::new();
    let webhook = WebhookDispatcher::new(webhook_url);

    log::info!("Starting server at http://{}:{}", host, port);

    build_server(pool, feed, webhook, &host, port)?.await
}
