//! Example consumer: serves the sample blog model through resource-sdk.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! With `DATABASE_URL` set the tables live in Postgres, otherwise in memory.

use resource_sdk::{api_router, load_from_dir, resolve, AppState, Service, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info")),
        )
        .init();

    let config_dir = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "example_consumer/sample".into());
    let config = load_from_dir(&config_dir).await?;
    let model = resolve(&config)?;
    let settings = Settings::from_env()?;

    let service = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            tracing::info!("using postgres tables");
            Service::with_postgres(pool, model, settings)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory tables");
            Service::in_memory(model, settings)
        }
    };

    let app = api_router(AppState::new(service));
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
