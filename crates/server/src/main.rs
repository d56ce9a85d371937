use server::config::Config;
use server::db;
use server::engine::EngineAdvisor;
use server::hub::GameHub;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let store = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::pool::create_pool(url).await?;
            tracing::info!("Running migrations...");
            db::pool::run_migrations(&pool).await?;
            Some(pool)
        }
        None => {
            tracing::info!("DATABASE_URL not set - games are kept in memory only");
            None
        }
    };
    let hub = GameHub::new(store, config.channel_capacity);

    let advisor = config
        .stockfish_path
        .as_ref()
        .map(|path| EngineAdvisor::new(path.clone(), config.engine_nodes));
    if advisor.is_some() {
        tracing::info!("Engine suggestions enabled");
    } else {
        tracing::info!("STOCKFISH_PATH not set - engine suggestions disabled");
    }

    let app = server::router(hub, advisor.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(advisor) = advisor {
        advisor.shutdown().await;
    }
    Ok(())
}
