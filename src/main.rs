use std::net::SocketAddr;

use dotenvy::dotenv;
use tracing::info;

use modkit::Composer;
use modkit::bootstrap::config;
use modkit::infrastructure::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "modkit=debug,tower_http=info".into()),
        )
        .init();

    let root = std::env::current_dir()?;
    let app = Composer::new(root)
        .with_config(config::overrides_from_env())
        .compose()?;

    if let Some(pool) = app.ctx.db() {
        db::migrate(pool).await?;
    }

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "HTTP listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.router).await?;
    Ok(())
}
