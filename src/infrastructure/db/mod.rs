use sqlx::{Pool, Postgres};

use crate::bootstrap::config::DbConfig;

pub type PgPool = Pool<Postgres>;

/// Builds the shared pool without connecting; composition runs synchronously
/// and nothing touches the network until the first acquire.
pub fn connect_lazy(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_lazy(&cfg.url)?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    // Uses compile-time embedded migrations under ./migrations
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
