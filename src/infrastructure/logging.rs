use crate::infrastructure::db::PgPool;

/// Application-level logger. Events always go through `tracing`; when
/// persistence is configured they are additionally written to the `logs`
/// table, best effort.
#[derive(Clone)]
pub struct AppLogger {
    pool: Option<PgPool>,
}

impl AppLogger {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    pub fn info(&self, message: &str) {
        tracing::info!(target: "modkit::app", "{message}");
        self.persist("info", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "modkit::app", "{message}");
        self.persist("warn", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(target: "modkit::app", "{message}");
        self.persist("error", message);
    }

    fn persist(&self, level: &'static str, message: &str) {
        let Some(pool) = self.pool.clone() else {
            return;
        };
        // Outside a runtime (composition itself is synchronous) the sink is
        // silently skipped; tracing already captured the event.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let message = message.to_string();
        handle.spawn(async move {
            let inserted =
                sqlx::query("INSERT INTO logs (level, message, logged_at) VALUES ($1, $2, NOW())")
                    .bind(level)
                    .bind(&message)
                    .execute(&pool)
                    .await;
            if let Err(error) = inserted {
                tracing::debug!(?error, "log_sink_insert_failed");
            }
        });
    }
}
