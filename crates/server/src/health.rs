//! Liveness endpoint, served on its own port so load balancer probes never
//! compete with API traffic.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use scentpick_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub detail: String,
}

impl ComponentHealth {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: ComponentHealth,
    pub schema: ComponentHealth,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                error = %err,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let schema = schema_check(&state.db_pool).await;
    let ready = database.is_ready() && schema.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> ComponentHealth {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => ComponentHealth::ready("database reachable"),
        Err(err) => ComponentHealth::degraded(format!("database query failed: {err}")),
    }
}

async fn schema_check(pool: &DbPool) -> ComponentHealth {
    let applied = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await;
    match applied {
        Ok(count) if count > 0 => {
            ComponentHealth::ready(format!("{count} migrations applied"))
        }
        Ok(_) => ComponentHealth::degraded("no migrations applied"),
        Err(err) => ComponentHealth::degraded(format!("migration table missing: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use scentpick_db::{connect_with_settings, migrations};

    use super::{health, HealthState};

    #[tokio::test]
    async fn health_is_ready_with_migrated_database() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.schema.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_degrades_without_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.schema.status, "degraded");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_degrades_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
    }
}
