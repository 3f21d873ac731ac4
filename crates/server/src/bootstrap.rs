use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::info;

use scentpick_agent::client::{BackendError, HttpChatBackend};
use scentpick_agent::sampling::SamplingEngine;
use scentpick_agent::session::SessionBridge;
use scentpick_agent::weather::{WeatherError, WeatherFetcher};
use scentpick_core::assets::AssetResolver;
use scentpick_core::config::{AppConfig, ConfigError, LoadOptions};
use scentpick_db::repositories::{
    FavoriteRepository, FeedbackRepository, NoteImageRepository, PerfumeRepository,
    RecRunRepository, SqlConversationRepository, SqlFavoriteRepository, SqlFeedbackRepository,
    SqlNoteImageRepository, SqlPerfumeRepository, SqlRecRunRepository,
};
use scentpick_db::{connect, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
}

/// Shared handler state. Repositories are trait objects so tests can swap
/// in the in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionBridge>,
    pub sampling: Arc<SamplingEngine>,
    pub weather: Arc<WeatherFetcher>,
    pub perfumes: Arc<dyn PerfumeRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub rec_runs: Arc<dyn RecRunRepository>,
    pub note_images: Arc<dyn NoteImageRepository>,
    pub assets: AssetResolver,
    pub default_city: String,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("chat backend client failed to initialize: {0}")]
    Backend(#[source] BackendError),
    #[error("weather client failed to initialize: {0}")]
    Weather(#[source] WeatherError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let backend =
        Arc::new(HttpChatBackend::new(&config.chat_backend).map_err(BootstrapError::Backend)?);
    let conversations = Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let perfumes: Arc<dyn PerfumeRepository> =
        Arc::new(SqlPerfumeRepository::new(db_pool.clone()));
    let assets = AssetResolver::new(config.assets.base_url.clone());

    let state = AppState {
        session: Arc::new(SessionBridge::new(backend, conversations)),
        sampling: Arc::new(SamplingEngine::new(perfumes.clone(), assets.clone())),
        weather: Arc::new(
            WeatherFetcher::new(config.weather.clone()).map_err(BootstrapError::Weather)?,
        ),
        perfumes,
        favorites: Arc::new(SqlFavoriteRepository::new(db_pool.clone())),
        feedback: Arc::new(SqlFeedbackRepository::new(db_pool.clone())),
        rec_runs: Arc::new(SqlRecRunRepository::new(db_pool.clone())),
        note_images: Arc::new(SqlNoteImageRepository::new(db_pool.clone())),
        assets,
        default_city: config.weather.default_city.clone(),
    };

    let router = api_router(state);

    Ok(Application { config, db_pool, router })
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::chat::router(state.clone()))
        .merge(crate::recommend::router(state.clone()))
        .merge(crate::catalog::router(state))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;

    use scentpick_agent::client::{BackendError, ChatBackend, ChatRequest, ChatResponse};
    use scentpick_agent::sampling::SamplingEngine;
    use scentpick_agent::session::SessionBridge;
    use scentpick_agent::weather::WeatherFetcher;
    use scentpick_core::assets::AssetResolver;
    use scentpick_core::config::WeatherConfig;
    use scentpick_db::repositories::{
        PerfumeRepository, SqlConversationRepository, SqlFavoriteRepository,
        SqlFeedbackRepository, SqlNoteImageRepository, SqlPerfumeRepository, SqlRecRunRepository,
    };
    use scentpick_db::{connect_with_settings, migrations};

    use super::AppState;

    struct ScriptedBackend {
        reply: Option<String>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn run(&self, _request: &ChatRequest) -> Result<ChatResponse, BackendError> {
            match &self.reply {
                Some(reply) => Ok(ChatResponse {
                    final_answer: reply.clone(),
                    ..ChatResponse::default()
                }),
                None => {
                    Err(BackendError::Api { status: 500, message: "backend down".to_string() })
                }
            }
        }
    }

    pub(crate) fn replying_backend(reply: &str) -> Arc<dyn ChatBackend> {
        Arc::new(ScriptedBackend { reply: Some(reply.to_string()) })
    }

    pub(crate) fn failing_backend() -> Arc<dyn ChatBackend> {
        Arc::new(ScriptedBackend { reply: None })
    }

    /// Handler state over a fresh in-memory database. The weather endpoints
    /// point at an unroutable local port so lookups fail fast and exercise
    /// the degraded path deterministically.
    pub(crate) async fn test_state(
        backend: Arc<dyn ChatBackend>,
    ) -> (AppState, scentpick_db::DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let conversations = Arc::new(SqlConversationRepository::new(pool.clone()));
        let perfumes: Arc<dyn PerfumeRepository> =
            Arc::new(SqlPerfumeRepository::new(pool.clone()));
        let assets = AssetResolver::new("https://img.test");
        let weather_config = WeatherConfig {
            forecast_url: "http://127.0.0.1:9/forecast".to_string(),
            geocoding_url: "http://127.0.0.1:9/search".to_string(),
            default_city: "Seoul".to_string(),
            timeout_secs: 1,
        };

        let state = AppState {
            session: Arc::new(SessionBridge::new(backend, conversations)),
            sampling: Arc::new(SamplingEngine::new(perfumes.clone(), assets.clone())),
            weather: Arc::new(WeatherFetcher::new(weather_config).expect("weather client")),
            perfumes,
            favorites: Arc::new(SqlFavoriteRepository::new(pool.clone())),
            feedback: Arc::new(SqlFeedbackRepository::new(pool.clone())),
            rec_runs: Arc::new(SqlRecRunRepository::new(pool.clone())),
            note_images: Arc::new(SqlNoteImageRepository::new(pool.clone())),
            assets,
            default_city: "Seoul".to_string(),
        };
        (state, pool)
    }

    pub(crate) async fn seed_perfume(
        pool: &scentpick_db::DbPool,
        brand: &str,
        name: &str,
        gender: &str,
        main_accords: &str,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO perfumes (brand, name, gender, sizes, main_accords, day_night_score)
             VALUES (?, ?, ?, '[50]', ?, '{\"day\": 0.5, \"night\": 0.5}')
             RETURNING id",
        )
        .bind(brand)
        .bind(name)
        .bind(gender)
        .bind(main_accords)
        .fetch_one(pool)
        .await
        .expect("seed perfume")
    }
}

#[cfg(test)]
mod tests {
    use scentpick_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                service_token: Some("svc-test-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_service_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("service_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('perfumes', 'conversations', 'messages')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables after bootstrap");
        assert_eq!(table_count, 3);

        app.db_pool.close().await;
    }
}
