use chrono::Utc;
use sqlx::Row;

use scentpick_core::domain::perfume::{Perfume, PerfumeId};
use scentpick_core::domain::recommendation::FeedbackAction;

use super::perfume::map_perfume;
use super::{
    format_timestamp, FavoriteRepository, FeedbackRepository, RepositoryError,
};
use crate::DbPool;

const PERFUME_COLUMNS: &str = "p.id, p.brand, p.name, p.description, p.concentration, p.gender, \
     p.sizes, p.detail_url, p.main_accords, p.top_notes, p.middle_notes, p.base_notes, \
     p.notes_score, p.season_score, p.day_night_score, p.created_at, p.updated_at";

pub struct SqlFavoriteRepository {
    pool: DbPool,
}

impl SqlFavoriteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FavoriteRepository for SqlFavoriteRepository {
    async fn toggle(&self, user_id: i64, perfume_id: PerfumeId) -> Result<bool, RepositoryError> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND perfume_id = ?")
            .bind(user_id)
            .bind(perfume_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO favorites (user_id, perfume_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(perfume_id.0)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Perfume>, RepositoryError> {
        let sql = format!(
            "SELECT {PERFUME_COLUMNS} FROM favorites f
             JOIN perfumes p ON p.id = f.perfume_id
             WHERE f.user_id = ?
             ORDER BY f.created_at DESC, f.id DESC",
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(map_perfume).collect()
    }
}

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The current like/dislike row for this (user, perfume), if one exists.
    /// At most one such row is maintained by `toggle_vote`.
    async fn active_vote(
        &self,
        user_id: i64,
        perfume_id: PerfumeId,
    ) -> Result<Option<(i64, FeedbackAction)>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, action FROM feedback_events
             WHERE user_id = ? AND perfume_id = ? AND action IN ('like', 'dislike')
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(perfume_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let raw = row.try_get::<String, _>("action")?;
            let action = FeedbackAction::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown action {raw:?}")))?;
            Ok((row.try_get::<i64, _>("id")?, action))
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn toggle_vote(
        &self,
        user_id: i64,
        perfume_id: PerfumeId,
        action: FeedbackAction,
        source: &str,
        context: Option<serde_json::Value>,
    ) -> Result<Option<FeedbackAction>, RepositoryError> {
        if !action.is_active_vote() {
            self.record_event(user_id, perfume_id, action, source, context).await?;
            return Ok(None);
        }

        match self.active_vote(user_id, perfume_id).await? {
            Some((id, current)) if current == action => {
                // Repeating the active vote clears it.
                sqlx::query("DELETE FROM feedback_events WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
            Some((id, _)) => {
                // Opposing vote replaces the row in place.
                sqlx::query(
                    "UPDATE feedback_events SET action = ?, context = ?, created_at = ?
                     WHERE id = ?",
                )
                .bind(action.as_str())
                .bind(context.as_ref().map(|value| value.to_string()))
                .bind(format_timestamp(Utc::now()))
                .bind(id)
                .execute(&self.pool)
                .await?;
                Ok(Some(action))
            }
            None => {
                self.record_event(user_id, perfume_id, action, source, context).await?;
                Ok(Some(action))
            }
        }
    }

    async fn record_event(
        &self,
        user_id: i64,
        perfume_id: PerfumeId,
        action: FeedbackAction,
        source: &str,
        context: Option<serde_json::Value>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback_events (user_id, perfume_id, source, action, context, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(perfume_id.0)
        .bind(source)
        .bind(action.as_str())
        .bind(context.as_ref().map(|value| value.to_string()))
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn perfumes_with_action(
        &self,
        user_id: i64,
        action: FeedbackAction,
    ) -> Result<Vec<Perfume>, RepositoryError> {
        let sql = format!(
            "SELECT {PERFUME_COLUMNS} FROM feedback_events e
             JOIN perfumes p ON p.id = e.perfume_id
             WHERE e.user_id = ? AND e.action = ?
             ORDER BY e.created_at DESC, e.id DESC",
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(action.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_perfume).collect()
    }
}
