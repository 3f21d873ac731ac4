use chrono::Utc;
use sqlx::Row;

use scentpick_core::domain::recommendation::RecRunId;

use super::{format_timestamp, NewRecCandidate, NewRecRun, RecRunRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRecRunRepository {
    pool: DbPool,
}

impl SqlRecRunRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecRunRepository for SqlRecRunRepository {
    async fn log_run(
        &self,
        run: NewRecRun,
        candidates: Vec<NewRecCandidate>,
    ) -> Result<RecRunId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let run_id = sqlx::query(
            "INSERT INTO rec_runs (user_id, conversation_id, request_message_id, query_text, \
             parsed_slots, agent, model_version, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(run.user_id)
        .bind(run.conversation_id.map(|id| id.0))
        .bind(run.request_message_id)
        .bind(&run.query_text)
        .bind(run.parsed_slots.as_ref().map(|value| value.to_string()))
        .bind(&run.agent)
        .bind(&run.model_version)
        .bind(format_timestamp(Utc::now()))
        .fetch_one(&mut *tx)
        .await?
        .try_get::<i64, _>("id")?;

        for candidate in &candidates {
            sqlx::query(
                "INSERT INTO rec_candidates (run_id, perfume_id, rank, score, reason_summary, \
                 reason_detail, retrieved_from)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(run_id)
            .bind(candidate.perfume_id.0)
            .bind(candidate.rank as i64)
            .bind(candidate.score)
            .bind(&candidate.reason_summary)
            .bind(candidate.reason_detail.as_ref().map(|value| value.to_string()))
            .bind(&candidate.retrieved_from)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(RecRunId(run_id))
    }
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use scentpick_core::domain::perfume::PerfumeId;

    use super::SqlRecRunRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{NewRecCandidate, NewRecRun, RecRunRepository};
    use crate::{connect_with_settings, DbPool};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        for (brand, name) in [("Aqua Co", "Tide"), ("Bloom", "Petal")] {
            sqlx::query("INSERT INTO perfumes (brand, name) VALUES (?, ?)")
                .bind(brand)
                .bind(name)
                .execute(&pool)
                .await
                .expect("insert perfume");
        }
        pool
    }

    fn run_for(user_id: i64) -> NewRecRun {
        NewRecRun {
            user_id,
            conversation_id: None,
            request_message_id: None,
            query_text: "fresh summer scent".to_string(),
            parsed_slots: None,
            agent: Some("sampler".to_string()),
            model_version: None,
        }
    }

    fn candidate(perfume_id: i64, rank: u32) -> NewRecCandidate {
        NewRecCandidate {
            perfume_id: PerfumeId(perfume_id),
            rank,
            score: 0.5,
            reason_summary: None,
            reason_detail: None,
            retrieved_from: Some("accord_pool".to_string()),
        }
    }

    #[tokio::test]
    async fn log_run_persists_run_and_candidates() {
        let repo = SqlRecRunRepository::new(seeded_pool().await);

        let run_id = repo
            .log_run(run_for(1), vec![candidate(1, 1), candidate(2, 2)])
            .await
            .expect("log run");

        let count = sqlx::query("SELECT COUNT(*) AS count FROM rec_candidates WHERE run_id = ?")
            .bind(run_id.0)
            .fetch_one(&repo.pool)
            .await
            .expect("count")
            .get::<i64, _>("count");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn duplicate_rank_rolls_back_the_run() {
        let repo = SqlRecRunRepository::new(seeded_pool().await);

        let result = repo.log_run(run_for(1), vec![candidate(1, 1), candidate(2, 1)]).await;
        assert!(result.is_err(), "duplicate rank must be rejected");

        let count = sqlx::query("SELECT COUNT(*) AS count FROM rec_runs")
            .fetch_one(&repo.pool)
            .await
            .expect("count")
            .get::<i64, _>("count");
        assert_eq!(count, 0, "failed run must not leave a partial row");
    }
}
