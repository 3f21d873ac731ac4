use sqlx::Row;

use super::{NoteImageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNoteImageRepository {
    pool: DbPool,
}

impl SqlNoteImageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn url_where(
        &self,
        clause: &str,
        bind: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let sql = format!(
            "SELECT image_url FROM note_images
             WHERE image_url IS NOT NULL AND {clause} LIMIT 1",
        );
        let row = sqlx::query(&sql).bind(bind).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.try_get::<String, _>("image_url")).transpose()?)
    }
}

#[async_trait::async_trait]
impl NoteImageRepository for SqlNoteImageRepository {
    async fn find_image_url(&self, note_name: &str) -> Result<Option<String>, RepositoryError> {
        let name = note_name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(url) = self.url_where("note_name = ? COLLATE NOCASE", name).await? {
            return Ok(Some(url));
        }

        if let Some(url) = self.url_where("note_name LIKE ?", &format!("%{name}%")).await? {
            return Ok(Some(url));
        }

        // Multi-word names retry word by word; short words match too much.
        for word in name.split_whitespace().filter(|word| word.chars().count() > 2) {
            if let Some(url) = self.url_where("note_name LIKE ?", &format!("%{word}%")).await? {
                return Ok(Some(url));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::SqlNoteImageRepository;
    use crate::migrations::run_pending;
    use crate::repositories::NoteImageRepository;
    use crate::{connect_with_settings, DbPool};

    async fn seeded_repo() -> SqlNoteImageRepository {
        let pool: DbPool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        for (name, url) in [
            ("Bergamot", "https://img.test/bergamot.png"),
            ("Pink Pepper", "https://img.test/pink-pepper.png"),
            ("Rose", "https://img.test/rose.png"),
        ] {
            sqlx::query("INSERT INTO note_images (note_name, image_url) VALUES (?, ?)")
                .bind(name)
                .bind(url)
                .execute(&pool)
                .await
                .expect("insert note image");
        }
        SqlNoteImageRepository::new(pool)
    }

    #[tokio::test]
    async fn exact_match_is_case_insensitive() {
        let repo = seeded_repo().await;
        let url = repo.find_image_url("bergamot").await.expect("lookup");
        assert_eq!(url.as_deref(), Some("https://img.test/bergamot.png"));
    }

    #[tokio::test]
    async fn per_word_match_handles_compound_names() {
        let repo = seeded_repo().await;
        let url = repo.find_image_url("Sichuan Pepper Absolute").await.expect("lookup");
        assert_eq!(url.as_deref(), Some("https://img.test/pink-pepper.png"));
    }

    #[tokio::test]
    async fn unmatched_names_resolve_to_none() {
        let repo = seeded_repo().await;
        assert_eq!(repo.find_image_url("Quartz").await.expect("lookup"), None);

        // A query merely containing a stored name is not a match; the
        // ladder ends after the per-word pass.
        assert_eq!(repo.find_image_url("xxRosexx").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn blank_name_short_circuits() {
        let repo = seeded_repo().await;
        assert_eq!(repo.find_image_url("   ").await.expect("lookup"), None);
    }
}
