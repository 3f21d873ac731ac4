use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use scentpick_core::domain::conversation::{
    Conversation, ConversationId, Message, MessageId, MessageRole,
};

use super::{
    format_timestamp, parse_timestamp, ConversationRepository, NewMessage, RepositoryError,
};
use crate::DbPool;

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, model, idempotency_key, \
     metadata, backend_state, created_at";

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_for_user(
        &self,
        id: ConversationId,
        user_id: i64,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, title, external_thread_id, started_at, updated_at
             FROM conversations WHERE id = ? AND user_id = ?",
        )
        .bind(id.0)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_conversation).transpose()
    }

    async fn create(
        &self,
        user_id: i64,
        title: Option<String>,
        external_thread_id: Option<Uuid>,
    ) -> Result<Conversation, RepositoryError> {
        let now = format_timestamp(Utc::now());
        let row = sqlx::query(
            "INSERT INTO conversations (user_id, title, external_thread_id, started_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, user_id, title, external_thread_id, started_at, updated_at",
        )
        .bind(user_id)
        .bind(title)
        .bind(external_thread_id.map(|id| id.to_string()))
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        map_conversation(&row)
    }

    async fn touch(&self, id: ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, external_thread_id, started_at, updated_at
             FROM conversations WHERE user_id = ?
             ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_conversation).collect()
    }

    async fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?
             ORDER BY created_at, id",
        );
        let rows = sqlx::query(&sql).bind(conversation_id.0).fetch_all(&self.pool).await?;
        rows.iter().map(map_message).collect()
    }

    async fn first_user_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ? AND role = 'user'
             ORDER BY created_at, id LIMIT 1",
        );
        let row = sqlx::query(&sql).bind(conversation_id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_message).transpose()
    }

    async fn find_user_message_by_key(
        &self,
        conversation_id: ConversationId,
        idempotency_key: Uuid,
    ) -> Result<Option<Message>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ? AND role = 'user' AND idempotency_key = ?
             LIMIT 1",
        );
        let row = sqlx::query(&sql)
            .bind(conversation_id.0)
            .bind(idempotency_key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_message).transpose()
    }

    async fn assistant_reply_for(
        &self,
        conversation_id: ConversationId,
        user_message: &Message,
    ) -> Result<Option<Message>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ? AND role = 'assistant'
               AND (created_at > ? OR (created_at = ? AND id > ?))
             ORDER BY created_at, id LIMIT 1",
        );
        let created = format_timestamp(user_message.created_at);
        let row = sqlx::query(&sql)
            .bind(conversation_id.0)
            .bind(&created)
            .bind(&created)
            .bind(user_message.id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_message).transpose()
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let sql = format!(
            "INSERT INTO messages (conversation_id, role, content, model, idempotency_key, \
             metadata, backend_state, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {MESSAGE_COLUMNS}",
        );
        let row = sqlx::query(&sql)
            .bind(message.conversation_id.0)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&message.model)
            .bind(message.idempotency_key.map(|key| key.to_string()))
            .bind(message.metadata.as_ref().map(|value| value.to_string()))
            .bind(message.backend_state.as_ref().map(|value| value.to_string()))
            .bind(format_timestamp(Utc::now()))
            .fetch_one(&self.pool)
            .await?;
        map_message(&row)
    }
}

fn map_conversation(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let external_thread_id = row
        .try_get::<Option<String>, _>("external_thread_id")?
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|err| RepositoryError::Decode(format!("bad thread id {raw:?}: {err}")))
        })
        .transpose()?;

    Ok(Conversation {
        id: ConversationId(row.try_get::<i64, _>("id")?),
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        external_thread_id,
        started_at: parse_timestamp(&row.try_get::<String, _>("started_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn map_message(row: &SqliteRow) -> Result<Message, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = MessageRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown message role {role_raw:?}")))?;

    let idempotency_key = row
        .try_get::<Option<String>, _>("idempotency_key")?
        .map(|raw| {
            Uuid::parse_str(&raw).map_err(|err| {
                RepositoryError::Decode(format!("bad idempotency key {raw:?}: {err}"))
            })
        })
        .transpose()?;

    Ok(Message {
        id: MessageId(row.try_get::<i64, _>("id")?),
        conversation_id: ConversationId(row.try_get::<i64, _>("conversation_id")?),
        role,
        content: row.try_get("content")?,
        model: row.try_get("model")?,
        idempotency_key,
        metadata: parse_json_column(row, "metadata")?,
        backend_state: parse_json_column(row, "backend_state")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn parse_json_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<serde_json::Value>, RepositoryError> {
    row.try_get::<Option<String>, _>(column)?
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|err| RepositoryError::Decode(format!("bad {column} json: {err}")))
        })
        .transpose()
}
