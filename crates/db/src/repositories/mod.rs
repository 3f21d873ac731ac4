use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use scentpick_core::domain::conversation::{Conversation, ConversationId, Message, MessageRole};
use scentpick_core::domain::perfume::{GenderFilter, Perfume, PerfumeId};
use scentpick_core::domain::recommendation::{FeedbackAction, RecRunId};

pub mod conversation;
pub mod feedback;
pub mod memory;
pub mod note_image;
pub mod perfume;
pub mod rec_run;

pub use conversation::SqlConversationRepository;
pub use feedback::{SqlFavoriteRepository, SqlFeedbackRepository};
pub use memory::{InMemoryConversationRepository, InMemoryPerfumeRepository};
pub use note_image::SqlNoteImageRepository;
pub use perfume::SqlPerfumeRepository;
pub use rec_run::SqlRecRunRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Timestamps are stored as TEXT in the `datetime('now')` shape so that
/// rows written by SQLite defaults and rows written from here compare and
/// sort identically.
pub(crate) fn format_timestamp(value: chrono::DateTime<chrono::Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_timestamp(
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| RepositoryError::Decode(format!("bad timestamp {raw:?}: {err}")))
}

/// Free-text search plus AND-combined filter groups; each group is an OR
/// over its own values.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub query: Option<String>,
    pub brands: Vec<String>,
    pub sizes: Vec<i64>,
    pub genders: Vec<String>,
    pub concentrations: Vec<String>,
    pub accords: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SearchPage {
    pub items: Vec<Perfume>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct CatalogFacets {
    pub brands: Vec<String>,
    pub concentrations: Vec<String>,
    pub genders: Vec<String>,
    pub accords: Vec<String>,
}

/// Read-only query facade over the perfume catalog.
///
/// `find_by_accords` declares a two-strategy contract: a structured
/// containment pass over the JSON attribute first, then substring fallbacks
/// (quoted token, then bare token) when the structured pass fails or comes
/// back empty. Callers never see which strategy produced the rows.
#[async_trait]
pub trait PerfumeRepository: Send + Sync {
    async fn find_by_id(&self, id: PerfumeId) -> Result<Option<Perfume>, RepositoryError>;

    async fn find_by_accords(
        &self,
        accords: &[String],
        limit: u32,
        gender: Option<GenderFilter>,
    ) -> Result<Vec<Perfume>, RepositoryError>;

    async fn search(
        &self,
        filter: &SearchFilter,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, RepositoryError>;

    /// Previous and next catalog ids relative to `id`, for detail-page
    /// navigation.
    async fn neighbor_ids(
        &self,
        id: PerfumeId,
    ) -> Result<(Option<PerfumeId>, Option<PerfumeId>), RepositoryError>;

    async fn facets(&self) -> Result<CatalogFacets, RepositoryError>;
}

#[derive(Clone, Debug)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub model: Option<String>,
    pub idempotency_key: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub backend_state: Option<serde_json::Value>,
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_for_user(
        &self,
        id: ConversationId,
        user_id: i64,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn create(
        &self,
        user_id: i64,
        title: Option<String>,
        external_thread_id: Option<Uuid>,
    ) -> Result<Conversation, RepositoryError>;

    /// Bumps `updated_at`; the only permitted mutation of a conversation row.
    async fn touch(&self, id: ConversationId) -> Result<(), RepositoryError>;

    async fn list_recent(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError>;

    async fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError>;

    async fn first_user_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, RepositoryError>;

    /// The already-persisted user message for a retried idempotency key, if
    /// any. Used for the duplicate-submission short circuit.
    async fn find_user_message_by_key(
        &self,
        conversation_id: ConversationId,
        idempotency_key: Uuid,
    ) -> Result<Option<Message>, RepositoryError>;

    /// The earliest assistant message created at or after the given user
    /// message, i.e. the answer that was stored alongside it.
    async fn assistant_reply_for(
        &self,
        conversation_id: ConversationId,
        user_message: &Message,
    ) -> Result<Option<Message>, RepositoryError>;

    async fn append_message(&self, message: NewMessage) -> Result<Message, RepositoryError>;
}

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Flips membership; returns whether the perfume is favorited afterwards.
    async fn toggle(&self, user_id: i64, perfume_id: PerfumeId) -> Result<bool, RepositoryError>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Perfume>, RepositoryError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Applies the like/dislike toggle policy: repeating the active action
    /// clears it, an opposing action replaces it in place, otherwise a new
    /// event row is created. Returns the action that is active afterwards.
    async fn toggle_vote(
        &self,
        user_id: i64,
        perfume_id: PerfumeId,
        action: FeedbackAction,
        source: &str,
        context: Option<serde_json::Value>,
    ) -> Result<Option<FeedbackAction>, RepositoryError>;

    async fn record_event(
        &self,
        user_id: i64,
        perfume_id: PerfumeId,
        action: FeedbackAction,
        source: &str,
        context: Option<serde_json::Value>,
    ) -> Result<(), RepositoryError>;

    async fn perfumes_with_action(
        &self,
        user_id: i64,
        action: FeedbackAction,
    ) -> Result<Vec<Perfume>, RepositoryError>;
}

#[derive(Clone, Debug)]
pub struct NewRecRun {
    pub user_id: i64,
    pub conversation_id: Option<ConversationId>,
    pub request_message_id: Option<i64>,
    pub query_text: String,
    pub parsed_slots: Option<serde_json::Value>,
    pub agent: Option<String>,
    pub model_version: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewRecCandidate {
    pub perfume_id: PerfumeId,
    pub rank: u32,
    pub score: f64,
    pub reason_summary: Option<String>,
    pub reason_detail: Option<serde_json::Value>,
    pub retrieved_from: Option<String>,
}

#[async_trait]
pub trait RecRunRepository: Send + Sync {
    /// Persists a run with its ranked candidates. Ranks start at 1 and the
    /// (run, perfume) pair is unique; violations surface as database errors.
    async fn log_run(
        &self,
        run: NewRecRun,
        candidates: Vec<NewRecCandidate>,
    ) -> Result<RecRunId, RepositoryError>;
}

#[async_trait]
pub trait NoteImageRepository: Send + Sync {
    /// Resolves a note name to an image URL: exact match first, then
    /// substring, then per-word substring for multi-word names. `None`
    /// when nothing matches.
    async fn find_image_url(&self, note_name: &str) -> Result<Option<String>, RepositoryError>;
}
