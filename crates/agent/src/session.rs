//! Reconciles local conversation rows with the external chat backend.
//!
//! The bridge owns the ordering contract for a user turn: the backend is
//! called first, and only a successful reply is persisted. A transport or
//! API failure therefore leaves no local trace of the attempt, and a
//! retried idempotency key is answered from storage without a second
//! backend call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use scentpick_core::domain::conversation::{Conversation, ConversationId, Message, MessageRole};
use scentpick_db::repositories::{ConversationRepository, NewMessage, RepositoryError};

use crate::client::{BackendError, ChatBackend, ChatRequest, ChatRequestMessage};

/// Conversation listings cap out here; older sessions age out of the view.
const CONVERSATION_LIST_LIMIT: u32 = 100;

/// Titles are clipped to this many characters of the opening query.
const TITLE_CHAR_LIMIT: usize = 15;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("conversation {0} not found for this user")]
    ConversationNotFound(i64),
    #[error("query text must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Client-held session state. There is no ambient session; callers carry
/// this between turns and get an updated copy back with every outcome.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub conversation_id: Option<i64>,
    pub external_thread_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
pub struct SubmitOutcome {
    pub context: SessionContext,
    pub conversation: Conversation,
    pub user_message: Message,
    /// Absent only when a retried key finds its user message but the
    /// original reply was never stored.
    pub assistant_message: Option<Message>,
    pub deduplicated: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

pub struct SessionBridge {
    backend: Arc<dyn ChatBackend>,
    conversations: Arc<dyn ConversationRepository>,
}

impl SessionBridge {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        conversations: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self { backend, conversations }
    }

    /// Fresh session state with a thread id minted up front, so the first
    /// backend call already carries the correlation identity.
    pub fn new_session(&self) -> SessionContext {
        SessionContext { conversation_id: None, external_thread_id: Some(Uuid::new_v4()) }
    }

    pub async fn submit(
        &self,
        user_id: i64,
        context: SessionContext,
        query: &str,
        idempotency_key: Option<Uuid>,
    ) -> Result<SubmitOutcome, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery);
        }

        let existing = match context.conversation_id {
            Some(id) => Some(
                self.conversations
                    .find_for_user(ConversationId(id), user_id)
                    .await?
                    .ok_or(SessionError::ConversationNotFound(id))?,
            ),
            None => None,
        };

        // Retried keys are answered from storage; the backend never sees
        // the same turn twice.
        if let (Some(conversation), Some(key)) = (&existing, idempotency_key) {
            if let Some(stored) =
                self.conversations.find_user_message_by_key(conversation.id, key).await?
            {
                let reply =
                    self.conversations.assistant_reply_for(conversation.id, &stored).await?;
                tracing::info!(
                    event_name = "chat.session.deduplicated",
                    conversation_id = conversation.id.0,
                    "duplicate submission answered from storage"
                );
                return Ok(SubmitOutcome {
                    context: resolved_context(conversation),
                    conversation: conversation.clone(),
                    user_message: stored,
                    assistant_message: reply,
                    deduplicated: true,
                });
            }
        }

        let key = idempotency_key.unwrap_or_else(Uuid::new_v4);
        let thread = existing
            .as_ref()
            .and_then(|conversation| conversation.external_thread_id)
            .or(context.external_thread_id)
            .unwrap_or_else(Uuid::new_v4);
        let title = existing
            .as_ref()
            .and_then(|conversation| conversation.title.clone())
            .unwrap_or_else(|| truncate_title(query));

        let request = ChatRequest {
            user_id,
            conversation_id: existing.as_ref().map(|conversation| conversation.id.0),
            external_thread_id: thread,
            title: Some(title.clone()),
            query: query.to_string(),
            message: ChatRequestMessage {
                content: query.to_string(),
                idempotency_key: key,
                metadata: json!({}),
            },
        };

        let response = self.backend.run(&request).await?;

        // The backend owns these ids from here on; a reply that names a
        // different thread supersedes the one we sent.
        let thread = response.external_thread_id.unwrap_or(thread);
        let conversation = match existing {
            Some(conversation) => conversation,
            None => self.conversations.create(user_id, Some(title), Some(thread)).await?,
        };
        let context = SessionContext {
            conversation_id: response.conversation_id.or(Some(conversation.id.0)),
            external_thread_id: Some(thread),
        };

        let user_message = self
            .conversations
            .append_message(NewMessage {
                conversation_id: conversation.id,
                role: MessageRole::User,
                content: query.to_string(),
                model: None,
                idempotency_key: Some(key),
                metadata: None,
                backend_state: None,
            })
            .await?;

        let metadata =
            response.perfume_list.map(|perfume_list| json!({ "perfume_list": perfume_list }));
        let backend_state = (!response.messages_appended.is_empty())
            .then(|| json!({ "messages_appended": response.messages_appended }));

        let assistant_message = self
            .conversations
            .append_message(NewMessage {
                conversation_id: conversation.id,
                role: MessageRole::Assistant,
                content: response.final_answer,
                model: None,
                idempotency_key: None,
                metadata,
                backend_state,
            })
            .await?;

        self.conversations.touch(conversation.id).await?;

        Ok(SubmitOutcome {
            context,
            conversation,
            user_message,
            assistant_message: Some(assistant_message),
            deduplicated: false,
        })
    }

    /// Recent conversations for the sidebar, newest activity first. Untitled
    /// rows borrow their opening user message, clipped like a fresh title.
    pub async fn list_conversations(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, SessionError> {
        let conversations =
            self.conversations.list_recent(user_id, CONVERSATION_LIST_LIMIT).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let title = match conversation.title.clone() {
                Some(title) if !title.trim().is_empty() => title,
                _ => match self.conversations.first_user_message(conversation.id).await? {
                    Some(message) => truncate_title(&message.content),
                    None => format!("Conversation {}", conversation.id.0),
                },
            };
            summaries.push(ConversationSummary {
                id: conversation.id.0,
                title,
                updated_at: conversation.updated_at,
            });
        }
        Ok(summaries)
    }

    pub async fn conversation_messages(
        &self,
        user_id: i64,
        conversation_id: i64,
    ) -> Result<Vec<Message>, SessionError> {
        let conversation = self
            .conversations
            .find_for_user(ConversationId(conversation_id), user_id)
            .await?
            .ok_or(SessionError::ConversationNotFound(conversation_id))?;
        Ok(self.conversations.messages(conversation.id).await?)
    }
}

fn resolved_context(conversation: &Conversation) -> SessionContext {
    SessionContext {
        conversation_id: Some(conversation.id.0),
        external_thread_id: conversation.external_thread_id,
    }
}

fn truncate_title(query: &str) -> String {
    query.chars().take(TITLE_CHAR_LIMIT).collect()
}
