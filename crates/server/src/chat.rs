//! Chat endpoints. Session state travels in request and response bodies;
//! the server keeps no per-client session.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scentpick_agent::session::{ConversationSummary, SessionContext};
use scentpick_core::domain::conversation::Message;

use crate::bootstrap::AppState;
use crate::errors::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(submit_chat))
        .route("/api/chat/new", post(new_chat))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}/messages", get(conversation_messages))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub user_id: i64,
    pub content: String,
    pub conversation_id: Option<i64>,
    pub external_thread_id: Option<Uuid>,
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub conversation_id: i64,
    pub external_thread_id: Option<Uuid>,
    pub final_answer: String,
    pub messages_appended: Vec<MessageView>,
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub role: &'static str,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.0,
            role: message.role.as_str(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

pub async fn submit_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, ApiError> {
    let context = SessionContext {
        conversation_id: body.conversation_id,
        external_thread_id: body.external_thread_id,
    };
    let outcome =
        state.session.submit(body.user_id, context, &body.content, body.idempotency_key).await?;

    let mut appended = vec![MessageView::from(&outcome.user_message)];
    if let Some(assistant) = &outcome.assistant_message {
        appended.push(MessageView::from(assistant));
    }

    Ok(Json(ChatReply {
        conversation_id: outcome.context.conversation_id.unwrap_or(outcome.conversation.id.0),
        external_thread_id: outcome.context.external_thread_id,
        final_answer: outcome
            .assistant_message
            .map(|message| message.content)
            .unwrap_or_default(),
        messages_appended: appended,
        deduplicated: outcome.deduplicated,
    }))
}

#[derive(Debug, Serialize)]
pub struct NewChatReply {
    pub conversation_id: Option<i64>,
    pub external_thread_id: Uuid,
}

/// Hands out fresh session state. The thread id is always newly minted so
/// a reset never continues the previous backend thread; nothing is
/// persisted until the first successful turn.
pub async fn new_chat(State(state): State<AppState>) -> Json<NewChatReply> {
    let context = state.session.new_session();
    let thread = context.external_thread_id.unwrap_or_else(Uuid::new_v4);
    Json(NewChatReply { conversation_id: None, external_thread_id: thread })
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationsReply {
    pub conversations: Vec<ConversationSummary>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ConversationsReply>, ApiError> {
    let conversations = state.session.list_conversations(query.user_id).await?;
    Ok(Json(ConversationsReply { conversations }))
}

#[derive(Debug, Serialize)]
pub struct MessagesReply {
    pub conversation_id: i64,
    pub messages: Vec<MessageView>,
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<MessagesReply>, ApiError> {
    let messages = state.session.conversation_messages(query.user_id, id).await?;
    Ok(Json(MessagesReply {
        conversation_id: id,
        messages: messages.iter().map(MessageView::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use uuid::Uuid;

    use crate::bootstrap::testing::{failing_backend, replying_backend, test_state};

    use super::{
        conversation_messages, list_conversations, new_chat, submit_chat, ChatBody, UserQuery,
    };

    fn chat_body(user_id: i64, content: &str) -> ChatBody {
        ChatBody {
            user_id,
            content: content.to_string(),
            conversation_id: None,
            external_thread_id: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn chat_turn_persists_and_lists() {
        let (state, _pool) = test_state(replying_backend("a woody pick for you")).await;

        let Json(reply) = submit_chat(
            State(state.clone()),
            Json(chat_body(1, "recommend something for tonight")),
        )
        .await
        .expect("chat turn");

        assert_eq!(reply.final_answer, "a woody pick for you");
        assert_eq!(reply.messages_appended.len(), 2);
        assert!(!reply.deduplicated);

        let Json(listed) =
            list_conversations(State(state.clone()), Query(UserQuery { user_id: 1 }))
                .await
                .expect("list");
        assert_eq!(listed.conversations.len(), 1);
        assert_eq!(listed.conversations[0].title, "recommend somet");

        let Json(messages) = conversation_messages(
            State(state),
            Path(reply.conversation_id),
            Query(UserQuery { user_id: 1 }),
        )
        .await
        .expect("messages");
        assert_eq!(messages.messages.len(), 2);
        assert_eq!(messages.messages[0].role, "user");
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let (state, _pool) = test_state(replying_backend("unused")).await;

        let error = submit_chat(State(state), Json(chat_body(1, "   ")))
            .await
            .expect_err("empty content");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backend_application_error_maps_to_bad_gateway() {
        let (state, _pool) = test_state(failing_backend()).await;

        let error =
            submit_chat(State(state), Json(chat_body(1, "hello"))).await.expect_err("failure");
        assert_eq!(error.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn foreign_conversation_messages_are_not_found() {
        let (state, _pool) = test_state(replying_backend("answer")).await;

        let Json(reply) =
            submit_chat(State(state.clone()), Json(chat_body(1, "mine"))).await.expect("chat");

        let error = conversation_messages(
            State(state),
            Path(reply.conversation_id),
            Query(UserQuery { user_id: 2 }),
        )
        .await
        .expect_err("foreign access");
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn new_chat_always_mints_a_fresh_thread_id() {
        let (state, _pool) = test_state(replying_backend("unused")).await;

        let Json(first) = new_chat(State(state.clone())).await;
        let Json(second) = new_chat(State(state)).await;

        assert!(first.conversation_id.is_none());
        assert_ne!(first.external_thread_id, Uuid::nil());
        assert_ne!(
            first.external_thread_id, second.external_thread_id,
            "a reset must never continue the previous thread"
        );
    }
}
