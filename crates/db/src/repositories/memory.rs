//! In-memory repository doubles for exercising session and sampling logic
//! without a database.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use scentpick_core::attributes::parse_tokens;
use scentpick_core::domain::conversation::{
    Conversation, ConversationId, Message, MessageId, MessageRole,
};
use scentpick_core::domain::perfume::{GenderFilter, Perfume, PerfumeId};

use super::{
    CatalogFacets, ConversationRepository, NewMessage, PerfumeRepository, RepositoryError,
    SearchFilter, SearchPage,
};

pub struct InMemoryPerfumeRepository {
    perfumes: Vec<Perfume>,
}

impl InMemoryPerfumeRepository {
    pub fn new(perfumes: Vec<Perfume>) -> Self {
        Self { perfumes }
    }

    fn matches_accords(perfume: &Perfume, accords: &[String]) -> bool {
        let tokens: Vec<String> =
            parse_tokens(&perfume.main_accords).iter().map(|t| t.to_ascii_lowercase()).collect();
        let raw = perfume.main_accords.to_string().to_ascii_lowercase();
        accords.iter().any(|accord| {
            let needle = accord.to_ascii_lowercase();
            tokens.contains(&needle) || raw.contains(&needle)
        })
    }
}

#[async_trait::async_trait]
impl PerfumeRepository for InMemoryPerfumeRepository {
    async fn find_by_id(&self, id: PerfumeId) -> Result<Option<Perfume>, RepositoryError> {
        Ok(self.perfumes.iter().find(|perfume| perfume.id == id).cloned())
    }

    async fn find_by_accords(
        &self,
        accords: &[String],
        limit: u32,
        gender: Option<GenderFilter>,
    ) -> Result<Vec<Perfume>, RepositoryError> {
        if accords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .perfumes
            .iter()
            .filter(|perfume| Self::matches_accords(perfume, accords))
            .filter(|perfume| gender.map_or(true, |filter| filter.admits(perfume.gender)))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn search(
        &self,
        filter: &SearchFilter,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, RepositoryError> {
        let per_page = per_page.max(1);
        let mut items: Vec<Perfume> = self
            .perfumes
            .iter()
            .filter(|perfume| {
                filter.query.as_deref().map_or(true, |query| {
                    let haystack = format!(
                        "{} {} {} {} {} {} {}",
                        perfume.brand,
                        perfume.name,
                        perfume.description,
                        perfume.main_accords,
                        perfume.top_notes,
                        perfume.middle_notes,
                        perfume.base_notes,
                    )
                    .to_ascii_lowercase();
                    query
                        .split_whitespace()
                        .all(|word| haystack.contains(&word.to_ascii_lowercase()))
                })
            })
            .filter(|perfume| filter.brands.is_empty() || filter.brands.contains(&perfume.brand))
            .cloned()
            .collect();
        items.sort_by(|a, b| (&a.brand, &a.name).cmp(&(&b.brand, &b.name)));

        let total = items.len() as u64;
        let total_pages = (total.div_ceil(per_page as u64)).max(1) as u32;
        let page = page.clamp(1, total_pages);
        let start = ((page - 1) * per_page) as usize;
        let items = items.into_iter().skip(start).take(per_page as usize).collect();
        Ok(SearchPage { items, total, page, total_pages })
    }

    async fn neighbor_ids(
        &self,
        id: PerfumeId,
    ) -> Result<(Option<PerfumeId>, Option<PerfumeId>), RepositoryError> {
        let prev = self.perfumes.iter().map(|p| p.id.0).filter(|&pid| pid < id.0).max();
        let next = self.perfumes.iter().map(|p| p.id.0).filter(|&pid| pid > id.0).min();
        Ok((prev.map(PerfumeId), next.map(PerfumeId)))
    }

    async fn facets(&self) -> Result<CatalogFacets, RepositoryError> {
        let mut brands: Vec<String> = self.perfumes.iter().map(|p| p.brand.clone()).collect();
        brands.sort();
        brands.dedup();
        Ok(CatalogFacets { brands, ..Default::default() })
    }
}

#[derive(Default)]
struct ConversationState {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    state: RwLock<ConversationState>,
    next_conversation_id: AtomicI64,
    next_message_id: AtomicI64,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConversationState::default()),
            next_conversation_id: AtomicI64::new(1),
            next_message_id: AtomicI64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_for_user(
        &self,
        id: ConversationId,
        user_id: i64,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .iter()
            .find(|conversation| conversation.id == id && conversation.user_id == user_id)
            .cloned())
    }

    async fn create(
        &self,
        user_id: i64,
        title: Option<String>,
        external_thread_id: Option<Uuid>,
    ) -> Result<Conversation, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(thread) = external_thread_id {
            if state.conversations.iter().any(|c| c.external_thread_id == Some(thread)) {
                return Err(RepositoryError::Conflict(format!(
                    "external thread {thread} already exists",
                )));
            }
        }
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId(self.next_conversation_id.fetch_add(1, Ordering::SeqCst)),
            user_id,
            title,
            external_thread_id,
            started_at: now,
            updated_at: now,
        };
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn touch(&self, id: ConversationId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(conversation) = state.conversations.iter_mut().find(|c| c.id == id) {
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        let mut conversations: Vec<Conversation> =
            state.conversations.iter().filter(|c| c.user_id == user_id).cloned().collect();
        conversations.sort_by(|a, b| (b.updated_at, b.id.0).cmp(&(a.updated_at, a.id.0)));
        conversations.truncate(limit as usize);
        Ok(conversations)
    }

    async fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|message| message.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(messages)
    }

    async fn first_user_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, RepositoryError> {
        let messages = self.messages(conversation_id).await?;
        Ok(messages.into_iter().find(|message| message.role == MessageRole::User))
    }

    async fn find_user_message_by_key(
        &self,
        conversation_id: ConversationId,
        idempotency_key: Uuid,
    ) -> Result<Option<Message>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .find(|message| {
                message.conversation_id == conversation_id
                    && message.role == MessageRole::User
                    && message.idempotency_key == Some(idempotency_key)
            })
            .cloned())
    }

    async fn assistant_reply_for(
        &self,
        conversation_id: ConversationId,
        user_message: &Message,
    ) -> Result<Option<Message>, RepositoryError> {
        let messages = self.messages(conversation_id).await?;
        Ok(messages
            .into_iter()
            .filter(|message| message.role == MessageRole::Assistant)
            .find(|message| {
                (message.created_at, message.id.0)
                    > (user_message.created_at, user_message.id.0)
            }))
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(key) = message.idempotency_key {
            let clash = state.messages.iter().any(|existing| {
                existing.conversation_id == message.conversation_id
                    && existing.idempotency_key == Some(key)
            });
            if clash {
                return Err(RepositoryError::Conflict(format!(
                    "idempotency key {key} already used in conversation {}",
                    message.conversation_id.0,
                )));
            }
        }
        let stored = Message {
            id: MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            model: message.model,
            idempotency_key: message.idempotency_key,
            metadata: message.metadata,
            backend_state: message.backend_state,
            created_at: Utc::now(),
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use scentpick_core::domain::conversation::MessageRole;

    use super::InMemoryConversationRepository;
    use crate::repositories::{ConversationRepository, NewMessage};

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let repo = InMemoryConversationRepository::new();
        let conversation = repo.create(1, None, None).await.expect("create");
        let key = Uuid::new_v4();

        let message = NewMessage {
            conversation_id: conversation.id,
            role: MessageRole::User,
            content: "hello".to_string(),
            model: None,
            idempotency_key: Some(key),
            metadata: None,
            backend_state: None,
        };
        repo.append_message(message.clone()).await.expect("first");
        assert!(repo.append_message(message).await.is_err());
    }

    #[tokio::test]
    async fn list_recent_is_most_recent_first() {
        let repo = InMemoryConversationRepository::new();
        let first = repo.create(1, Some("first".to_string()), None).await.expect("create");
        let second = repo.create(1, Some("second".to_string()), None).await.expect("create");
        repo.touch(first.id).await.expect("touch");

        let listed = repo.list_recent(1, 10).await.expect("list");
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }
}
