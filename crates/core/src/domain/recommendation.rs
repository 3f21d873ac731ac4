use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::conversation::{ConversationId, MessageId};
use crate::domain::perfume::PerfumeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecRunId(pub i64);

/// One recommendation pass: who asked, in which conversation, and the raw
/// query the candidates were retrieved for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecRun {
    pub id: RecRunId,
    pub user_id: i64,
    pub conversation_id: Option<ConversationId>,
    pub request_message_id: Option<MessageId>,
    pub query_text: String,
    pub parsed_slots: Option<Value>,
    pub agent: Option<String>,
    pub model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A ranked candidate inside a run. `rank` starts at 1 and is unique within
/// the run, as is the (run, perfume) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecCandidate {
    pub run_id: RecRunId,
    pub perfume_id: PerfumeId,
    pub rank: u32,
    pub score: f64,
    pub reason_summary: Option<String>,
    pub reason_detail: Option<Value>,
    pub retrieved_from: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: i64,
    pub perfume_id: PerfumeId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Like,
    Dislike,
    Dismiss,
    View,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Dismiss => "dismiss",
            Self::View => "view",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            "dismiss" => Some(Self::Dismiss),
            "view" => Some(Self::View),
            _ => None,
        }
    }

    /// Like and dislike are mutually exclusive "active" states; the toggle
    /// operation keeps at most one of them per (user, perfume).
    pub fn is_active_vote(&self) -> bool {
        matches!(self, Self::Like | Self::Dislike)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub user_id: i64,
    pub perfume_id: PerfumeId,
    pub rec_candidate_id: Option<i64>,
    pub source: String,
    pub action: FeedbackAction,
    pub context: Option<Value>,
    pub created_at: DateTime<Utc>,
}
