pub mod assets;
pub mod attributes;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pagination;
pub mod weather;

pub use assets::AssetResolver;
pub use attributes::{parse_score, parse_tokens, ACCORD_DISPLAY_CAP};
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::conversation::{Conversation, ConversationId, Message, MessageId, MessageRole};
pub use domain::perfume::{Gender, GenderFilter, Perfume, PerfumeId};
pub use domain::recommendation::{
    Favorite, FeedbackAction, FeedbackEvent, RecCandidate, RecRun, RecRunId,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pagination::{compute_range, PageItem};
pub use weather::{
    code_description, code_to_advice, code_to_emoji, season_advice, wind_descriptor, SeasonAdvice,
    WeatherAdvice,
};
