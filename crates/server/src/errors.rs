//! Maps application failures onto HTTP responses with a correlation id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use scentpick_agent::client::BackendError;
use scentpick_agent::sampling::SamplingError;
use scentpick_agent::session::SessionError;
use scentpick_core::errors::{ApplicationError, DomainError, InterfaceError};
use scentpick_db::repositories::RepositoryError;

#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    correlation_id: String,
    retryable: bool,
}

impl ApiError {
    pub fn from_application(error: ApplicationError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_application(ApplicationError::Domain(DomainError::NotFound(message.into())))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_application(ApplicationError::Domain(DomainError::Validation(message.into())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let (message, correlation_id) = match &self.0 {
            InterfaceError::NotFound { message, correlation_id }
            | InterfaceError::BadRequest { message, correlation_id }
            | InterfaceError::BadGateway { message, correlation_id }
            | InterfaceError::ServiceUnavailable { message, correlation_id }
            | InterfaceError::Internal { message, correlation_id } => {
                (message.clone(), correlation_id.clone())
            }
        };

        tracing::warn!(
            event_name = "api.request.failed",
            status = status.as_u16(),
            correlation_id = %correlation_id,
            "request failed: {message}"
        );

        let body = ErrorBody { error: message, correlation_id, retryable: self.0.is_retryable() };
        (status, Json(body)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self::from_application(error)
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        let application = match error {
            SessionError::ConversationNotFound(id) => {
                ApplicationError::Domain(DomainError::NotFound(format!("conversation {id}")))
            }
            SessionError::EmptyQuery => {
                ApplicationError::Domain(DomainError::Validation(error.to_string()))
            }
            SessionError::Backend(BackendError::Api { status, message }) => {
                ApplicationError::Backend(format!("backend returned {status}: {message}"))
            }
            SessionError::Backend(BackendError::Transport(source)) => {
                ApplicationError::Transport(source.to_string())
            }
            SessionError::Repository(source) => ApplicationError::Persistence(source.to_string()),
        };
        Self::from_application(application)
    }
}

impl From<SamplingError> for ApiError {
    fn from(error: SamplingError) -> Self {
        let SamplingError::Repository(source) = error;
        Self::from_application(ApplicationError::Persistence(source.to_string()))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self::from_application(ApplicationError::Persistence(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use scentpick_agent::client::BackendError;
    use scentpick_agent::session::SessionError;

    use super::ApiError;

    #[test]
    fn session_errors_map_to_expected_statuses() {
        let not_found = ApiError::from(SessionError::ConversationNotFound(9));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let empty = ApiError::from(SessionError::EmptyQuery);
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);

        let backend = ApiError::from(SessionError::Backend(BackendError::Api {
            status: 500,
            message: "boom".to_string(),
        }));
        assert_eq!(backend.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
