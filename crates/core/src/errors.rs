use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("chat backend error: {0}")]
    Backend(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// True when the caller may safely retry the same request, idempotency
    /// key included.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::NotFound(message)) => {
                Self::NotFound { message, correlation_id: unassigned }
            }
            ApplicationError::Domain(DomainError::Validation(message))
            | ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::BadRequest { message, correlation_id: unassigned }
            }
            ApplicationError::Backend(message) => {
                Self::BadGateway { message, correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) | ApplicationError::Transport(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn not_found_maps_to_not_found_interface_error() {
        let interface = ApplicationError::from(DomainError::NotFound("perfume 42".to_owned()))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(!interface.is_retryable());
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::Validation("empty content".to_owned()))
            .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn backend_error_maps_to_bad_gateway_and_is_not_retryable() {
        let interface =
            ApplicationError::Backend("quota exceeded".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::BadGateway { .. }));
        assert!(!interface.is_retryable());
    }

    #[test]
    fn transport_error_is_retryable() {
        let interface =
            ApplicationError::Transport("connect timeout".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(interface.is_retryable());
    }
}
