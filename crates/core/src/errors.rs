use thiserror::Error;

use crate::domain::authorization::AuthorizationId;
use crate::workflow::engine::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("authorization `{0}` was not found")]
    NotFound(AuthorizationId),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn workflow(error: WorkflowError) -> Self {
        Self::Domain(DomainError::Workflow(error))
    }

    pub fn as_workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Domain(DomainError::Workflow(error)) => Some(error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// The operator-facing detail, without the variant prefix `Display` adds.
    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Conflict { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "The authorization is not in a state that permits this action."
            }
            Self::Forbidden { .. } => "This actor is not permitted to perform the action.",
            Self::NotFound { .. } => "The requested authorization does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Workflow(error)) => match &error {
                WorkflowError::ReasonTooShort { .. }
                | WorkflowError::CooldownOutOfRange { .. } => {
                    Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
                }
                WorkflowError::NotPermitted { .. } => {
                    Self::Forbidden { message: error.to_string(), correlation_id: unassigned() }
                }
                WorkflowError::DuplicateActive { .. }
                | WorkflowError::CooldownActive { .. }
                | WorkflowError::SlotsExhausted { .. }
                | WorkflowError::InvalidTransition { .. } => {
                    Self::Conflict { message: error.to_string(), correlation_id: unassigned() }
                }
            },
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::BadRequest { message, correlation_id: unassigned() }
            }
            ApplicationError::NotFound(id) => Self::NotFound {
                message: format!("authorization `{id}` was not found"),
                correlation_id: unassigned(),
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
