use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{blobs::BlobError, repos::RepoError, validation::ValidationError},
    domain::error::{DomainError, ErrorCategory},
    infra::error::InfraError,
};

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl ServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::Domain(err) => err.category(),
            ServiceError::Validation(_) => ErrorCategory::InvalidData,
            ServiceError::Repo(err) if err.is_connectivity() => ErrorCategory::External,
            ServiceError::Repo(_) => ErrorCategory::Unexpected,
            ServiceError::Blob(_) => ErrorCategory::External,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceError::Domain(err) => err.name(),
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::Repo(err) if err.is_connectivity() => "DatabaseConnectionError",
            ServiceError::Repo(_) => "UnexpectedError",
            ServiceError::Blob(_) => "BlobStorageError",
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// Unique violations of constraints that back a domain rule surface as that
/// rule's error.
impl From<RepoError> for ServiceError {
    fn from(err: RepoError) -> Self {
        let rule = match &err {
            RepoError::Duplicate { constraint } => duplicate_rule(constraint),
            _ => None,
        };
        match rule {
            Some(rule) => ServiceError::Domain(rule),
            None => ServiceError::Repo(err),
        }
    }
}

fn duplicate_rule(constraint: &str) -> Option<DomainError> {
    match constraint {
        "users_name_key" => Some(DomainError::UsernameAlreadyTaken),
        "user_follows_pkey" => Some(DomainError::AlreadyFollowingUser),
        "topic_follows_pkey" => Some(DomainError::AlreadyFollowingTopics),
        "post_views_pkey" => Some(DomainError::PostAlreadyViewed),
        _ => None,
    }
}

/// Serializable summary of an error chain for logs and transports.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub name: &'static str,
    pub category: ErrorCategory,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_service(source: &'static str, error: &ServiceError) -> Self {
        Self {
            source,
            name: error.name(),
            category: error.category(),
            messages: chain(error),
        }
    }
}

fn chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
