use serde::Serialize;
use thiserror::Error;

/// Coarse classification every error surfaced by the services maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Forbidden,
    InvalidData,
    External,
    Unexpected,
}

impl ErrorCategory {
    /// HTTP status a transport layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::InvalidData => 400,
            ErrorCategory::External => 503,
            ErrorCategory::Unexpected => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("User not found")]
    UserNotFound,
    #[error("Users not found: {}", .ids.join(", "))]
    UsersNotFound { ids: Vec<String> },
    #[error("Username is already taken")]
    UsernameAlreadyTaken,
    #[error("You are already following this user")]
    AlreadyFollowingUser,
    #[error("You are not following this user")]
    NotFollowingUser,
    #[error("You cannot follow yourself")]
    CannotFollowSelf,
    #[error("Username can only be changed once every 31 days")]
    UserUpdateNameConstraint,
    #[error("Profile picture can only be changed once every 7 days")]
    UserUpdateImageConstraint,
    #[error("Profile picture exceeds the maximum allowed size")]
    LargeImageSize,

    #[error("Topic not found")]
    TopicNotFound,
    #[error("Topics not found: {}", .ids.join(", "))]
    TopicsNotFound { ids: Vec<String> },
    #[error("You are already following this topic")]
    AlreadyFollowingTopics,
    #[error("You are not following this topic")]
    NotFollowingTopic,

    #[error("Post not found")]
    PostNotFound,
    #[error("Post pages not found")]
    PostPagesNotFound,
    #[error("A post must have between 1 and 6 pages")]
    PostPagesConstraint,
    #[error("Only the owner can perform this operation")]
    OnlyOwnerCanPerform,
    #[error("Post was already viewed")]
    PostAlreadyViewed,
    #[error("Topics cannot be repeated")]
    RepeatedTopics,
    #[error("Authors cannot be repeated")]
    RepeatedAuthors,
    #[error("You cannot rate your own post")]
    CannotRateOwnPost,
    #[error("Invalid quiz: {}", .reasons.join("; "))]
    InvalidQuiz { reasons: Vec<String> },

    #[error("Feed not found")]
    FeedNotFound,
    #[error("This feed does not belong to you")]
    NotYourFeed,
    #[error("A feed needs at least one topic or author and at most 8 of each")]
    FeedTopicsAndAuthors,

    #[error("File of {size} bytes exceeds the maximum allowed size")]
    ExceededMaxFileSize { size: usize },
    #[error("File type `{mime}` is not allowed")]
    InvalidFileType { mime: String },
}

impl DomainError {
    pub fn users_not_found<T: ToString>(ids: &[T]) -> Self {
        Self::UsersNotFound {
            ids: ids.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn topics_not_found(ids: &[String]) -> Self {
        Self::TopicsNotFound { ids: ids.to_vec() }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DomainError::UserNotFound
            | DomainError::UsersNotFound { .. }
            | DomainError::NotFollowingUser
            | DomainError::TopicNotFound
            | DomainError::TopicsNotFound { .. }
            | DomainError::NotFollowingTopic
            | DomainError::PostNotFound
            | DomainError::PostPagesNotFound
            | DomainError::FeedNotFound => ErrorCategory::NotFound,
            DomainError::UsernameAlreadyTaken
            | DomainError::AlreadyFollowingUser
            | DomainError::CannotFollowSelf
            | DomainError::AlreadyFollowingTopics
            | DomainError::PostAlreadyViewed
            | DomainError::CannotRateOwnPost => ErrorCategory::Conflict,
            DomainError::OnlyOwnerCanPerform | DomainError::NotYourFeed => {
                ErrorCategory::Forbidden
            }
            DomainError::UserUpdateNameConstraint
            | DomainError::UserUpdateImageConstraint
            | DomainError::LargeImageSize
            | DomainError::PostPagesConstraint
            | DomainError::RepeatedTopics
            | DomainError::RepeatedAuthors
            | DomainError::InvalidQuiz { .. }
            | DomainError::FeedTopicsAndAuthors
            | DomainError::ExceededMaxFileSize { .. }
            | DomainError::InvalidFileType { .. } => ErrorCategory::InvalidData,
        }
    }

    /// Stable identifier clients can match on.
    pub fn name(&self) -> &'static str {
        match self {
            DomainError::UserNotFound => "UserNotFound",
            DomainError::UsersNotFound { .. } => "UsersNotFound",
            DomainError::UsernameAlreadyTaken => "UsernameAlreadyTaken",
            DomainError::AlreadyFollowingUser => "AlreadyFollowingUser",
            DomainError::NotFollowingUser => "NotFollowingUser",
            DomainError::CannotFollowSelf => "CannotFollowSelf",
            DomainError::UserUpdateNameConstraint => "UserUpdateNameConstraint",
            DomainError::UserUpdateImageConstraint => "UserUpdateImageConstraint",
            DomainError::LargeImageSize => "LargeImageSize",
            DomainError::TopicNotFound => "TopicNotFound",
            DomainError::TopicsNotFound { .. } => "TopicsNotFound",
            DomainError::AlreadyFollowingTopics => "AlreadyFollowingTopics",
            DomainError::NotFollowingTopic => "NotFollowingTopic",
            DomainError::PostNotFound => "PostNotFound",
            DomainError::PostPagesNotFound => "PostPagesNotFound",
            DomainError::PostPagesConstraint => "PostPagesConstraint",
            DomainError::OnlyOwnerCanPerform => "OnlyOwnerCanPerform",
            DomainError::PostAlreadyViewed => "PostAlreadyViewed",
            DomainError::RepeatedTopics => "RepeatedTopics",
            DomainError::RepeatedAuthors => "RepeatedAuthors",
            DomainError::CannotRateOwnPost => "CannotRateOwnPost",
            DomainError::InvalidQuiz { .. } => "InvalidQuiz",
            DomainError::FeedNotFound => "FeedNotFound",
            DomainError::NotYourFeed => "NotYourFeed",
            DomainError::FeedTopicsAndAuthors => "FeedTopicsAndAuthors",
            DomainError::ExceededMaxFileSize { .. } => "ExceededMaxFileSize",
            DomainError::InvalidFileType { .. } => "InvalidFileType",
        }
    }
}
