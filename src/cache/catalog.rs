//! Every storage operation the cache layer can intercept.
//!
//! Parameter lists mirror the argument order of the storage traits in
//! `application::repos`; policy masks are checked against their length.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    User,
    Post,
    PostStats,
    UserStats,
    Topic,
    TopicStats,
    Feed,
    Me,
    Auth,
}

impl Module {
    pub fn as_str(self) -> &'static str {
        match self {
            Module::User => "user",
            Module::Post => "post",
            Module::PostStats => "postStats",
            Module::UserStats => "userStats",
            Module::Topic => "topic",
            Module::TopicStats => "topicStats",
            Module::Feed => "feed",
            Module::Me => "me",
            Module::Auth => "auth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub module: Module,
    pub name: &'static str,
    pub params: &'static [&'static str],
}

impl Operation {
    pub const fn new(module: Module, name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            module,
            name,
            params,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Identity used for lookups: module and name, ignoring parameters.
    pub fn id(&self) -> (Module, &'static str) {
        (self.module, self.name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module.as_str(), self.name)
    }
}

pub mod user {
    use super::{Module::User, Operation};

    pub const CREATE: Operation = Operation::new(User, "create", &["params"]);
    pub const IS_FOLLOWED_BY_USER: Operation =
        Operation::new(User, "isFollowedByUser", &["userId", "followerId"]);
    pub const FOLLOW: Operation = Operation::new(User, "follow", &["followerId", "userId"]);
    pub const UNFOLLOW: Operation = Operation::new(User, "unfollow", &["followerId", "userId"]);
    pub const EXISTS_BY_USERNAME: Operation = Operation::new(User, "existsByUsername", &["name"]);
    pub const EXIST: Operation = Operation::new(User, "exist", &["userIds"]);
    pub const FOLLOWED_AUTHORS: Operation =
        Operation::new(User, "followedAuthors", &["followerId"]);
}

pub mod post {
    use super::{Module::Post, Operation};

    pub const CREATE: Operation = Operation::new(Post, "create", &["params"]);
    pub const DELETE: Operation = Operation::new(Post, "delete", &["postId"]);
    pub const RATE: Operation = Operation::new(Post, "rate", &["postId", "userId", "rating"]);
    pub const VIEW: Operation = Operation::new(Post, "view", &["postId", "userId"]);
    pub const HAS_VIEWED: Operation = Operation::new(Post, "hasViewed", &["postId", "userId"]);
    pub const EXISTS: Operation = Operation::new(Post, "exists", &["postId"]);
}

pub mod post_stats {
    use super::{Module::PostStats, Operation};

    pub const BY_ID: Operation = Operation::new(PostStats, "byId", &["postId"]);
    pub const SEARCH: Operation =
        Operation::new(PostStats, "search", &["query", "paging", "filter"]);
    pub const TRENDING: Operation = Operation::new(PostStats, "trending", &["window", "topics"]);
    pub const PUBLISHED_BY_USER: Operation =
        Operation::new(PostStats, "publishedByUser", &["userId", "paging"]);
    pub const SAVED_BY_USER: Operation =
        Operation::new(PostStats, "savedByUser", &["userId", "paging"]);
    pub const VIEWER_STATE: Operation =
        Operation::new(PostStats, "viewerState", &["postId", "userId"]);
    pub const MATCHING: Operation = Operation::new(PostStats, "matching", &["query"]);
}

pub mod user_stats {
    use super::{Module::UserStats, Operation};

    pub const PUBLIC_BY_ID: Operation = Operation::new(UserStats, "publicById", &["userId"]);
    pub const PRIVATE_BY_ID: Operation = Operation::new(UserStats, "privateById", &["userId"]);
    pub const FOLLOWERS: Operation = Operation::new(UserStats, "followers", &["userId", "paging"]);
    pub const FOLLOWS: Operation = Operation::new(UserStats, "follows", &["userId", "paging"]);
    pub const RANKING: Operation = Operation::new(UserStats, "ranking", &["topicId", "paging"]);
    pub const SEARCH: Operation = Operation::new(UserStats, "search", &["query", "paging"]);
    pub const ARE_FOLLOWED_BY: Operation =
        Operation::new(UserStats, "areFollowedBy", &["userIds", "followerId"]);
    pub const TOP_AUTHOR_PER_TOPIC: Operation =
        Operation::new(UserStats, "topAuthorPerTopic", &["topicIds"]);
}

pub mod topic {
    use super::{Module::Topic, Operation};

    pub const FOLLOW: Operation = Operation::new(Topic, "follow", &["topicId", "followerId"]);
    pub const UNFOLLOW: Operation = Operation::new(Topic, "unfollow", &["topicId", "followerId"]);
    pub const IS_FOLLOWED_BY_USER: Operation =
        Operation::new(Topic, "isFollowedByUser", &["topicId", "userId"]);
    pub const EXIST: Operation = Operation::new(Topic, "exist", &["topicIds"]);
    pub const FOLLOWED_TOPICS: Operation = Operation::new(Topic, "followedTopics", &["userId"]);
}

pub mod topic_stats {
    use super::{Module::TopicStats, Operation};

    pub const SEARCH: Operation = Operation::new(TopicStats, "search", &["query", "paging"]);
    pub const BY_ID: Operation = Operation::new(TopicStats, "byId", &["topicId"]);
    pub const FOLLOWED_BY_USER: Operation =
        Operation::new(TopicStats, "followedByUser", &["userId", "paging"]);
    pub const ARE_FOLLOWED_BY: Operation =
        Operation::new(TopicStats, "areFollowedBy", &["topicIds", "userId"]);
    pub const RANDOM: Operation = Operation::new(TopicStats, "random", &["count"]);
}

pub mod feed {
    use super::{Module::Feed, Operation};

    pub const BY_ID: Operation = Operation::new(Feed, "byId", &["feedId"]);
    pub const CREATE: Operation = Operation::new(Feed, "create", &["params"]);
    pub const DELETE: Operation = Operation::new(Feed, "delete", &["feedId"]);
    pub const UPDATE: Operation = Operation::new(Feed, "update", &["feedId", "params"]);
    pub const MAX_POSITION: Operation = Operation::new(Feed, "maxPosition", &["ownerId"]);
    pub const POSITION: Operation = Operation::new(Feed, "position", &["feedId"]);
    pub const SET_POSITION: Operation =
        Operation::new(Feed, "setPosition", &["feedId", "position"]);
    pub const AUTHORS: Operation = Operation::new(Feed, "authors", &["feedId"]);
    pub const TOPICS: Operation = Operation::new(Feed, "topics", &["feedId"]);
    pub const BY_OWNER: Operation = Operation::new(Feed, "byOwner", &["ownerId"]);
    pub const SOURCES: Operation = Operation::new(Feed, "sources", &["feedId"]);
}

pub mod me {
    use super::{Module::Me, Operation};

    pub const DELETE: Operation = Operation::new(Me, "delete", &["userId"]);
    pub const UPDATE_NAME: Operation = Operation::new(Me, "updateName", &["userId", "name"]);
    pub const UPDATE_PROFILE_PICTURE: Operation =
        Operation::new(Me, "updateProfilePicture", &["userId", "imageUrl"]);
    pub const HAS_COMPLETED_SIGN_UP: Operation =
        Operation::new(Me, "hasCompletedSignUp", &["userId"]);
    pub const COMPLETE_SIGN_UP: Operation = Operation::new(Me, "completeSignUp", &["userId"]);
    pub const EXISTS_IN_SAVED_POSTS: Operation =
        Operation::new(Me, "existsInSavedPosts", &["userId", "postId"]);
    pub const ADD_TO_SAVED_POSTS: Operation =
        Operation::new(Me, "addToSavedPosts", &["userId", "postId"]);
    pub const DELETE_FROM_SAVED_POSTS: Operation =
        Operation::new(Me, "deleteFromSavedPosts", &["userId", "postId"]);
}

pub mod auth {
    use super::{Module::Auth, Operation};

    pub const CREATE_SESSION: Operation = Operation::new(Auth, "createSession", &["userId"]);
    pub const DELETE_SESSION: Operation = Operation::new(Auth, "deleteSession", &["sessionId"]);
}

pub const CATALOG: &[Operation] = &[
    user::CREATE,
    user::IS_FOLLOWED_BY_USER,
    user::FOLLOW,
    user::UNFOLLOW,
    user::EXISTS_BY_USERNAME,
    user::EXIST,
    user::FOLLOWED_AUTHORS,
    post::CREATE,
    post::DELETE,
    post::RATE,
    post::VIEW,
    post::HAS_VIEWED,
    post::EXISTS,
    post_stats::BY_ID,
    post_stats::SEARCH,
    post_stats::TRENDING,
    post_stats::PUBLISHED_BY_USER,
    post_stats::SAVED_BY_USER,
    post_stats::VIEWER_STATE,
    post_stats::MATCHING,
    user_stats::PUBLIC_BY_ID,
    user_stats::PRIVATE_BY_ID,
    user_stats::FOLLOWERS,
    user_stats::FOLLOWS,
    user_stats::RANKING,
    user_stats::SEARCH,
    user_stats::ARE_FOLLOWED_BY,
    user_stats::TOP_AUTHOR_PER_TOPIC,
    topic::FOLLOW,
    topic::UNFOLLOW,
    topic::IS_FOLLOWED_BY_USER,
    topic::EXIST,
    topic::FOLLOWED_TOPICS,
    topic_stats::SEARCH,
    topic_stats::BY_ID,
    topic_stats::FOLLOWED_BY_USER,
    topic_stats::ARE_FOLLOWED_BY,
    topic_stats::RANDOM,
    feed::BY_ID,
    feed::CREATE,
    feed::DELETE,
    feed::UPDATE,
    feed::MAX_POSITION,
    feed::POSITION,
    feed::SET_POSITION,
    feed::AUTHORS,
    feed::TOPICS,
    feed::BY_OWNER,
    feed::SOURCES,
    me::DELETE,
    me::UPDATE_NAME,
    me::UPDATE_PROFILE_PICTURE,
    me::HAS_COMPLETED_SIGN_UP,
    me::COMPLETE_SIGN_UP,
    me::EXISTS_IN_SAVED_POSTS,
    me::ADD_TO_SAVED_POSTS,
    me::DELETE_FROM_SAVED_POSTS,
    auth::CREATE_SESSION,
    auth::DELETE_SESSION,
];
