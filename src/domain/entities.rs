//! Domain entities mirrored from persistent storage.
//!
//! Every entity round-trips through JSON because storage results may be kept
//! in the shared cache.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{quiz::Quiz, types::Difficulty, types::PageKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostStats {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_at: OffsetDateTime,
    pub author: AuthorSummary,
    pub topics: Vec<String>,
    pub ranking_position: i64,
    pub avg_rating: f64,
    pub rates_count: i64,
    pub views_count: i64,
    pub score: f64,
}

/// What a given user has done with a single post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostViewerState {
    pub post_id: Uuid,
    pub i_read: bool,
    pub i_saved: bool,
    pub i_rated: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMyInfo {
    #[serde(flatten)]
    pub post: PostStats,
    pub i_read: Option<bool>,
    pub i_saved: Option<bool>,
    pub i_rated: Option<i32>,
}

impl PostMyInfo {
    pub fn anonymous(post: PostStats) -> Self {
        Self {
            post,
            i_read: None,
            i_saved: None,
            i_rated: None,
        }
    }

    pub fn for_viewer(post: PostStats, state: PostViewerState) -> Self {
        Self {
            post,
            i_read: Some(state.i_read),
            i_saved: Some(state.i_saved),
            i_rated: state.i_rated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPublicStats {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub avg_post_rating: f64,
    pub followers_count: i64,
    pub ranking_position: Option<i64>,
    pub posts_published: i64,
    pub topics_user_publishes_on: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPrivateStats {
    #[serde(flatten)]
    pub public: UserPublicStats,
    pub email: String,
    pub name_updated_at: Option<OffsetDateTime>,
    pub image_updated_at: Option<OffsetDateTime>,
    pub signup_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub id: String,
    pub posts_count: i64,
    pub followers_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub position: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUpdate {
    pub feed: FeedRecord,
    pub topics: Vec<String>,
    pub authors: Vec<Uuid>,
}

/// Topics and authors a feed draws its posts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSources {
    pub topics: Vec<String>,
    pub authors: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

/// An entity annotated with whether the requesting user follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Following<T> {
    #[serde(flatten)]
    pub item: T,
    pub am_i_following: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowSplit<T> {
    pub following: Vec<T>,
    pub not_following: Vec<T>,
}

/// Result of checking that a batch of ids all exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Existence<T> {
    All,
    Missing(Vec<T>),
}

impl<T> Existence<T> {
    /// Build from the requested ids and the ids that were actually found.
    pub fn from_found(requested: &[T], found: &[T]) -> Self
    where
        T: Clone + PartialEq,
    {
        let missing: Vec<T> = requested
            .iter()
            .filter(|id| !found.contains(id))
            .cloned()
            .collect();
        if missing.is_empty() {
            Existence::All
        } else {
            Existence::Missing(missing)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageDescriptor {
    Remote {
        kind: PageKind,
        #[serde(rename = "remoteUrl")]
        remote_url: String,
    },
    Quiz {
        quiz: Quiz,
    },
}

impl PageDescriptor {
    pub fn kind(&self) -> PageKind {
        match self {
            PageDescriptor::Remote { kind, .. } => *kind,
            PageDescriptor::Quiz { .. } => PageKind::Quiz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_reports_missing_ids_in_request_order() {
        let requested = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = vec!["b".to_string()];
        assert_eq!(
            Existence::from_found(&requested, &found),
            Existence::Missing(vec!["a".to_string(), "c".to_string()])
        );
        assert_eq!(Existence::from_found(&requested, &requested), Existence::All);
    }
}
