//! Ranking renumbering and feed composition.

use rand::{Rng, seq::SliceRandom};
use uuid::Uuid;

use crate::{
    application::{
        pagination::{PageResult, Paging},
        repos::PostMatchQuery,
    },
    domain::{
        constraints::posts::FEED_SIZE,
        entities::{FeedSources, UserPublicStats},
    },
};

/// Renumber a topic-scoped ranking page so positions are relative to the topic.
pub fn rerank_topic_page(
    mut page: PageResult<UserPublicStats>,
    paging: Paging,
) -> PageResult<UserPublicStats> {
    let offset = paging.limit() * (page.current_page - 1);
    for (idx, user) in page.data.iter_mut().enumerate() {
        user.ranking_position = Some(offset + idx as i64 + 1);
    }
    page
}

/// Posts for a user's home feed: everything by followed authors or on followed
/// topics that the user has not seen or written. Without any follows every post
/// qualifies.
pub fn home_query(user_id: Uuid, authors: Vec<Uuid>, topics: Vec<String>) -> PostMatchQuery {
    let match_all = authors.is_empty() && topics.is_empty();
    PostMatchQuery {
        topics,
        authors,
        match_all,
        unseen_by: Some(user_id),
        exclude_author: Some(user_id),
        limit: FEED_SIZE,
    }
}

/// Posts for a custom feed, unseen by the viewer when there is one.
pub fn feed_query(sources: FeedSources, viewer: Option<Uuid>) -> PostMatchQuery {
    PostMatchQuery {
        topics: sources.topics,
        authors: sources.authors,
        match_all: false,
        unseen_by: viewer,
        exclude_author: None,
        limit: FEED_SIZE,
    }
}

pub fn shuffle<T>(items: &mut [T], rng: &mut impl Rng) {
    items.shuffle(rng);
}
