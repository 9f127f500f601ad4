use crate::{
    application::{
        error::ServiceError,
        following,
        pagination::{PageResult, Paging},
        ranking::rerank_topic_page,
        storage::DataStorage,
        timing::timed,
        users::ensure_user_exists,
        validation::{parse_optional_uuid, parse_uuid, search_query, topic_id},
    },
    domain::{
        constraints::topics::{RANDOM_SAMPLE, TOP_AUTHORS},
        entities::{Following, TopicStats, UserPublicStats},
        error::DomainError,
    },
};

#[derive(Clone)]
pub struct TopicService {
    storage: DataStorage,
}

impl TopicService {
    pub fn new(storage: DataStorage) -> Self {
        Self { storage }
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<TopicStats>>, ServiceError> {
        timed("TopicService.search", async {
            let query = query.map(str::trim);
            search_query("topic search", query)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let page = tx.topic_stats().search(query, paging).await?;
                    Ok(following::topic_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn by_id(
        &self,
        topic: &str,
        me: Option<&str>,
    ) -> Result<Following<TopicStats>, ServiceError> {
        timed("TopicService.by_id", async {
            let topic = topic_id("topicId", topic)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let stats = tx
                        .topic_stats()
                        .by_id(&topic)
                        .await?
                        .ok_or(DomainError::TopicNotFound)?;
                    Ok(following::topic(&tx, stats, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn follow(&self, topic: &str, follower: &str) -> Result<(), ServiceError> {
        timed("TopicService.follow", async {
            let topic = topic_id("topicId", topic)?;
            let follower = parse_uuid("followerId", follower)?;
            self.storage
                .transaction(|tx| async move {
                    if tx.topic_stats().by_id(&topic).await?.is_none() {
                        return Err(DomainError::TopicNotFound.into());
                    }
                    ensure_user_exists(&tx, follower).await?;
                    if tx.topic().is_followed_by_user(&topic, follower).await? {
                        return Err(DomainError::AlreadyFollowingTopics.into());
                    }
                    Ok(tx.topic().follow(&topic, follower).await?)
                })
                .await
        })
        .await
    }

    pub async fn unfollow(&self, topic: &str, follower: &str) -> Result<(), ServiceError> {
        timed("TopicService.unfollow", async {
            let topic = topic_id("topicId", topic)?;
            let follower = parse_uuid("followerId", follower)?;
            self.storage
                .transaction(|tx| async move {
                    if !tx.topic().is_followed_by_user(&topic, follower).await? {
                        return Err(DomainError::NotFollowingTopic.into());
                    }
                    Ok(tx.topic().unfollow(&topic, follower).await?)
                })
                .await
        })
        .await
    }

    /// Highest scored authors publishing on `topic`, ranked within it.
    pub async fn top_authors(
        &self,
        topic: &str,
        me: Option<&str>,
    ) -> Result<Vec<Following<UserPublicStats>>, ServiceError> {
        timed("TopicService.top_authors", async {
            let topic = topic_id("topicId", topic)?;
            let me = parse_optional_uuid("me", me)?;
            let paging = Paging::first(TOP_AUTHORS);
            self.storage
                .transaction(|tx| async move {
                    let page = tx.user_stats().ranking(Some(&topic), paging).await?;
                    let page = rerank_topic_page(page, paging);
                    Ok(following::users(&tx, page.data, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn followed_by_user(
        &self,
        user: &str,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<TopicStats>>, ServiceError> {
        timed("TopicService.followed_by_user", async {
            let user = parse_uuid("userId", user)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    let page = tx.topic_stats().followed_by_user(user, paging).await?;
                    Ok(following::topic_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn random(&self, me: &str) -> Result<Vec<Following<TopicStats>>, ServiceError> {
        timed("TopicService.random", async {
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let topics = tx.topic_stats().random(RANDOM_SAMPLE).await?;
                    Ok(following::topics(&tx, topics, Some(me)).await?)
                })
                .await
        })
        .await
    }
}
