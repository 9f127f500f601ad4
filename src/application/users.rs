use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        blobs::ImageUpload,
        error::ServiceError,
        following,
        me::MeService,
        pagination::{PageResult, Paging},
        ranking::rerank_topic_page,
        repos::CreateUserParams,
        storage::DataStorage,
        timing::timed,
        validation::{
            Report, char_length, email, parse_optional_uuid, parse_uuid, search_query, topic_id,
            topic_ids,
        },
    },
    domain::{
        constraints::users::NAME_CHARS,
        entities::{Existence, Following, UserPublicStats},
        error::DomainError,
    },
};

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
}

#[derive(Clone)]
pub struct UserService {
    storage: DataStorage,
    me: MeService,
}

impl UserService {
    pub fn new(storage: DataStorage, me: MeService) -> Self {
        Self { storage, me }
    }

    /// Register a user. A picture is uploaded in the same transaction, so a
    /// rejected picture leaves no user behind.
    pub async fn create(
        &self,
        input: CreateUserInput,
        picture: Option<ImageUpload>,
    ) -> Result<Uuid, ServiceError> {
        timed("UserService.create", async {
            let params = CreateUserParams {
                email: input.email.trim().to_string(),
                name: input.name.trim().to_string(),
            };
            Report::new("user")
                .field("email", email(&params.email))
                .field("name", char_length(&params.name, &NAME_CHARS))
                .finish()?;

            let user_id = self
                .storage
                .transaction(|tx| async move {
                    if tx.user().exists_by_username(&params.name).await? {
                        return Err(DomainError::UsernameAlreadyTaken.into());
                    }
                    let user_id = tx.user().create(&params).await?;
                    if let Some(picture) = picture {
                        self.me
                            .within(&tx)
                            .update(&user_id.to_string(), Some(picture), None)
                            .await?;
                    }
                    Ok::<_, ServiceError>(user_id)
                })
                .await?;

            info!(%user_id, "user created");
            Ok(user_id)
        })
        .await
    }

    pub async fn public_by_id(
        &self,
        user: &str,
        me: Option<&str>,
    ) -> Result<Following<UserPublicStats>, ServiceError> {
        timed("UserService.public_by_id", async {
            let user = parse_uuid("userId", user)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let stats = tx
                        .user_stats()
                        .public_by_id(user)
                        .await?
                        .ok_or(DomainError::UserNotFound)?;
                    Ok(following::user(&tx, stats, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn follow(&self, follower: &str, user: &str) -> Result<(), ServiceError> {
        timed("UserService.follow", async {
            let follower = parse_uuid("followerId", follower)?;
            let user = parse_uuid("userId", user)?;
            if follower == user {
                return Err(DomainError::CannotFollowSelf.into());
            }
            self.storage
                .transaction(|tx| async move {
                    ensure_users_exist(&tx, &[follower, user]).await?;
                    if tx.user().is_followed_by_user(user, follower).await? {
                        return Err(DomainError::AlreadyFollowingUser.into());
                    }
                    Ok(tx.user().follow(follower, user).await?)
                })
                .await
        })
        .await
    }

    pub async fn unfollow(&self, follower: &str, user: &str) -> Result<(), ServiceError> {
        timed("UserService.unfollow", async {
            let follower = parse_uuid("followerId", follower)?;
            let user = parse_uuid("userId", user)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_users_exist(&tx, &[follower, user]).await?;
                    if !tx.user().is_followed_by_user(user, follower).await? {
                        return Err(DomainError::NotFollowingUser.into());
                    }
                    Ok(tx.user().unfollow(follower, user).await?)
                })
                .await
        })
        .await
    }

    pub async fn is_followed_by_user(
        &self,
        user: &str,
        follower: &str,
    ) -> Result<bool, ServiceError> {
        timed("UserService.is_followed_by_user", async {
            let user = parse_uuid("userId", user)?;
            let follower = parse_uuid("followerId", follower)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_users_exist(&tx, &[user, follower]).await?;
                    Ok(tx.user().is_followed_by_user(user, follower).await?)
                })
                .await
        })
        .await
    }

    pub async fn followers(
        &self,
        user: &str,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<UserPublicStats>>, ServiceError> {
        timed("UserService.followers", async {
            let user = parse_uuid("userId", user)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    let page = tx.user_stats().followers(user, paging).await?;
                    Ok(following::user_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn follows(
        &self,
        user: &str,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<UserPublicStats>>, ServiceError> {
        timed("UserService.follows", async {
            let user = parse_uuid("userId", user)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, user).await?;
                    let page = tx.user_stats().follows(user, paging).await?;
                    Ok(following::user_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<UserPublicStats>>, ServiceError> {
        timed("UserService.search", async {
            let query = query.map(str::trim);
            search_query("user search", query)?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let page = tx.user_stats().search(query, paging).await?;
                    Ok(following::user_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    /// Authors by score. A topic-scoped ranking is renumbered within the topic.
    pub async fn ranking(
        &self,
        topic: Option<&str>,
        paging: Paging,
        me: Option<&str>,
    ) -> Result<PageResult<Following<UserPublicStats>>, ServiceError> {
        timed("UserService.ranking", async {
            let topic = topic
                .map(|topic| topic_id("topicId", topic))
                .transpose()?;
            let me = parse_optional_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    let mut page = tx.user_stats().ranking(topic.as_deref(), paging).await?;
                    if topic.is_some() {
                        page = rerank_topic_page(page, paging);
                    }
                    Ok(following::user_page(&tx, page, me).await?)
                })
                .await
        })
        .await
    }

    /// Best author of each topic, without repeats.
    pub async fn top_authors_for_topics(
        &self,
        topics: &[String],
        me: &str,
    ) -> Result<Vec<Following<UserPublicStats>>, ServiceError> {
        timed("UserService.top_authors_for_topics", async {
            let topics = topic_ids("topics", topics)?;
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    if let Existence::Missing(missing) = tx.topic().exist(&topics).await? {
                        return Err(DomainError::topics_not_found(&missing).into());
                    }
                    let authors = tx.user_stats().top_author_per_topic(&topics).await?;
                    let mut seen = HashSet::new();
                    let authors: Vec<_> = authors
                        .into_iter()
                        .filter(|author| seen.insert(author.id))
                        .collect();
                    Ok(following::users(&tx, authors, Some(me)).await?)
                })
                .await
        })
        .await
    }
}

pub(crate) async fn ensure_user_exists(tx: &DataStorage, user: Uuid) -> Result<(), ServiceError> {
    match tx.user().exist(&[user]).await? {
        Existence::All => Ok(()),
        Existence::Missing(_) => Err(DomainError::UserNotFound.into()),
    }
}

pub(crate) async fn ensure_users_exist(
    tx: &DataStorage,
    users: &[Uuid],
) -> Result<(), ServiceError> {
    match tx.user().exist(users).await? {
        Existence::All => Ok(()),
        Existence::Missing(missing) => Err(DomainError::users_not_found(&missing).into()),
    }
}
