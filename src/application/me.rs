use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        blobs::{BlobStore, ImageUpload},
        error::ServiceError,
        pagination::{PageResult, Paging},
        storage::DataStorage,
        timing::timed,
        users::ensure_user_exists,
        validation::{Report, char_length, parse_uuid},
    },
    domain::{
        constraints::users::{IMAGE_COOLDOWN, MAX_PICTURE_BYTES, NAME_CHARS, NAME_COOLDOWN},
        entities::{PostStats, UserPrivateStats},
        error::DomainError,
    },
};

/// Operations a user performs on their own account.
#[derive(Clone)]
pub struct MeService {
    storage: DataStorage,
    blobs: Arc<dyn BlobStore>,
}

impl MeService {
    pub fn new(storage: DataStorage, blobs: Arc<dyn BlobStore>) -> Self {
        Self { storage, blobs }
    }

    /// A copy bound to `storage`, used to join a caller's transaction.
    pub fn within(&self, storage: &DataStorage) -> Self {
        Self {
            storage: storage.clone(),
            blobs: Arc::clone(&self.blobs),
        }
    }

    pub async fn get(&self, me: &str) -> Result<UserPrivateStats, ServiceError> {
        timed("MeService.get", async {
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    tx.user_stats()
                        .private_by_id(me)
                        .await?
                        .ok_or_else(|| DomainError::UserNotFound.into())
                })
                .await
        })
        .await
    }

    pub async fn delete(&self, me: &str) -> Result<Uuid, ServiceError> {
        timed("MeService.delete", async {
            let me = parse_uuid("me", me)?;
            let deleted = self
                .storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, me).await?;
                    Ok::<_, ServiceError>(tx.me().delete(me).await?)
                })
                .await?;
            info!(user_id = %deleted, "account deleted");
            Ok(deleted)
        })
        .await
    }

    pub async fn has_completed_signup(&self, me: &str) -> Result<bool, ServiceError> {
        timed("MeService.has_completed_signup", async {
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, me).await?;
                    Ok(tx.me().has_completed_signup(me).await?)
                })
                .await
        })
        .await
    }

    pub async fn complete_signup(&self, me: &str) -> Result<(), ServiceError> {
        timed("MeService.complete_signup", async {
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, me).await?;
                    Ok(tx.me().complete_signup(me).await?)
                })
                .await
        })
        .await
    }

    /// Change the profile picture and/or the name, each subject to its cooldown.
    pub async fn update(
        &self,
        me: &str,
        image: Option<ImageUpload>,
        name: Option<String>,
    ) -> Result<(), ServiceError> {
        timed("MeService.update", async {
            let mut report = Report::new("profile update");
            let me = report.uuid("me", me);
            if let Some(name) = name.as_deref() {
                report.field("name", char_length(name.trim(), &NAME_CHARS));
            }
            let me = report.finish_with(me)?;
            let name = name.map(|name| name.trim().to_string());

            self.storage
                .transaction(|tx| async move {
                    let profile = tx
                        .user_stats()
                        .private_by_id(me)
                        .await?
                        .ok_or(DomainError::UserNotFound)?;
                    let now = OffsetDateTime::now_utc();

                    if let Some(image) = image {
                        if within_cooldown(profile.image_updated_at, IMAGE_COOLDOWN, now) {
                            return Err(DomainError::UserUpdateImageConstraint.into());
                        }
                        if image.size() > MAX_PICTURE_BYTES {
                            return Err(DomainError::LargeImageSize.into());
                        }
                        let url = self.blobs.upload_profile_picture(me, &image).await?;
                        tx.me().update_profile_picture(me, &url).await?;
                    }

                    if let Some(name) = name {
                        if within_cooldown(profile.name_updated_at, NAME_COOLDOWN, now) {
                            return Err(DomainError::UserUpdateNameConstraint.into());
                        }
                        if name != profile.public.name
                            && tx.user().exists_by_username(&name).await?
                        {
                            return Err(DomainError::UsernameAlreadyTaken.into());
                        }
                        tx.me().update_name(me, &name).await?;
                    }

                    Ok(())
                })
                .await
        })
        .await
    }

    pub async fn saved_posts(
        &self,
        me: &str,
        paging: Paging,
    ) -> Result<PageResult<PostStats>, ServiceError> {
        timed("MeService.saved_posts", async {
            let me = parse_uuid("me", me)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_user_exists(&tx, me).await?;
                    Ok(tx.post_stats().saved_by_user(me, paging).await?)
                })
                .await
        })
        .await
    }

    /// Saving an already saved post is a no-op.
    pub async fn add_to_saved_posts(&self, me: &str, post: &str) -> Result<(), ServiceError> {
        timed("MeService.add_to_saved_posts", async {
            let me = parse_uuid("me", me)?;
            let post = parse_uuid("postId", post)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_saved_post_parties(&tx, me, post).await?;
                    if !tx.me().exists_in_saved_posts(me, post).await? {
                        tx.me().add_to_saved_posts(me, post).await?;
                    }
                    Ok(())
                })
                .await
        })
        .await
    }

    /// Removing a post that is not saved is a no-op.
    pub async fn delete_from_saved_posts(&self, me: &str, post: &str) -> Result<(), ServiceError> {
        timed("MeService.delete_from_saved_posts", async {
            let me = parse_uuid("me", me)?;
            let post = parse_uuid("postId", post)?;
            self.storage
                .transaction(|tx| async move {
                    ensure_saved_post_parties(&tx, me, post).await?;
                    if tx.me().exists_in_saved_posts(me, post).await? {
                        tx.me().delete_from_saved_posts(me, post).await?;
                    }
                    Ok(())
                })
                .await
        })
        .await
    }
}

async fn ensure_saved_post_parties(
    tx: &DataStorage,
    me: Uuid,
    post: Uuid,
) -> Result<(), ServiceError> {
    ensure_user_exists(tx, me).await?;
    if !tx.post().exists(post).await? {
        return Err(DomainError::PostNotFound.into());
    }
    Ok(())
}

fn within_cooldown(
    last_update: Option<OffsetDateTime>,
    cooldown: time::Duration,
    now: OffsetDateTime,
) -> bool {
    last_update.is_some_and(|updated_at| now - updated_at < cooldown)
}
