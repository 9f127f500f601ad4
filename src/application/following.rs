//! `am_i_following` annotation for users and topics.

use uuid::Uuid;

use crate::{
    application::{pagination::PageResult, repos::RepoError, storage::DataStorage},
    domain::entities::{Following, TopicStats, UserPublicStats},
};

pub fn anonymous<T>(items: Vec<T>) -> Vec<Following<T>> {
    items
        .into_iter()
        .map(|item| Following {
            item,
            am_i_following: None,
        })
        .collect()
}

pub async fn users(
    storage: &DataStorage,
    users: Vec<UserPublicStats>,
    me: Option<Uuid>,
) -> Result<Vec<Following<UserPublicStats>>, RepoError> {
    let Some(me) = me else {
        return Ok(anonymous(users));
    };
    if users.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = users.iter().map(|user| user.id).collect();
    let split = storage.user_stats().are_followed_by(&ids, me).await?;
    Ok(users
        .into_iter()
        .map(|user| {
            let am_i_following = Some(split.following.contains(&user.id));
            Following {
                item: user,
                am_i_following,
            }
        })
        .collect())
}

pub async fn user(
    storage: &DataStorage,
    user: UserPublicStats,
    me: Option<Uuid>,
) -> Result<Following<UserPublicStats>, RepoError> {
    let Some(me) = me else {
        return Ok(Following {
            item: user,
            am_i_following: None,
        });
    };
    let following = storage.user().is_followed_by_user(user.id, me).await?;
    Ok(Following {
        item: user,
        am_i_following: Some(following),
    })
}

pub async fn user_page(
    storage: &DataStorage,
    mut page: PageResult<UserPublicStats>,
    me: Option<Uuid>,
) -> Result<PageResult<Following<UserPublicStats>>, RepoError> {
    let data = users(storage, std::mem::take(&mut page.data), me).await?;
    Ok(page.with_data(data))
}

pub async fn topics(
    storage: &DataStorage,
    topics: Vec<TopicStats>,
    me: Option<Uuid>,
) -> Result<Vec<Following<TopicStats>>, RepoError> {
    let Some(me) = me else {
        return Ok(anonymous(topics));
    };
    if topics.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = topics.iter().map(|topic| topic.id.clone()).collect();
    let split = storage.topic_stats().are_followed_by(&ids, me).await?;
    Ok(topics
        .into_iter()
        .map(|topic| {
            let am_i_following = Some(split.following.contains(&topic.id));
            Following {
                item: topic,
                am_i_following,
            }
        })
        .collect())
}

pub async fn topic(
    storage: &DataStorage,
    topic: TopicStats,
    me: Option<Uuid>,
) -> Result<Following<TopicStats>, RepoError> {
    let Some(me) = me else {
        return Ok(Following {
            item: topic,
            am_i_following: None,
        });
    };
    let following = storage.topic().is_followed_by_user(&topic.id, me).await?;
    Ok(Following {
        item: topic,
        am_i_following: Some(following),
    })
}

pub async fn topic_page(
    storage: &DataStorage,
    mut page: PageResult<TopicStats>,
    me: Option<Uuid>,
) -> Result<PageResult<Following<TopicStats>>, RepoError> {
    let data = topics(storage, std::mem::take(&mut page.data), me).await?;
    Ok(page.with_data(data))
}
