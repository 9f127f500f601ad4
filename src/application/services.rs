use std::sync::Arc;

use crate::application::{
    blobs::BlobStore, feeds::FeedService, me::MeService, posts::PostService,
    storage::DataStorage, topics::TopicService, users::UserService,
};

/// Every service, sharing one storage facade and blob store.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub posts: PostService,
    pub topics: TopicService,
    pub feeds: FeedService,
    pub me: MeService,
}

impl Services {
    pub fn new(storage: DataStorage, blobs: Arc<dyn BlobStore>) -> Self {
        let me = MeService::new(storage.clone(), Arc::clone(&blobs));
        Self {
            users: UserService::new(storage.clone(), me.clone()),
            posts: PostService::new(storage.clone(), blobs),
            topics: TopicService::new(storage.clone()),
            feeds: FeedService::new(storage),
            me,
        }
    }
}
