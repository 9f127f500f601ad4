//! Application services layer: storage contracts, the transactional facade and
//! the domain services built on top of it.

pub mod blobs;
pub mod error;
pub mod feeds;
pub mod following;
pub mod me;
pub mod pagination;
pub mod posts;
pub mod ranking;
pub mod repos;
pub mod services;
pub mod storage;
pub mod timing;
pub mod topics;
pub mod users;
pub mod validation;
