//! Cache policy table: which reads are cached and which writes evict them.
//!
//! An argument mask selects the arguments that form the cache key. A trigger's
//! mask selects, from the trigger call's own arguments, the values that rebuild
//! the target's key, so both masks must pick arguments in the same order.

use super::catalog::{Operation, feed, me, post, post_stats, topic, topic_stats, user, user_stats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub operation: Operation,
    pub arg_mask: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    pub operation: Operation,
    pub arg_mask: Vec<bool>,
    pub ttl_secs: u64,
    pub invalidated_by: Vec<Trigger>,
}

fn trigger(operation: Operation, arg_mask: &[bool]) -> Trigger {
    Trigger {
        operation,
        arg_mask: arg_mask.to_vec(),
    }
}

const T: bool = true;
const F: bool = false;

pub fn default_table() -> Vec<PolicyRecord> {
    vec![
        PolicyRecord {
            operation: post_stats::BY_ID,
            arg_mask: vec![T],
            ttl_secs: 3600,
            invalidated_by: vec![
                trigger(post::DELETE, &[T]),
                trigger(post::VIEW, &[T]),
                trigger(post::RATE, &[T]),
            ],
        },
        PolicyRecord {
            operation: topic_stats::BY_ID,
            arg_mask: vec![T],
            ttl_secs: 1800,
            invalidated_by: vec![trigger(topic::FOLLOW, &[T]), trigger(topic::UNFOLLOW, &[T])],
        },
        PolicyRecord {
            operation: feed::BY_ID,
            arg_mask: vec![T],
            ttl_secs: 1800,
            invalidated_by: vec![
                trigger(feed::DELETE, &[T]),
                trigger(feed::UPDATE, &[T]),
                trigger(feed::SET_POSITION, &[T]),
            ],
        },
        PolicyRecord {
            operation: user_stats::PUBLIC_BY_ID,
            arg_mask: vec![T],
            ttl_secs: 3600,
            invalidated_by: vec![
                trigger(me::DELETE, &[T]),
                trigger(me::UPDATE_NAME, &[T, F]),
                trigger(me::UPDATE_PROFILE_PICTURE, &[T, F]),
                trigger(user::FOLLOW, &[F, T]),
                trigger(user::UNFOLLOW, &[F, T]),
            ],
        },
        PolicyRecord {
            operation: user_stats::PRIVATE_BY_ID,
            arg_mask: vec![T],
            ttl_secs: 3600,
            invalidated_by: vec![
                trigger(me::DELETE, &[T]),
                trigger(me::UPDATE_NAME, &[T, F]),
                trigger(me::UPDATE_PROFILE_PICTURE, &[T, F]),
                trigger(me::COMPLETE_SIGN_UP, &[T]),
            ],
        },
        PolicyRecord {
            operation: user_stats::RANKING,
            arg_mask: vec![T, T],
            ttl_secs: 120,
            invalidated_by: Vec::new(),
        },
    ]
}
