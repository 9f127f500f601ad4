//! Backend core for a social content-sharing platform.
//!
//! Storage modules sit behind a transactional facade, reads are memoized by a
//! declarative cache layer, and five services orchestrate the domain rules.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
