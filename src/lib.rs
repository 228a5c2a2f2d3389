//! Feed Cache - read-path caches for a photo sharing feed
//!
//! Keeps users, comment counters and image types in memory, loads them at
//! startup, keeps them in step with store writes and joins feed pages with
//! their newest comments.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod images;
pub mod loader;
pub mod models;
pub mod mutators;
pub mod store;

pub use api::AppState;
pub use cache::CacheSet;
pub use config::Config;
pub use error::{FeedError, Result};
pub use loader::{CacheLoader, LoadError, LoadReport};
pub use mutators::WriteThrough;
