//! Cache Module
//!
//! In-memory mirrors of user records, comment counts and post image types.
//! Nothing here evicts; capacity grows with the number of users and posts.

mod map;
mod set;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use map::EntityMap;
pub use set::{
    AuthorCommentCache, CacheSet, CacheSetStats, PostCommentCache, PostMimeCache, UserCache,
};
pub use stats::{CacheStats, StatsCounter};
