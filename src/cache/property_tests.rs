//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache set and page aggregation against
//! arbitrary sequences of writes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::aggregate::{aggregate_posts, RECENT_COMMENT_LIMIT};
use crate::cache::CacheSet;
use crate::models::{Authority, CommentId, ImageMime, PostId, PostRow, User, UserId};
use crate::store::{BackingStore, MemoryStore, Seed, SeedComment, SeedPost};

// == Strategies ==
fn mime_strategy() -> impl Strategy<Value = ImageMime> {
    prop_oneof![
        Just(ImageMime::Jpeg),
        Just(ImageMime::Png),
        Just(ImageMime::Gif),
        Just(ImageMime::Unspecified),
    ]
}

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
}

fn user(id: i64) -> User {
    User {
        id: UserId(id),
        account_name: format!("user{}", id),
        passhash: String::new(),
        authority: Authority::Ordinary,
        banned: false,
        created_at: at(0),
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Sequential comment writes leave each counter equal to the number of
    // comments that touched it.
    #[test]
    fn prop_counters_match_comment_writes(
        comments in prop::collection::vec((0i64..5, 0i64..5), 0..60)
    ) {
        let caches = CacheSet::new();
        for id in 0..5 {
            caches.seed_post(PostId(id), 0, ImageMime::Png);
            caches.author_comments.set(UserId(id), 0);
        }

        let mut per_post: HashMap<i64, u64> = HashMap::new();
        let mut per_author: HashMap<i64, u64> = HashMap::new();
        for (post, author) in &comments {
            caches.increment_post_comments(PostId(*post)).unwrap();
            caches.increment_author_comments(UserId(*author)).unwrap();
            *per_post.entry(*post).or_default() += 1;
            *per_author.entry(*author).or_default() += 1;
        }

        for id in 0..5 {
            prop_assert_eq!(
                caches.post_comment_count(PostId(id)).unwrap(),
                per_post.get(&id).copied().unwrap_or(0)
            );
            prop_assert_eq!(
                caches.author_comment_count(UserId(id)).unwrap(),
                per_author.get(&id).copied().unwrap_or(0)
            );
        }
    }

    // The first image type written for a post is the one that sticks.
    #[test]
    fn prop_mime_is_written_once(
        first in mime_strategy(),
        later in prop::collection::vec(mime_strategy(), 0..8)
    ) {
        let caches = CacheSet::new();
        caches.seed_post(PostId(1), 0, first);
        for mime in later {
            caches.seed_post(PostId(1), 0, mime);
        }
        prop_assert_eq!(caches.post_mime(PostId(1)).unwrap(), first);
    }

    // Banning touches exactly the requested users.
    #[test]
    fn prop_ban_flips_only_targets(
        targets in prop::collection::hash_set(1i64..=20, 0..20)
    ) {
        let caches = CacheSet::new();
        for id in 1..=20 {
            caches.put_user(user(id));
        }

        for id in &targets {
            caches.mark_banned(UserId(*id)).unwrap();
        }

        for id in 1..=20 {
            let cached = caches.user(UserId(id)).unwrap();
            prop_assert_eq!(cached.banned, targets.contains(&id));
            prop_assert_eq!(&cached.account_name, &format!("user{}", id));
        }
    }

    // Aggregation keeps the page order and shows at most three comments per
    // post, the newest ones, oldest first.
    #[test]
    fn prop_aggregation_preserves_page(
        comment_counts in prop::collection::vec(0usize..7, 0..8)
    ) {
        let mut seed = Seed {
            users: vec![user(1), user(2)],
            ..Seed::default()
        };
        let mut next_comment = 0;
        for (i, count) in comment_counts.iter().enumerate() {
            let post_id = PostId(i as i64 + 1);
            seed.posts.push(SeedPost {
                id: post_id,
                user_id: UserId(1),
                body: String::new(),
                mime: ImageMime::Jpeg,
                image: None,
                created_at: at(i as i64),
            });
            for _ in 0..*count {
                next_comment += 1;
                seed.comments.push(SeedComment {
                    id: CommentId(next_comment),
                    post_id,
                    user_id: UserId(2),
                    comment: format!("c{}", next_comment),
                    created_at: at(100 + next_comment),
                });
            }
        }
        let store = MemoryStore::from_seed(seed).unwrap();

        let caches = CacheSet::new();
        caches.put_user(user(1));
        caches.put_user(user(2));
        for (i, count) in comment_counts.iter().enumerate() {
            caches.seed_post(PostId(i as i64 + 1), *count as u64, ImageMime::Jpeg);
        }

        // Deliberately not chronological.
        let rows: Vec<PostRow> = block_on(async {
            let mut rows = Vec::new();
            for i in (0..comment_counts.len()).rev() {
                rows.push(store.post_by_id(PostId(i as i64 + 1)).await.unwrap().unwrap());
            }
            rows
        });
        let expected_ids: Vec<PostId> = rows.iter().map(|r| r.id).collect();

        let views = block_on(aggregate_posts(&store, &caches, rows, "t")).unwrap();

        let ids: Vec<PostId> = views.iter().map(|v| v.id).collect();
        prop_assert_eq!(ids, expected_ids);

        for view in &views {
            let total = comment_counts[(view.id.0 - 1) as usize];
            prop_assert_eq!(view.comment_count, total as u64);
            prop_assert_eq!(view.comments.len(), total.min(RECENT_COMMENT_LIMIT));

            let shown: Vec<i64> = view.comments.iter().map(|c| c.id.0).collect();
            let mut sorted = shown.clone();
            sorted.sort();
            prop_assert_eq!(&shown, &sorted);

            let distinct: HashSet<i64> = shown.iter().copied().collect();
            prop_assert_eq!(distinct.len(), shown.len());
        }
    }
}
