// src/watch/mod.rs

//! File watching: glob patterns, the path -> target subscription table,
//! debounced per-target rebuild workers and the `notify` bridge.

pub mod path_utils;
pub mod patterns;
pub mod subscriber;
pub mod subscriptions;
pub mod watcher;

pub use patterns::{MatchedFile, PatternSet, WalkFilter};
pub use subscriber::{Rebuild, RebuildNotice, RebuildOutcome, WatchSubscriber};
pub use subscriptions::{SubscriptionDelta, SubscriptionTable, WatchTarget};
pub use watcher::{WatcherHandle, spawn_watcher};
