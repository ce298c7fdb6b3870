use std::future::{Future, ready};
use std::time::Duration;

use moka::future::Cache;
use tokio_util::sync::CancellationToken;

/// Which list a generation belongs to; one live query per user and scope.
pub type GenerationKey = (u64, &'static str);

/// Tracks the newest query per (user, scope). Starting a new one cancels
/// the previous token so a slow, superseded response is dropped instead of
/// overwriting newer results.
#[derive(Clone)]
pub struct QueryGenerations {
    live: Cache<GenerationKey, CancellationToken>,
}

impl Default for QueryGenerations {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryGenerations {
    pub fn new() -> Self {
        Self {
            live: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(600))
                .build(),
        }
    }

    /// Opens a new generation and cancels the one it replaces. The swap
    /// holds the key lock, so concurrent starts leave exactly one live token.
    pub async fn begin(&self, key: GenerationKey) -> CancellationToken {
        let token = CancellationToken::new();
        let fresh = token.clone();
        self.live
            .entry(key)
            .and_upsert_with(|previous| {
                if let Some(previous) = previous {
                    previous.into_value().cancel();
                }
                ready(fresh)
            })
            .await;
        token
    }

    /// Runs the query unless a newer generation for the same key starts
    /// first. `None` means superseded.
    pub async fn run<F, T>(&self, key: GenerationKey, query: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let token = self.begin(key).await;
        tokio::select! {
            _ = token.cancelled() => None,
            result = query => Some(result),
        }
    }
}
