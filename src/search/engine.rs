//! Fan-out search driver.
//!
//! ## Flow
//! 1. One supervisor task per shard waits for a semaphore permit.
//! 2. With a permit it runs the shard callback (panic-isolated) and sends the
//!    outcome over an unbounded channel.
//! 3. The caller merges successes into a [`TopK`] heap. The first failure, or
//!    cancellation of the caller's token, cancels every outstanding shard; the
//!    call returns once all supervisors have reported back.

use super::heap::TopK;
use super::types::SearchResult;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::guard::spawn_guarded;
use crate::ring::{HashRing, ShardId};

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Scatter/gather top-K search over a set of shards.
#[derive(Debug, Clone, Default)]
pub struct FanOutSearch {
    max_concurrency: Option<usize>,
}

impl FanOutSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
        }
    }

    /// Caps concurrently running shard callbacks, overriding the hardware default.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Semaphore weight for a fan-out over `shard_count` shards.
    pub fn concurrency_for(&self, shard_count: usize) -> usize {
        let cap = self.max_concurrency.unwrap_or_else(default_concurrency);
        cap.min(shard_count).max(1)
    }

    /// Queries every shard in `shard_ids` and returns the global top `k`,
    /// highest score first.
    ///
    /// `search_fn(token, shard, query, k)` must return that shard's local top-K
    /// and should stop promptly once `token` is cancelled.
    pub async fn search<F, Fut>(
        &self,
        ctx: &CancellationToken,
        query: &[f32],
        k: usize,
        shard_ids: &[ShardId],
        search_fn: F,
    ) -> Result<Vec<SearchResult>>
    where
        F: Fn(CancellationToken, ShardId, Arc<[f32]>, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<SearchResult>>> + Send + 'static,
    {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if k == 0 || shard_ids.is_empty() {
            return Ok(Vec::new());
        }

        let permits = self.concurrency_for(shard_ids.len());
        tracing::debug!(
            "Fan-out search over {} shards (k={}, concurrency={})",
            shard_ids.len(),
            k,
            permits
        );

        let semaphore = Arc::new(Semaphore::new(permits));
        let shards_token = ctx.child_token();
        let query: Arc<[f32]> = Arc::from(query);
        let search_fn = Arc::new(search_fn);
        let (tx, mut rx) = mpsc::unbounded_channel::<(ShardId, Result<Vec<SearchResult>>)>();

        for shard in shard_ids {
            let shard = shard.clone();
            let semaphore = semaphore.clone();
            let token = shards_token.clone();
            let query = query.clone();
            let search_fn = search_fn.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    let _ = tx.send((shard, Err(Error::Cancelled)));
                    return;
                };

                let unit = format!("search on shard {}", shard);
                let target = shard.clone();
                let outcome = spawn_guarded(&unit, async move {
                    let shard_id = target.0.clone();
                    search_fn(token, target, query, k)
                        .await
                        .map_err(|source| Error::ShardFailed { shard_id, source })
                })
                .await;

                let _ = tx.send((shard, outcome));
            });
        }
        drop(tx);

        let mut top = TopK::new(k);
        let mut first_error: Option<Error> = None;
        let mut remaining = shard_ids.len();

        while remaining > 0 {
            let message = tokio::select! {
                biased;
                _ = ctx.cancelled(), if first_error.is_none() => {
                    tracing::debug!("Search cancelled with {} shards outstanding", remaining);
                    first_error = Some(Error::Cancelled);
                    shards_token.cancel();
                    continue;
                }
                message = rx.recv() => message,
            };
            let Some((shard, outcome)) = message else {
                tracing::error!("Search lost {} shard outcomes", remaining);
                first_error.get_or_insert_with(|| {
                    Error::internal(format!("{remaining} shard searches ended without reporting"))
                });
                break;
            };
            remaining -= 1;

            if first_error.is_some() {
                continue;
            }

            match outcome.and_then(|results| check_scores(&shard, results)) {
                Ok(results) => {
                    tracing::trace!("Shard {} returned {} results", shard, results.len());
                    top.extend(results);
                }
                Err(e) => {
                    tracing::warn!("Shard {} failed, cancelling fan-out: {}", shard, e);
                    first_error = Some(e);
                    shards_token.cancel();
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(top.into_sorted_vec()),
        }
    }

    /// Same as [`FanOutSearch::search`], fanning out to the ring's current membership.
    pub async fn search_ring<F, Fut>(
        &self,
        ctx: &CancellationToken,
        query: &[f32],
        k: usize,
        ring: &HashRing,
        search_fn: F,
    ) -> Result<Vec<SearchResult>>
    where
        F: Fn(CancellationToken, ShardId, Arc<[f32]>, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<SearchResult>>> + Send + 'static,
    {
        let shards = ring.shards();
        self.search(ctx, query, k, &shards, search_fn).await
    }
}

fn default_concurrency() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    parallelism * 2
}

fn check_scores(shard: &ShardId, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
    if let Some(bad) = results.iter().find(|r| r.score.is_nan()) {
        return Err(Error::InvalidArgument(format!(
            "shard {} returned NaN score for {}",
            shard, bad.id
        )));
    }
    Ok(results)
}
