//! Chunked, task-parallel preloading of related rows.
//!
//! The result is at-least-partial: a chunk that fails or panics is logged and
//! dropped, so callers must treat a missing key as "unknown", not "absent".

use std::{collections::HashMap, future::Future, hash::Hash};

use sqlx::PgPool;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::{
    variants::{list_selected_options, SelectedOptionRow},
    DbError,
};

const DEFAULT_CHUNK_SIZE: usize = 100;
const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn from_app_config(config: &shelf_core::AppConfig) -> Self {
        Self {
            chunk_size: config.batch_chunk_size,
            max_concurrency: config.batch_max_concurrency,
        }
    }
}

#[derive(Debug, Error)]
enum ChunkError {
    #[error(transparent)]
    Fetch(#[from] DbError),
    #[error("chunk task panicked: {0}")]
    Panicked(String),
}

/// Split `keys` into chunks, fetch each chunk on its own task with at most
/// `max_concurrency` in flight, and merge the per-chunk maps.
///
/// Chunk tasks live in a [`JoinSet`]; dropping the returned future aborts
/// whatever is still running.
pub async fn fetch_chunked<K, V, F, Fut>(
    keys: Vec<K>,
    config: BatchConfig,
    fetch: F,
) -> HashMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> Fut,
    Fut: Future<Output = Result<HashMap<K, V>, DbError>> + Send + 'static,
{
    if keys.is_empty() {
        return HashMap::new();
    }

    let chunk_size = config.chunk_size.max(1);
    let total = keys.len().div_ceil(chunk_size);
    let mut pending = keys
        .chunks(chunk_size)
        .map(<[K]>::to_vec)
        .collect::<Vec<_>>()
        .into_iter()
        .enumerate();

    let limit = config.max_concurrency.max(1);
    let mut tasks: JoinSet<(usize, Result<HashMap<K, V>, DbError>)> = JoinSet::new();
    let mut merged = HashMap::with_capacity(keys.len());
    loop {
        while tasks.len() < limit {
            let Some((index, chunk)) = pending.next() else {
                break;
            };
            let fut = fetch(chunk);
            tasks.spawn(async move { (index, fut.await) });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (chunk, outcome) = match joined {
            Ok((index, result)) => (Some(index), result.map_err(ChunkError::from)),
            Err(join_error) => (None, Err(ChunkError::Panicked(join_error.to_string()))),
        };
        match outcome {
            Ok(map) => merged.extend(map),
            Err(error) => {
                tracing::warn!(chunk = ?chunk, total, error = %error, "batch chunk dropped");
            }
        }
    }
    merged
}

/// Preload the selected options of `variant_ids`, keyed by variant id.
pub async fn preload_selected_options(
    pool: &PgPool,
    variant_ids: Vec<i64>,
    config: BatchConfig,
) -> HashMap<i64, Vec<SelectedOptionRow>> {
    let pool = pool.clone();
    fetch_chunked(variant_ids, config, move |chunk| {
        let pool = pool.clone();
        async move {
            let rows = list_selected_options(&pool, &chunk).await?;
            let mut grouped: HashMap<i64, Vec<SelectedOptionRow>> = HashMap::new();
            for row in rows {
                grouped.entry(row.variant_id).or_default().push(row);
            }
            Ok(grouped)
        }
    })
    .await
}
