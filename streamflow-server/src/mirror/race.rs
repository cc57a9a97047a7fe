//! First-success combinator.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

/// Drive all futures concurrently and return the first `Ok`.
///
/// Unlike a plain select, a failure does not end the race: errors are
/// collected (in completion order) and returned only once every future has
/// failed. An empty input fails immediately with no errors. On success the
/// remaining futures are dropped.
pub async fn first_success<I, F, T, E>(futures: I) -> Result<T, Vec<E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<F> = futures.into_iter().collect();
    let mut errors = Vec::with_capacity(pending.len());

    while let Some(result) = pending.next().await {
        match result {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }

    Err(errors)
}
