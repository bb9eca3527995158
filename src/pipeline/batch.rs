// Bounded batches with an inter-batch pause.
//
// Third-party hosts and the hosted storage API rate-limit bursts, so bulk
// work runs N operations at a time and sleeps between batches. Results come
// back in input order.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

/// Run `f` over `items`, at most `batch_size` futures at a time, sleeping
/// `pause` between batches (not after the last one).
pub async fn for_each_batch<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    pause: Duration,
    mut f: F,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut remaining = items.into_iter().peekable();

    while remaining.peek().is_some() {
        let batch: Vec<Fut> = remaining.by_ref().take(batch_size).map(&mut f).collect();
        results.extend(join_all(batch).await);

        if remaining.peek().is_some() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    results
}
