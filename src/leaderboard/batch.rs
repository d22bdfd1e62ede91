use std::future::Future;

use futures::future::join_all;

use crate::error::AppError;

/// Run `op` over `items`, at most `batch_size` calls in flight at a time.
///
/// Each batch is awaited as a whole before the next one starts. The first error of a
/// batch is returned once that batch has completed; later batches are not started.
/// Returns the number of completed operations.
pub async fn run_batched<I, F, Fut, R>(
    items: I,
    batch_size: usize,
    mut op: F,
) -> Result<usize, AppError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R, AppError>>,
{
    let batch_size = batch_size.max(1);
    let mut done = 0;
    let mut batch = Vec::with_capacity(batch_size);

    for item in items {
        batch.push(op(item));
        if batch.len() == batch_size {
            done += flush(&mut batch).await?;
        }
    }
    if !batch.is_empty() {
        done += flush(&mut batch).await?;
    }

    Ok(done)
}

async fn flush<Fut, R>(batch: &mut Vec<Fut>) -> Result<usize, AppError>
where
    Fut: Future<Output = Result<R, AppError>>,
{
    let results = join_all(batch.drain(..)).await;
    let count = results.len();
    for result in results {
        result?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{Player, Table};
    use crate::testing::MemoryTable;

    #[tokio::test]
    async fn batches_bound_concurrency() {
        let table = Arc::new(MemoryTable::<Player>::new());
        let players: Vec<Player> = (0..7)
            .map(|i| Player::new(format!("account.{i}"), format!("p{i}")))
            .collect();

        let t = table.as_ref();
        let done = run_batched(players, 3, move |p| t.insert(p)).await.unwrap();

        assert_eq!(done, 7);
        assert_eq!(table.rows().len(), 7);
        assert_eq!(MemoryTable::<Player>::count(&table.max_in_flight), 3);
    }

    #[tokio::test]
    async fn error_stops_later_batches() {
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let res = run_batched(0..10, 4, |i| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if i == 1 {
                    Err(AppError::Config("boom".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(matches!(res, Err(AppError::Config(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_input_does_nothing() {
        let done = run_batched(Vec::<u8>::new(), 50, |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(done, 0);
    }
}
