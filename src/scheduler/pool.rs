//! Fixed-size pool of async workers fed from a bounded queue.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

type Job<T> = BoxFuture<'static, T>;

/// Runs at most `workers` jobs at a time.
///
/// [`submit`](Self::submit) blocks while the queue is full, which is what
/// keeps a lazily generated candidate stream from being materialized ahead
/// of the workers. Each output is folded into an accumulator of type `A`
/// as soon as its job finishes, so nothing piles up until the end. A job
/// that panics is logged and dropped; its worker keeps going.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::scheduler::WorkerPool;
///
/// # async fn example() -> wsfuzz::Result<()> {
/// let pool = WorkerPool::new(4, 8, |total: &mut u32, n: u32| *total += n)?;
/// for i in 0..10u32 {
///     pool.submit(async move { i * 2 }).await?;
/// }
/// assert_eq!(pool.drain().await, 90);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkerPool<T, A> {
    tx: mpsc::Sender<Job<T>>,
    workers: Vec<JoinHandle<()>>,
    acc: Arc<Mutex<A>>,
}

impl<T, A> WorkerPool<T, A>
where
    T: Send + 'static,
    A: Default + Send + 'static,
{
    /// Start `workers` tasks reading from a queue of `capacity` jobs. Every
    /// finished job's output is handed to `fold`.
    pub fn new<F>(workers: usize, capacity: usize, fold: F) -> Result<Self>
    where
        F: Fn(&mut A, T) + Send + Sync + 'static,
    {
        if workers == 0 || capacity == 0 {
            return Err(Error::config("worker pool needs at least one worker and one slot"));
        }

        let (tx, rx) = mpsc::channel::<Job<T>>(capacity);
        let rx = Arc::new(AsyncMutex::new(rx));
        let acc = Arc::new(Mutex::new(A::default()));
        let fold = Arc::new(fold);

        let workers = (0..workers)
            .map(|index| {
                let rx = rx.clone();
                let acc = acc.clone();
                let fold = fold.clone();
                tokio::spawn(async move {
                    loop {
                        // The lock is held only while dequeuing.
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };

                        match tokio::spawn(job).await {
                            Ok(output) => fold(&mut *acc.lock(), output),
                            Err(e) => error!("Worker {} job failed: {}", index, e),
                        }
                    }
                    debug!("Worker {} stopped", index);
                })
            })
            .collect();

        Ok(Self { tx, workers, acc })
    }

    /// Number of worker tasks.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, waiting for space if the queue is full.
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.tx
            .send(Box::pin(job))
            .await
            .map_err(|_| Error::internal("worker pool has shut down"))
    }

    /// Close the queue, wait for every queued job and return the
    /// accumulator.
    pub async fn drain(self) -> A {
        let Self { tx, workers, acc } = self;
        drop(tx);

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }

        let mut acc = acc.lock();
        std::mem::take(&mut *acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn collect<T>(outputs: &mut Vec<T>, output: T) {
        outputs.push(output);
    }

    #[test]
    fn rejects_empty_pool() {
        assert!(WorkerPool::new(0, 1, collect::<()>).is_err());
        assert!(WorkerPool::new(1, 0, collect::<()>).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_worker_count() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(3, 2, collect::<()>).unwrap();
        assert_eq!(pool.workers(), 3);

        for _ in 0..20 {
            let active = active.clone();
            let peak = peak.clone();
            pool.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        let outputs = pool.drain().await;
        assert_eq!(outputs.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_worker() {
        let pool = WorkerPool::new(1, 4, collect::<i32>).unwrap();
        pool.submit(async { 1 }).await.unwrap();
        pool.submit(async { panic!("boom") }).await.unwrap();
        pool.submit(async { 3 }).await.unwrap();

        let outputs = pool.drain().await;
        assert_eq!(outputs, vec![1, 3]);
    }

    #[tokio::test]
    async fn drain_without_jobs_returns_nothing() {
        let pool = WorkerPool::new(2, 2, collect::<u8>).unwrap();
        assert!(pool.drain().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn outputs_are_folded_as_jobs_finish() {
        let pool = WorkerPool::new(2, 2, |seen: &mut usize, _: u8| *seen += 1).unwrap();
        let seen = pool.acc.clone();

        pool.submit(async { 1 }).await.unwrap();
        pool.submit(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            2
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        // The fast job is accounted while the slow one is still running.
        assert_eq!(*seen.lock(), 1);
        assert_eq!(pool.drain().await, 2);
    }
}
