//! Debounce and retry scheduler
//!
//! [`DelayActionRunner`] coalesces bursts of change notifications into a
//! single delayed action per item, and retries failed actions later.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Default interval between two scans of the pending items.
pub const DEFAULT_TICK: Duration = Duration::from_secs(3);

type BoxFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Action<T> = Arc<dyn Fn(T) -> BoxFuture + Send + Sync>;

/// Notifications published around every action run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent<T> {
    BeforeRun(T),
    AfterRun { item: T, succeeded: bool },
}

struct Inner<T> {
    pending: Mutex<HashMap<T, Instant>>,
    action: Action<T>,
    delay: Duration,
    fail_retry: Duration,
    in_progress: AtomicBool,
    events: broadcast::Sender<RunnerEvent<T>>,
}

/// Runs an action for queued items after a quiet period.
///
/// - [`queue`](Self::queue) sets the item's deadline to now + delay; queuing
///   again before it elapses pushes the deadline back.
/// - A periodic tick runs every item past its deadline.
/// - A failed action is retried after `fail_retry`, or dropped when
///   `fail_retry` is zero. A newer deadline set by `queue` while the action
///   ran takes precedence over the retry.
/// - Only one pass runs at a time; a tick that finds a pass in progress is
///   skipped.
/// - [`stop`](Self::stop) lets the running action finish; due items the pass
///   did not reach go back to the pending set.
pub struct DelayActionRunner<T> {
    inner: Arc<Inner<T>>,
    tick: Duration,
    task: Mutex<Option<Worker>>,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: CancellationToken,
}

impl<T> DelayActionRunner<T>
where
    T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new<F, Fut>(action: F, delay: Duration, fail_retry: Duration) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (events, _) = broadcast::channel(64);
        let boxed: Action<T> = Arc::new(move |item: T| -> BoxFuture { Box::pin(action(item)) });
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                action: boxed,
                delay,
                fail_retry,
                in_progress: AtomicBool::new(false),
                events,
            }),
            tick: DEFAULT_TICK,
            task: Mutex::new(None),
        }
    }

    /// Use a different tick interval. Takes effect on the next `start`.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Schedule `item` to run after the configured delay.
    pub fn queue(&self, item: T) {
        let deadline = Instant::now() + self.inner.delay;
        tracing::debug!(?item, "Queued action");
        self.inner.lock_pending().insert(item, deadline);
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock_pending().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Start the periodic tick, restarting it if it already runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.stop();
        let inner = Arc::clone(&self.inner);
        let tick = self.tick;
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = ticker.tick() => inner.run_due(&stopped).await,
                }
            }
            tracing::debug!("Runner stopped");
        });
        *self.lock_task() = Some(Worker { handle, stop });
    }

    /// Stop the periodic tick. Safe to call repeatedly or before `start`.
    ///
    /// An action already running is allowed to complete in the background.
    pub fn stop(&self) {
        if let Some(worker) = self.lock_task().take() {
            worker.stop.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task().is_some()
    }

    /// Run every item whose deadline has passed, unless a pass is already running.
    pub async fn run_due(&self) {
        self.inner.run_due(&CancellationToken::new()).await;
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Inner<T>
where
    T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<T, Instant>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_due(&self, stop: &CancellationToken) {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("Previous pass still running, skipping tick");
            return;
        }

        let now = Instant::now();
        let due: Vec<T> = {
            let mut pending = self.lock_pending();
            let due: Vec<T> = pending
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(item, _)| item.clone())
                .collect();
            for item in &due {
                pending.remove(item);
            }
            due
        };
        let mut pass = Pass {
            inner: self,
            due,
            done: 0,
        };

        while let Some(item) = pass.due.get(pass.done).cloned() {
            if stop.is_cancelled() {
                tracing::debug!(remaining = pass.due.len() - pass.done, "Pass interrupted by stop");
                break;
            }
            let _ = self.events.send(RunnerEvent::BeforeRun(item.clone()));
            let result = (self.action)(item.clone()).await;
            pass.done += 1;
            let succeeded = result.is_ok();
            if let Err(e) = result {
                if self.fail_retry.is_zero() {
                    tracing::warn!(?item, error = %e, "Action failed, dropping item");
                } else {
                    tracing::warn!(?item, error = %e, retry_in = ?self.fail_retry, "Action failed, will retry");
                    self.lock_pending()
                        .entry(item.clone())
                        .or_insert_with(|| Instant::now() + self.fail_retry);
                }
            }
            let _ = self.events.send(RunnerEvent::AfterRun { item, succeeded });
        }
    }
}

/// One pass over the due items. Dropping it re-queues what did not finish
/// and releases the pass flag, including when the pass future is dropped.
struct Pass<'a, T>
where
    T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    inner: &'a Inner<T>,
    due: Vec<T>,
    done: usize,
}

impl<T> Drop for Pass<'_, T>
where
    T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.done < self.due.len() {
            let now = Instant::now();
            let mut pending = self.inner.lock_pending();
            for item in self.due.drain(self.done..) {
                pending.entry(item).or_insert(now);
            }
        }
        self.inner.in_progress.store(false, Ordering::Release);
    }
}

impl<T> Drop for DelayActionRunner<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.task.get_mut().ok().and_then(Option::take) {
            worker.stop.cancel();
            worker.handle.abort();
        }
    }
}

impl<T> Debug for DelayActionRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayActionRunner")
            .field("delay", &self.inner.delay)
            .field("fail_retry", &self.inner.fail_retry)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::AtomicUsize;

    fn counting_runner(
        delay: Duration,
        fail_retry: Duration,
        failures: usize,
    ) -> (DelayActionRunner<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let runner = DelayActionRunner::new(
            move |_item: String| {
                let counter = Arc::clone(&counter);
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst);
                    if call < failures {
                        Err(Error::target("fake", "boom"))
                    } else {
                        Ok(())
                    }
                }
            },
            delay,
            fail_retry,
        )
        .with_tick(Duration::from_secs(1));
        (runner, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_queue_runs_once_after_last_deadline() {
        let (runner, calls) = counting_runner(Duration::from_secs(3), Duration::from_secs(30), 0);
        runner.start();

        for _ in 0..3 {
            runner.queue("profile".to_string());
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_action_is_retried_after_retry_delay() {
        let (runner, calls) = counting_runner(Duration::from_secs(1), Duration::from_secs(30), 1);
        runner.start();
        runner.queue("profile".to_string());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_drops_failed_item() {
        let (runner, calls) = counting_runner(Duration::from_secs(1), Duration::ZERO, 1);
        runner.start();
        runner.queue("profile".to_string());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_processing() {
        let (runner, calls) = counting_runner(Duration::from_secs(1), Duration::from_secs(30), 0);
        runner.stop();
        runner.start();
        assert!(runner.is_running());
        runner.stop();
        runner.stop();
        assert!(!runner.is_running());

        runner.queue("profile".to_string());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_during_an_action_keeps_processing() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let runner = DelayActionRunner::new(
            move |item: u32| {
                let seen = Arc::clone(&seen);
                async move {
                    let first = {
                        let mut seen = seen.lock().unwrap();
                        seen.push(item);
                        seen.len() == 1
                    };
                    if first {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok(())
                }
            },
            Duration::from_secs(1),
            Duration::from_secs(30),
        )
        .with_tick(Duration::from_secs(1));
        runner.start();
        runner.queue(1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*calls.lock().unwrap(), vec![1]);
        runner.stop();
        assert!(!runner.is_running());

        runner.start();
        runner.queue(2);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_pass_requeues_unfinished_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let runner = DelayActionRunner::new(
            move |_item: u32| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok(())
                }
            },
            Duration::ZERO,
            Duration::ZERO,
        );
        runner.queue(7);

        let interrupted = tokio::time::timeout(Duration::from_secs(1), runner.run_due()).await;
        assert!(interrupted.is_err());
        assert_eq!(runner.pending_count(), 1);

        runner.run_due().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_surround_each_run() {
        let (runner, _calls) = counting_runner(Duration::ZERO, Duration::ZERO, 0);
        let mut events = runner.subscribe();
        runner.queue("p1".to_string());

        runner.run_due().await;

        assert_eq!(events.recv().await.unwrap(), RunnerEvent::BeforeRun("p1".to_string()));
        assert_eq!(
            events.recv().await.unwrap(),
            RunnerEvent::AfterRun {
                item: "p1".to_string(),
                succeeded: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_pass_is_skipped() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (gate_in, calls_in) = (Arc::clone(&gate), Arc::clone(&calls));
        let runner = Arc::new(DelayActionRunner::new(
            move |_item: u32| {
                let gate = Arc::clone(&gate_in);
                let calls = Arc::clone(&calls_in);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(())
                }
            },
            Duration::ZERO,
            Duration::ZERO,
        ));
        runner.queue(1);

        let first = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run_due().await })
        };
        tokio::task::yield_now().await;
        runner.queue(2);
        runner.run_due().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending_count(), 1);
        gate.notify_one();
        first.await.unwrap();
    }
}
