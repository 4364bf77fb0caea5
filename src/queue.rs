use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::{
    clock::{Clock, SystemClock},
    config::WorkQueueConfig,
    queue_metrics::{
        QueueMetrics, QueueMetricsHooks, RetryMetrics, RetryMetricsHooks,
        WorkqueueMetricFamilies,
    },
};

struct State<T> {
    // items waiting to be handed out, in order
    queue: VecDeque<T>,
    // items that need processing; an item is never in `queue` twice
    dirty: HashSet<T>,
    // items currently handed out
    processing: HashSet<T>,
    shutting_down: bool,
    metrics: Option<QueueMetrics<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    retry_metrics: Option<RetryMetrics>,
    config: WorkQueueConfig,
}

/// An in-process work queue that hands each distinct item to at most one
/// processor at a time.
///
/// Adding an item that is already queued is a no-op. Adding an item that is
/// being processed queues it again once it is marked [`done`](Self::done).
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    /// Create a queue instrumented through the process-wide metric families.
    pub fn new(config: WorkQueueConfig) -> Self {
        Self::with_families(config, WorkqueueMetricFamilies::global(), Arc::new(SystemClock))
    }

    pub fn named(name: &str) -> Self {
        Self::new(WorkQueueConfig::named(name))
    }

    pub fn with_families(
        config: WorkQueueConfig,
        families: &WorkqueueMetricFamilies,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metrics = QueueMetrics::new(families, &config.name, clock);
        let retry_metrics = RetryMetrics::new(families, &config.name);
        if metrics.is_none() {
            log::debug!("Work queue created without a name, metrics disabled");
        }
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                    metrics,
                }),
                notify: Notify::new(),
                retry_metrics,
                config,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `item` as needing processing.
    pub fn add(&self, item: T) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }

        state.metrics.add(&item);
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            return;
        }

        state.queue.push_back(item);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Wait for the next item. Returns `None` once the queue is shut down and
    /// drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.metrics.get(&item);
                    state.processing.insert(item.clone());
                    state.dirty.remove(&item);
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark `item` as done processing. If it was added again meanwhile it is
    /// queued for another round.
    pub fn done(&self, item: &T) {
        let mut state = self.lock();
        state.metrics.done(item);
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Add `item` again after `delay`, counting it as a retry.
    ///
    /// The delay runs on the current tokio runtime. Outside of one the item is
    /// added right away.
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }

        self.shared.retry_metrics.retry();
        if delay.is_zero() {
            self.add(item);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(
                "No tokio runtime to delay a retry on {}, adding it now",
                self.name()
            );
            self.add(item);
            return;
        };

        log::debug!("Re-adding item to {} in {:?}", self.name(), delay);
        let queue = self.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        log::info!("Shutting down work queue {}", self.name());
        self.shared.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Refresh the unfinished-work gauges from the items in flight.
    pub fn update_unfinished_work(&self) {
        self.lock().metrics.update_unfinished_work();
    }

    /// Refresh the unfinished-work gauges on the configured period until the
    /// queue shuts down.
    pub fn spawn_unfinished_work_loop(&self) -> JoinHandle<()> {
        let queue = self.clone();
        let period = self.shared.config.metrics.unfinished_work_update_period();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if queue.is_shutting_down() {
                    log::debug!("Stopping unfinished work updates for {}", queue.name());
                    break;
                }
                queue.update_unfinished_work();
            }
        })
    }
}
