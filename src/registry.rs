//! Registry contract and the deferred registry that stands in until a real
//! backend is chosen.
//!
//! Metrics are usually declared while components are still being constructed,
//! long before the embedding application has decided which backend to use. A
//! [`MetricsProvider`] starts out holding a [`RegistryPromise`] that buffers
//! every registration; [`MetricsProvider::resolve`] replays the buffer into the
//! real backend, in declaration order, and from then on registrations go
//! straight through.

use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    error::{MetricsError, Result},
    metric::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, Metric},
};

/// Knows how to implement and expose metrics.
///
/// Each method creates a backend-native series for the descriptor and binds it
/// into the descriptor. Errors are structural (bad name, duplicate name).
pub trait Registry: Send + Sync {
    fn register_gauge(&self, metric: &Arc<Gauge>) -> Result<()>;

    fn register_gauge_vec(&self, metric: &Arc<GaugeVec>) -> Result<()>;

    fn register_histogram(&self, metric: &Arc<Histogram>) -> Result<()>;

    fn register_histogram_vec(&self, metric: &Arc<HistogramVec>) -> Result<()>;

    fn register_counter(&self, metric: &Arc<Counter>) -> Result<()>;

    fn register_counter_vec(&self, metric: &Arc<CounterVec>) -> Result<()>;
}

/// A promise of an eventual registry. Registrations are buffered until the
/// promise is consumed by a resolution.
#[derive(Debug)]
pub struct RegistryPromise {
    metrics: Mutex<Option<Vec<Metric>>>,
}

impl Default for RegistryPromise {
    fn default() -> Self {
        Self {
            metrics: Mutex::new(Some(Vec::new())),
        }
    }
}

impl RegistryPromise {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered registrations, zero once consumed.
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_consumed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<Metric>>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, metric: Metric) -> Result<()> {
        match self.lock().as_mut() {
            Some(metrics) => {
                log::debug!("Deferring registration of {}", metric.name());
                metrics.push(metric);
                Ok(())
            }
            None => {
                log::error!(
                    "Metric {} registered on a consumed registry promise",
                    metric.name()
                );
                Err(MetricsError::AlreadyResolved)
            }
        }
    }

    fn take(&self) -> Option<Vec<Metric>> {
        self.lock().take()
    }
}

impl Registry for RegistryPromise {
    fn register_gauge(&self, metric: &Arc<Gauge>) -> Result<()> {
        self.push(Metric::Gauge(metric.clone()))
    }

    fn register_gauge_vec(&self, metric: &Arc<GaugeVec>) -> Result<()> {
        self.push(Metric::GaugeVec(metric.clone()))
    }

    fn register_histogram(&self, metric: &Arc<Histogram>) -> Result<()> {
        self.push(Metric::Histogram(metric.clone()))
    }

    fn register_histogram_vec(&self, metric: &Arc<HistogramVec>) -> Result<()> {
        self.push(Metric::HistogramVec(metric.clone()))
    }

    fn register_counter(&self, metric: &Arc<Counter>) -> Result<()> {
        self.push(Metric::Counter(metric.clone()))
    }

    fn register_counter_vec(&self, metric: &Arc<CounterVec>) -> Result<()> {
        self.push(Metric::CounterVec(metric.clone()))
    }
}

enum State {
    Pending(Arc<RegistryPromise>),
    Resolved(Arc<dyn Registry>),
}

/// Owner of the "current registry" reference.
///
/// Starts pending on a [`RegistryPromise`] and is resolved exactly once.
pub struct MetricsProvider {
    state: RwLock<State>,
}

impl Default for MetricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Pending(Arc::new(RegistryPromise::new()))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The registry new metrics should go to: the promise until resolved,
    /// the backend afterwards.
    pub fn current(&self) -> Arc<dyn Registry> {
        match &*self.read() {
            State::Pending(promise) => promise.clone() as Arc<dyn Registry>,
            State::Resolved(registry) => registry.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.read(), State::Resolved(_))
    }

    /// Registrations waiting for resolution.
    pub fn pending_len(&self) -> usize {
        match &*self.read() {
            State::Pending(promise) => promise.len(),
            State::Resolved(_) => 0,
        }
    }

    /// Register a metric in the current registry.
    ///
    /// Unlike going through [`current`](Self::current), a registration made
    /// here can never land in a promise that a concurrent resolution has
    /// already consumed.
    pub fn register(&self, metric: impl Into<Metric>) -> Result<()> {
        let metric = metric.into();
        if let State::Resolved(registry) = &*self.read() {
            return metric.register_in(registry.as_ref());
        }

        match &*self.write() {
            State::Pending(promise) => metric.register_in(&**promise),
            State::Resolved(registry) => metric.register_in(registry.as_ref()),
        }
    }

    /// Register a metric in the current registry, panicking if it fails.
    pub fn must_register(&self, metric: impl Into<Metric>) {
        let metric = metric.into();
        if let Err(e) = self.register(metric.clone()) {
            panic!("failed to register metric {}: {e}", metric.name());
        }
    }

    /// Turn the promise into `actual`, replaying every buffered registration
    /// in declaration order.
    ///
    /// Fails with [`MetricsError::AlreadyResolved`] on a second call, leaving
    /// the existing backend in place. If a replayed registration fails the
    /// backend still becomes current, the remaining buffered metrics are
    /// dropped, and the error is returned; callers treat it as fatal.
    pub fn resolve(&self, actual: Arc<dyn Registry>) -> Result<()> {
        let mut state = self.write();
        let promise = match &*state {
            State::Pending(promise) => promise.clone(),
            State::Resolved(_) => {
                log::error!("Unable to resolve already-resolved metrics registry promise");
                return Err(MetricsError::AlreadyResolved);
            }
        };

        let pending = promise.take().unwrap_or_default();
        log::info!(
            "Resolving metrics registry, replaying {} deferred registrations",
            pending.len()
        );
        let replayed = pending.iter().try_for_each(|metric| {
            log::debug!("Replaying registration of {}", metric.name());
            metric.register_in(actual.as_ref())
        });

        // the swap happens after the replay, whether or not it succeeded
        *state = State::Resolved(actual);
        replayed
    }

    /// Like [`resolve`](Self::resolve), panicking on failure.
    pub fn must_resolve(&self, actual: Arc<dyn Registry>) {
        if let Err(e) = self.resolve(actual) {
            panic!("unable to resolve metrics registry: {e}");
        }
    }
}

static DEFAULT_PROVIDER: OnceLock<MetricsProvider> = OnceLock::new();

/// The process-wide provider, created pending on first use.
pub fn default_provider() -> &'static MetricsProvider {
    DEFAULT_PROVIDER.get_or_init(MetricsProvider::new)
}

/// The current default registry. A promise until [`resolve_registry`] is called.
pub fn default_registry() -> Arc<dyn Registry> {
    default_provider().current()
}

/// Resolve the process-wide promise to an actual registry.
pub fn resolve_registry(actual: Arc<dyn Registry>) -> Result<()> {
    default_provider().resolve(actual)
}
