pub mod clock;
pub mod config;
pub mod error;
pub mod metric;
pub mod metrics;
#[cfg(feature = "prometheus")]
pub mod prometheus;
pub mod queue;
pub mod queue_metrics;
pub mod reflector_metrics;
pub mod registry;

pub use error::{MetricsError, Result};
pub use metric::Metric;
pub use registry::{MetricsProvider, Registry, default_registry, resolve_registry};
