use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Duplicate metric: {0}")]
    DuplicateMetric(String),

    #[error("Metrics registry promise has already been resolved")]
    AlreadyResolved,

    #[error("Metric already bound to an implementation: {0}")]
    AlreadyBound(String),

    #[error("Metric {name} expects {expected} label values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Backend error registering {name}: {message}")]
    Backend { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, MetricsError>;
