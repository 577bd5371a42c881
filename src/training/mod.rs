//! Model training
//!
//! Training loop, loss functions, metrics tracking, validation, and the
//! scalar time-series log.

pub mod evaluate;
pub mod loss;
pub mod metrics;
pub mod scalars;
pub mod trainer;

pub use evaluate::{evaluate, Evaluation};
pub use loss::{LossFn, MfeLoss};
pub use metrics::{BestTracker, ConfusionCounts, MetricsWindow};
pub use scalars::ScalarLog;
pub use trainer::Trainer;
