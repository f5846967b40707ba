pub mod performance;
pub mod statistics;
pub mod tracker;

pub use performance::{max_drawdown, sharpe_ratio, sortino_ratio, total_return, EvalMetric, TRADING_DAYS};
pub use statistics::Statistics;
pub use tracker::{MetricsTracker, TrainingMetrics};
