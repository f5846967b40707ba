//! Episode-driven training and evaluation over a [`MarketFrame`](crate::market::MarketFrame).

pub mod evaluation;
pub mod plot;
pub mod report;
pub mod trainer;

pub use evaluation::{evaluate_agent, EvaluationConfig};
pub use plot::{bar_chart, plot_series};
pub use report::{RegimeTransitionCount, TrainingReport};
pub use trainer::{Trainer, TrainerConfig};
