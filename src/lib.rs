//! # Progressive SAC - Regime-Aware Soft Actor-Critic for Position Sizing
//!
//! A continuous-control agent that learns a trading position in `[-1, 1]`
//! from market states. It extends Soft Actor-Critic with:
//!
//! - **Progressive capacity**: policy and critics carry several independently
//!   parameterized stages and grow as a curriculum advances
//! - **Regime awareness**: per-regime entropy temperatures, input
//!   normalization and critic heads, created on first sight of a regime
//! - **Prioritized replay**: TD-error priorities with importance weights and
//!   regime-balanced batches
//! - **Curriculum and ensembles**: a three-stage schedule that reweights the
//!   objective and finally builds a perturbed policy ensemble
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use progressive_sac::algorithms::ProgressiveSacBuilder;
//! use progressive_sac::market::{LabelledRegimes, LookbackEncoder, MarketFrame, PositionReward};
//! use progressive_sac::training::{Trainer, TrainerConfig};
//! use ndarray::{Array1, Array2};
//!
//! let n = 500;
//! let frame = MarketFrame::new(
//!     Array2::zeros((n, 4)),
//!     Array1::from_elem(n, 100.0),
//!     vec![1; n],
//! ).unwrap();
//!
//! let mut agent = ProgressiveSacBuilder::new(40, 1).seed(7).build().unwrap();
//! let mut trainer = Trainer::new(
//!     TrainerConfig::default(),
//!     LookbackEncoder::new(10),
//!     LabelledRegimes::default(),
//!     PositionReward::default(),
//! );
//! let report = trainer.train(&mut agent, &frame).unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions
//! - [`algorithms`] - The agent, curriculum, ensemble and checkpoints
//! - [`builders`] - Builder patterns for convenient object construction
//! - [`config`] - Agent hyper-parameters, loadable from TOML
//! - [`device`] - Compute backend selection
//! - [`error`] - Error types and result handling
//! - [`layers`] - Dense layers, initialization, normalization and dropout
//! - [`market`] - Market data, state encoding, regimes and rewards
//! - [`metrics`] - Risk-adjusted scores and training metrics
//! - [`network`] - Progressive, policy and critic networks
//! - [`optimizer`] - Optimizers and gradient clipping
//! - [`replay_buffer`] - Prioritized, regime-aware experience replay
//! - [`training`] - Training loop, evaluation and reports
//! - [`types`] - Shared identifiers

pub mod activations;
pub mod algorithms;
pub mod builders;
pub mod config;
pub mod device;
pub mod error;
pub mod layers;
pub mod market;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod training;
pub mod types;

pub use algorithms::{ProgressiveSac, ProgressiveSacBuilder};
pub use config::SacConfig;
pub use error::{Result, SacError};

#[cfg(test)]
mod tests;
