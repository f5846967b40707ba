//! Agent hyper-parameters.
//!
//! Defaults follow common SAC settings for daily market data. A config can be
//! loaded from TOML; every field is optional there and falls back to its
//! default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::algorithms::curriculum::{ExplorationConfig, ObjectiveWeights};
use crate::device::Device;
use crate::error::{Result, SacError};
use crate::optimizer::OptimizerKind;

/// Prioritized replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub capacity: usize,
    /// Priority exponent α
    pub alpha: f32,
    /// Initial importance-sampling exponent β
    pub beta_start: f32,
    /// Sampling calls over which β is annealed to 1
    pub beta_frames: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            alpha: 0.6,
            beta_start: 0.4,
            beta_frames: 100_000,
        }
    }
}

/// Configuration of a [`ProgressiveSac`](crate::algorithms::ProgressiveSac) agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SacConfig {
    pub state_dim: usize,
    pub action_dim: usize,
    pub hidden_dims: Vec<usize>,
    pub activation: Activation,
    /// Number of capacity stages built for the policy and critics
    pub max_stages: usize,
    pub replay: ReplayConfig,
    pub batch_size: usize,
    /// Discount factor
    pub gamma: f32,
    /// Polyak coefficient for target critics
    pub tau: f32,
    pub policy_lr: f32,
    pub critic_lr: f32,
    /// Update rule for the policy and both critics
    pub optimizer: OptimizerKind,
    /// Initial entropy temperature
    pub alpha: f32,
    pub auto_entropy_tuning: bool,
    /// Environment steps of uniform random actions before the policy acts
    pub start_steps: u64,
    pub update_after: u64,
    pub update_every: u64,
    pub num_updates: usize,
    /// Update steps between target critic Polyak updates
    pub target_update_interval: u64,
    pub exploration: ExplorationConfig,
    /// Metric needed to enter stage `k`, at index `k - 1`
    pub curriculum_thresholds: Vec<f32>,
    pub objective_weights: ObjectiveWeights,
    pub ensemble_size: usize,
    pub ensemble_noise_scale: f32,
    /// Global gradient-norm clip; `None` disables clipping
    pub max_grad_norm: Option<f32>,
    /// Seed for the agent's generator; entropy-seeded when absent
    pub seed: Option<u64>,
    pub device: Device,
}

impl Default for SacConfig {
    fn default() -> Self {
        Self {
            state_dim: 1,
            action_dim: 1,
            hidden_dims: vec![256, 256],
            activation: Activation::Relu,
            max_stages: 3,
            replay: ReplayConfig::default(),
            batch_size: 256,
            gamma: 0.99,
            tau: 0.005,
            policy_lr: 3e-4,
            critic_lr: 3e-4,
            optimizer: OptimizerKind::Adam,
            alpha: 0.2,
            auto_entropy_tuning: true,
            start_steps: 10_000,
            update_after: 1_000,
            update_every: 50,
            num_updates: 1,
            target_update_interval: 1,
            exploration: ExplorationConfig::default(),
            curriculum_thresholds: vec![0.0, 0.5, 0.8],
            objective_weights: ObjectiveWeights::default(),
            ensemble_size: 3,
            ensemble_noise_scale: 0.01,
            max_grad_norm: None,
            seed: None,
            device: Device::Cpu,
        }
    }
}

impl SacConfig {
    pub fn new(state_dim: usize, action_dim: usize) -> Self {
        Self { state_dim, action_dim, ..Self::default() }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SacConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: String| Err(SacError::invalid_parameter(name.to_string(), reason));

        if self.state_dim == 0 || self.action_dim == 0 {
            return invalid("dims", "state_dim and action_dim must be positive".to_string());
        }
        if self.hidden_dims.is_empty() || self.hidden_dims.contains(&0) {
            return invalid("hidden_dims", format!("need at least one positive width, got {:?}", self.hidden_dims));
        }
        if self.max_stages == 0 {
            return invalid("max_stages", "must be at least 1".to_string());
        }
        if self.replay.capacity == 0 {
            return invalid("replay.capacity", "must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.replay.alpha) || !(0.0..=1.0).contains(&self.replay.beta_start) {
            return invalid("replay", "alpha and beta_start must be in [0, 1]".to_string());
        }
        if self.batch_size == 0 || self.batch_size > self.replay.capacity {
            return invalid("batch_size", format!("{} must be in 1..={}", self.batch_size, self.replay.capacity));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("gamma", format!("must be in [0, 1], got {}", self.gamma));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return invalid("tau", format!("must be in (0, 1], got {}", self.tau));
        }
        if self.policy_lr <= 0.0 || self.critic_lr <= 0.0 {
            return invalid("learning_rate", "must be positive".to_string());
        }
        if self.alpha <= 0.0 {
            return invalid("alpha", format!("must be positive, got {}", self.alpha));
        }
        if self.update_every == 0 || self.target_update_interval == 0 {
            return invalid("update_every", "update intervals must be positive".to_string());
        }
        if self.curriculum_thresholds.len() < 3 {
            return invalid(
                "curriculum_thresholds",
                format!("need one threshold per stage 1..=3, got {}", self.curriculum_thresholds.len()),
            );
        }
        let e = &self.exploration;
        if e.initial_noise < 0.0 || e.min_noise < 0.0 || !(0.0..=1.0).contains(&e.decay) {
            return invalid("exploration", "noise must be non-negative and decay in [0, 1]".to_string());
        }
        if self.ensemble_noise_scale < 0.0 {
            return invalid("ensemble_noise_scale", "must be non-negative".to_string());
        }
        if matches!(self.max_grad_norm, Some(n) if n <= 0.0) {
            return invalid("max_grad_norm", "must be positive when set".to_string());
        }
        Ok(())
    }
}
