use std::collections::{BTreeMap, VecDeque};

use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::Rng;
use rand_distr::{Normal, StandardNormal};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::activations::Activation;
use crate::device::Device;
use crate::error::{Result, SacError};
use crate::layers::{DenseGradients, DropoutLayer, LayerNorm, RunningNorm, WeightInit};
use crate::network::progressive::{ProgressiveNetwork, StageSnapshot};
use crate::optimizer::{Optimizer, ScalarAdam};
use crate::types::{RegimeId, RegimePair};

pub const LOG_STD_MIN: f32 = -20.0;
pub const LOG_STD_MAX: f32 = 2.0;
pub const MEAN_BOUND: f32 = 10.0;
const MEAN_NOISE: f32 = 0.01;
const INPUT_DROPOUT: f32 = 0.1;
const SQUASH_EPSILON: f32 = 1e-6;
const TRANSITION_DAMPING: f32 = 0.9;
const MAX_TRANSITION_HISTORY: usize = 10;
const ALPHA_LEARNING_RATE: f32 = 3e-4;
const NORM_MOMENTUM: f32 = 0.1;
const NORM_EPSILON: f32 = 1e-5;

/// Parameters owned by one regime: its entropy temperature and input normalization
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegimeParams {
    pub log_alpha: f32,
    optimizer: ScalarAdam,
    pub norm: RunningNorm,
}

/// Clamped Gaussian parameters for a batch of states
#[derive(Clone, Debug)]
pub struct PolicyOutput {
    pub mean: Array2<f32>,
    pub log_std: Array2<f32>,
    /// 1 where the mean clamp is inactive, 0 where it saturated
    mean_pass: Array2<f32>,
    log_std_pass: Array2<f32>,
}

/// Reparameterized draw from the squashed policy, with what backward needs
#[derive(Clone, Debug)]
pub struct PolicySample {
    pub action: Array2<f32>,
    pub log_prob: Array1<f32>,
    pub mean: Array2<f32>,
    std: Array2<f32>,
    eps: Array2<f32>,
    mean_pass: Array2<f32>,
    log_std_pass: Array2<f32>,
    /// Set when non-finite values were replaced; such a sample carries no gradient
    pub fallback: bool,
}

/// Progressive squashed-Gaussian policy with global and per-regime entropy
/// temperatures.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PolicyNetwork {
    pub network: ProgressiveNetwork,
    state_dim: usize,
    action_dim: usize,
    target_entropy: f32,
    log_alpha: f32,
    alpha_optimizer: ScalarAdam,
    regimes: BTreeMap<RegimeId, RegimeParams>,
    layer_norm: LayerNorm,
    dropout: DropoutLayer,
    last_regime: Option<RegimeId>,
    transition_history: VecDeque<RegimePair>,
    training: bool,
    device: Device,
}

impl PolicyNetwork {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        state_dim: usize,
        action_dim: usize,
        hidden_dims: &[usize],
        activation: Activation,
        max_stages: usize,
        initial_alpha: f32,
        device: Device,
        rng: &mut R,
    ) -> Self {
        let network = ProgressiveNetwork::new(
            state_dim,
            action_dim * 2,
            hidden_dims,
            activation,
            Activation::Linear,
            max_stages,
            &WeightInit::XavierUniform { gain: 0.1 },
            device,
            rng,
        );

        PolicyNetwork {
            network,
            state_dim,
            action_dim,
            target_entropy: -(action_dim as f32),
            log_alpha: initial_alpha.max(f32::MIN_POSITIVE).ln(),
            alpha_optimizer: ScalarAdam::new(ALPHA_LEARNING_RATE),
            regimes: BTreeMap::new(),
            layer_norm: LayerNorm::default(),
            dropout: DropoutLayer::new(INPUT_DROPOUT),
            last_regime: None,
            transition_history: VecDeque::with_capacity(MAX_TRANSITION_HISTORY + 1),
            training: true,
            device,
        }
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn stage(&self) -> usize {
        self.network.stage()
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Toggle the stochastic regularizers (dropout, mean noise, running-stat
    /// updates, transition smoothing).
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
        self.dropout.set_training(training);
        for params in self.regimes.values_mut() {
            params.norm.set_training(training);
        }
    }

    pub fn increase_complexity(&mut self) -> Option<StageSnapshot> {
        self.network.increase_complexity()
    }

    /// Create the temperature and normalization for `regime` if missing.
    ///
    /// A new temperature starts from the current global value. Returns
    /// whether anything was created.
    pub fn ensure_regime(&mut self, regime: RegimeId) -> bool {
        if self.regimes.contains_key(&regime) {
            return false;
        }
        let mut norm = RunningNorm::new(self.state_dim, NORM_MOMENTUM, NORM_EPSILON, self.device);
        norm.set_training(self.training);
        self.regimes.insert(regime, RegimeParams {
            log_alpha: self.log_alpha,
            optimizer: ScalarAdam::new(ALPHA_LEARNING_RATE),
            norm,
        });
        info!(regime, "Added regime-specific entropy coefficient");
        true
    }

    pub fn has_regime(&self, regime: RegimeId) -> bool {
        self.regimes.contains_key(&regime)
    }

    pub fn known_regimes(&self) -> impl Iterator<Item = RegimeId> + '_ {
        self.regimes.keys().copied()
    }

    /// Entropy temperature, regime-specific when one exists
    pub fn get_alpha(&self, regime: Option<RegimeId>) -> f32 {
        regime
            .and_then(|r| self.regimes.get(&r))
            .map_or(self.log_alpha, |p| p.log_alpha)
            .exp()
    }

    /// One Adam step on `-(log_α · (log π + H_target)).mean()`; returns the loss.
    pub fn update_alpha(&mut self, log_probs: ArrayView1<f32>, regime: Option<RegimeId>) -> f32 {
        let shifted = log_probs.mapv(|lp| lp + self.target_entropy);
        let Some(mean_shifted) = shifted.mean() else {
            return 0.0;
        };
        if !mean_shifted.is_finite() {
            warn!("Non-finite log-probabilities in temperature update; skipping");
            return 0.0;
        }

        let (log_alpha, optimizer) = match regime.and_then(|r| self.regimes.get_mut(&r)) {
            Some(params) => (&mut params.log_alpha, &mut params.optimizer),
            None => (&mut self.log_alpha, &mut self.alpha_optimizer),
        };
        let loss = -*log_alpha * mean_shifted;
        optimizer.step(log_alpha, -mean_shifted);
        loss
    }

    /// Record a regime change; true when the last three changes all switched regimes.
    fn track_transition(&mut self, regime: RegimeId) -> bool {
        let mut churn = false;
        if let Some(last) = self.last_regime.filter(|&last| last != regime) {
            self.transition_history.push_back((last, regime));
            if self.transition_history.len() > MAX_TRANSITION_HISTORY {
                self.transition_history.pop_front();
            }
            churn = self.transition_history.len() >= 3
                && self.transition_history.iter().rev().take(3).all(|(from, to)| from != to);
        }
        self.last_regime = Some(regime);
        churn
    }

    fn preprocess<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView2<f32>,
        regime: Option<RegimeId>,
        stochastic: bool,
        rng: &mut R,
    ) -> Array2<f32> {
        let mut x = self.layer_norm.forward_batch(state);
        if let Some(regime) = regime {
            if let Some(params) = self.regimes.get_mut(&regime) {
                x = if stochastic {
                    params.norm.forward_batch(x.view())
                } else {
                    params.norm.normalize(x.view())
                };
            }
            if stochastic && self.track_transition(regime) {
                x.mapv_inplace(|v| v * TRANSITION_DAMPING);
            }
        }
        if stochastic {
            self.dropout.forward_batch(x.view(), rng)
        } else {
            x
        }
    }

    /// Mean and log-std for a batch of states.
    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView2<f32>,
        regime: Option<RegimeId>,
        rng: &mut R,
    ) -> Result<PolicyOutput> {
        let stochastic = self.training;
        self.forward_with(state, regime, stochastic, rng)
    }

    fn forward_with<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView2<f32>,
        regime: Option<RegimeId>,
        stochastic: bool,
        rng: &mut R,
    ) -> Result<PolicyOutput> {
        if state.ncols() != self.state_dim {
            return Err(SacError::dimension_mismatch(
                format!("state of {} features", self.state_dim),
                format!("state of {} features", state.ncols()),
            ));
        }

        let x = self.preprocess(state, regime, stochastic, rng);
        let raw = self.network.forward_batch(x.view())?;
        let a = self.action_dim;

        let mut mean = raw.slice(s![.., ..a]).to_owned();
        if stochastic {
            if let Ok(noise) = Normal::new(0.0f32, MEAN_NOISE) {
                mean.mapv_inplace(|m| m + rng.sample(noise));
            }
        }
        let log_std = raw.slice(s![.., a..]).to_owned();

        let mean_pass = clamp_mask(&mean, -MEAN_BOUND, MEAN_BOUND);
        let log_std_pass = clamp_mask(&log_std, LOG_STD_MIN, LOG_STD_MAX);

        Ok(PolicyOutput {
            mean: mean.mapv(|m| m.clamp(-MEAN_BOUND, MEAN_BOUND)),
            log_std: log_std.mapv(|l| l.clamp(LOG_STD_MIN, LOG_STD_MAX)),
            mean_pass,
            log_std_pass,
        })
    }

    /// Draw `tanh(mean + std·ε)` and its log-probability.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView2<f32>,
        regime: Option<RegimeId>,
        rng: &mut R,
    ) -> Result<PolicySample> {
        let PolicyOutput { mut mean, log_std, mean_pass, log_std_pass } = self.forward(state, regime, rng)?;
        let mut std = log_std.mapv(f32::exp);
        let mut fallback = false;

        if mean.iter().chain(std.iter()).any(|v| !v.is_finite()) {
            warn!("NaN values detected in policy network outputs. Using fallback values.");
            mean.fill(0.0);
            std.fill(1.0);
            fallback = true;
        }

        let eps = self.device.random2(mean.dim(), StandardNormal, rng);
        let action = (&mean + &(&std * &eps)).mapv(f32::tanh);

        let half_ln_2pi = 0.5 * (2.0 * std::f32::consts::PI).ln();
        let per_dim = Zip::from(&eps).and(&std).and(&action).map_collect(|&e, &s, &a| {
            -0.5 * e * e - s.ln() - half_ln_2pi - (1.0 - a * a + SQUASH_EPSILON).ln()
        });
        let mut log_prob = per_dim.sum_axis(Axis(1));

        if log_prob.iter().any(|v| !v.is_finite()) {
            warn!("NaN values in log probability. Using fallback values.");
            log_prob.fill(0.0);
            fallback = true;
        }

        Ok(PolicySample { action, log_prob, mean, std, eps, mean_pass, log_std_pass, fallback })
    }

    /// `tanh(mean)` for a batch of states.
    ///
    /// Skips every stochastic path and leaves running statistics and the
    /// transition history untouched, so the result depends only on the
    /// stored parameters.
    pub fn deterministic_action<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView2<f32>,
        regime: Option<RegimeId>,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let output = self.forward_with(state, regime, false, rng)?;
        Ok(output.mean.mapv(|m| if m.is_finite() { m.tanh() } else { 0.0 }))
    }

    /// Gradients of a loss given `∂L/∂action` and `∂L/∂log π` for a sample.
    ///
    /// Must follow the [`sample`](Self::sample) call that produced `sample`.
    pub fn backward(
        &self,
        sample: &PolicySample,
        grad_action: ArrayView2<f32>,
        grad_log_prob: ArrayView1<f32>,
    ) -> Result<Vec<DenseGradients>> {
        let a = &sample.action;
        if grad_action.dim() != a.dim() || grad_log_prob.len() != a.nrows() {
            return Err(SacError::dimension_mismatch(
                format!("{:?}", a.dim()),
                format!("{:?}", grad_action.dim()),
            ));
        }

        let one_minus_a2 = a.mapv(|v| 1.0 - v * v);
        // d/dx of -ln(1 - tanh²x + ε)
        let jacobian = Zip::from(a).and(&one_minus_a2).map_collect(|&a, &d| 2.0 * a * d / (d + SQUASH_EPSILON));
        let noise = &sample.std * &sample.eps;
        let glp = grad_log_prob.insert_axis(Axis(1));

        let mut grad_mean = &grad_action * &one_minus_a2 + &(&jacobian * &glp);
        grad_mean *= &sample.mean_pass;

        let mut grad_log_std = &(&grad_action * &one_minus_a2) * &noise + &((&jacobian * &noise - 1.0) * &glp);
        grad_log_std *= &sample.log_std_pass;

        if sample.fallback {
            grad_mean.fill(0.0);
            grad_log_std.fill(0.0);
        }

        let error = concatenate![Axis(1), grad_mean, grad_log_std];
        let (_, gradients) = self.network.backward_batch(error.view())?;
        Ok(gradients)
    }

    pub fn apply_gradients<O: Optimizer + ?Sized>(
        &mut self,
        optimizer: &mut O,
        gradients: &[DenseGradients],
        learning_rate: f32,
    ) {
        self.network.apply_gradients(optimizer, gradients, learning_rate);
    }

    /// Copy of this policy with N(0, scale²) noise on every network parameter
    pub fn perturbed<R: Rng + ?Sized>(&self, scale: f32, rng: &mut R) -> Self {
        let mut clone = self.clone();
        clone.network.perturb(scale, rng);
        clone.network.clear_cache();
        clone
    }

    pub fn regime_transition_history(&self) -> impl Iterator<Item = &RegimePair> {
        self.transition_history.iter()
    }

    pub(crate) fn restore_stage(&mut self, stage: usize) -> Result<()> {
        self.network.restore_stage(stage)
    }
}

/// 1 where `lo <= v <= hi`, else 0
fn clamp_mask(values: &Array2<f32>, lo: f32, hi: f32) -> Array2<f32> {
    values.mapv(|v| if (lo..=hi).contains(&v) { 1.0 } else { 0.0 })
}
