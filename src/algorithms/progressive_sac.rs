use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithms::checkpoint::Checkpoint;
use crate::algorithms::curriculum::{CurriculumState, ObjectiveWeights};
use crate::algorithms::ensemble::{EnsembleAction, PolicyEnsemble};
use crate::config::SacConfig;
use crate::error::{Result, SacError};
use crate::network::{CriticNetwork, PolicyNetwork};
use crate::optimizer::{GradientClipper, Optimizer, OptimizerWrapper};
use crate::replay_buffer::{PrioritizedReplayBuffer, SampledBatch, Transition};
use crate::types::{RegimeId, RegimePair};

/// Added to TD errors before they become priorities
const PRIORITY_EPSILON: f32 = 1e-6;

/// Losses and temperature from one update step
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    pub critic_loss: f32,
    pub q1_loss: f32,
    pub q2_loss: f32,
    pub policy_loss: f32,
    pub alpha_loss: f32,
    pub alpha: f32,
    pub mean_td_error: f32,
}

/// Regime-aware progressive Soft Actor-Critic.
///
/// Owns the replay buffer, the policy, two critics with their targets, the
/// optimizers, the curriculum and all step/episode/regime bookkeeping. Counters
/// are only mutated through its own methods.
pub struct ProgressiveSac {
    config: SacConfig,
    policy: PolicyNetwork,
    critic1: CriticNetwork,
    critic2: CriticNetwork,
    critic1_target: CriticNetwork,
    critic2_target: CriticNetwork,
    policy_optimizer: OptimizerWrapper,
    critic1_optimizer: OptimizerWrapper,
    critic2_optimizer: OptimizerWrapper,
    clipper: GradientClipper,
    replay_buffer: PrioritizedReplayBuffer,
    curriculum: CurriculumState,
    ensemble: Option<PolicyEnsemble>,
    total_steps: u64,
    episodes: u64,
    update_count: u64,
    current_regime: Option<RegimeId>,
    regime_history: Vec<RegimeId>,
    regime_transitions: BTreeMap<RegimePair, u64>,
    rng: StdRng,
}

impl ProgressiveSac {
    pub fn new(config: SacConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let device = config.device;

        let policy = PolicyNetwork::new(
            config.state_dim,
            config.action_dim,
            &config.hidden_dims,
            config.activation,
            config.max_stages,
            config.alpha,
            device,
            &mut rng,
        );
        let critic = |rng: &mut StdRng| {
            CriticNetwork::new(
                config.state_dim,
                config.action_dim,
                &config.hidden_dims,
                config.activation,
                config.max_stages,
                device,
                rng,
            )
        };
        let critic1 = critic(&mut rng);
        let critic2 = critic(&mut rng);
        let critic1_target = critic1.clone();
        let critic2_target = critic2.clone();

        let replay_buffer = PrioritizedReplayBuffer::new(
            config.replay.capacity,
            config.replay.alpha,
            config.replay.beta_start,
            config.replay.beta_frames,
            device,
        );
        let curriculum = CurriculumState::new(
            config.curriculum_thresholds.clone(),
            config.exploration,
            config.objective_weights,
        );

        info!(
            state_dim = config.state_dim,
            action_dim = config.action_dim,
            device = device.name(),
            "Initialized Progressive SAC"
        );

        let optimizer = config.optimizer;
        Ok(ProgressiveSac {
            clipper: GradientClipper::from_max_norm(config.max_grad_norm),
            config,
            policy,
            critic1,
            critic2,
            critic1_target,
            critic2_target,
            policy_optimizer: OptimizerWrapper::from_kind(optimizer),
            critic1_optimizer: OptimizerWrapper::from_kind(optimizer),
            critic2_optimizer: OptimizerWrapper::from_kind(optimizer),
            replay_buffer,
            curriculum,
            ensemble: None,
            total_steps: 0,
            episodes: 0,
            update_count: 0,
            current_regime: None,
            regime_history: Vec::new(),
            regime_transitions: BTreeMap::new(),
            rng,
        })
    }

    /// Pick an action for one state.
    ///
    /// With `evaluate` the squashed policy mean is returned and no counter
    /// moves. Otherwise the first `start_steps` calls act uniformly at random,
    /// later calls sample the policy and add the decaying exploration noise;
    /// each such call counts one environment step.
    pub fn select_action(
        &mut self,
        state: ArrayView1<f32>,
        evaluate: bool,
        regime: Option<RegimeId>,
    ) -> Result<Array1<f32>> {
        if state.len() != self.config.state_dim {
            return Err(SacError::dimension_mismatch(
                format!("state of length {}", self.config.state_dim),
                format!("state of length {}", state.len()),
            ));
        }
        if let Some(regime) = regime {
            self.handle_regime_transition(regime);
        }

        let batch = state.insert_axis(Axis(0));
        if evaluate {
            let action = self.policy.deterministic_action(batch, regime, &mut self.rng)?;
            return Ok(action.index_axis_move(Axis(0), 0));
        }

        let action = if self.total_steps < self.config.start_steps {
            let uniform = Uniform::new_inclusive(-1.0f32, 1.0);
            Array1::from_iter((0..self.config.action_dim).map(|_| uniform.sample(&mut self.rng)))
        } else {
            let sample = self.policy.sample(batch, regime, &mut self.rng)?;
            let mut action = sample.action.index_axis_move(Axis(0), 0);
            if let Some(noise) = self.curriculum.next_exploration_noise() {
                if let Ok(dist) = Normal::new(0.0f32, noise) {
                    action.mapv_inplace(|a| (a + dist.sample(&mut self.rng)).clamp(-1.0, 1.0));
                }
            }
            action
        };

        self.total_steps += 1;
        Ok(action)
    }

    /// Store one transition in the replay buffer
    pub fn push_transition(&mut self, transition: Transition) -> Result<()> {
        let expected = (self.config.state_dim, self.config.action_dim);
        let actual = (transition.state.len(), transition.action.len());
        if actual != expected || transition.next_state.len() != expected.0 {
            return Err(SacError::dimension_mismatch(
                format!("state/action of {:?}", expected),
                format!("state/action of {:?}", actual),
            ));
        }
        self.replay_buffer.push(transition);
        Ok(())
    }

    /// Whether the update cadence calls for updates at the current step
    pub fn should_update(&self) -> bool {
        self.total_steps > self.config.update_after
            && self.total_steps % self.config.update_every == 0
            && self.replay_buffer.can_sample(self.config.batch_size)
    }

    /// Track a regime change and make sure its parameters exist.
    ///
    /// A no-op when `new_regime` is already the current regime.
    pub fn handle_regime_transition(&mut self, new_regime: RegimeId) {
        if self.current_regime == Some(new_regime) {
            return;
        }
        if let Some(previous) = self.current_regime {
            *self.regime_transitions.entry((previous, new_regime)).or_insert(0) += 1;
            info!(from = previous, to = new_regime, "Regime transition");
        }
        self.current_regime = Some(new_regime);
        self.regime_history.push(new_regime);
        self.ensure_regime(new_regime);
    }

    /// Create the per-regime temperature and critic heads for `regime` if missing
    pub fn ensure_regime(&mut self, regime: RegimeId) {
        if self.policy.ensure_regime(regime) {
            debug!(regime, "Created regime parameters");
        }
        self.critic1.add_regime_head(regime, &mut self.rng);
        self.critic2.add_regime_head(regime, &mut self.rng);
        self.critic1_target.add_regime_head(regime, &mut self.rng);
        self.critic2_target.add_regime_head(regime, &mut self.rng);
        if let Some(ensemble) = self.ensemble.as_mut() {
            ensemble.ensure_regime(regime);
        }
    }

    /// One SAC step on a prioritized batch.
    ///
    /// Regresses both critics to the soft Bellman target, steps the policy and
    /// temperature, Polyak-updates the targets every `target_update_interval`
    /// updates and writes fresh TD errors back as priorities.
    pub fn update_parameters(&mut self, batch_size: Option<usize>, regime: Option<RegimeId>) -> Result<UpdateStats> {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        let batch = self.replay_buffer.sample(batch_size, regime, &mut self.rng)?;
        let alpha_regime = batch.dominant_regime();
        let alpha = self.policy.get_alpha(alpha_regime);

        let target_q = self.soft_target(&batch, alpha)?;

        self.critic1_optimizer.begin_step();
        self.critic2_optimizer.begin_step();
        let lr = self.config.critic_lr;
        let q1_loss = critic_step(&mut self.critic1, &mut self.critic1_optimizer, &self.clipper, &batch, &target_q, lr)?;
        let q2_loss = critic_step(&mut self.critic2, &mut self.critic2_optimizer, &self.clipper, &batch, &target_q, lr)?;

        let (policy_loss, log_probs) = self.policy_step(batch.states.view(), alpha)?;

        let alpha_loss = if self.config.auto_entropy_tuning {
            self.policy.update_alpha(log_probs.view(), alpha_regime)
        } else {
            0.0
        };

        self.update_count += 1;
        if self.update_count % self.config.target_update_interval == 0 {
            self.soft_update_targets();
        }

        let td_errors = self.td_errors(&batch)?;
        let priorities: Vec<f32> = td_errors.iter().map(|&e| e + PRIORITY_EPSILON).collect();
        self.replay_buffer.update_priorities(&batch.indices, &priorities);

        Ok(UpdateStats {
            critic_loss: q1_loss + q2_loss,
            q1_loss,
            q2_loss,
            policy_loss,
            alpha_loss,
            alpha: self.policy.get_alpha(alpha_regime),
            mean_td_error: td_errors.mean().unwrap_or(0.0),
        })
    }

    /// `r + (1 − done)·γ·(min(Q1', Q2')(s', a') − α·log π(a'|s'))` with `a'` drawn now
    fn soft_target(&mut self, batch: &SampledBatch, alpha: f32) -> Result<Array1<f32>> {
        let next = self.policy.sample(batch.next_states.view(), None, &mut self.rng)?;
        let next_q1 = self.critic1_target.predict_q(batch.next_states.view(), next.action.view())?;
        let next_q2 = self.critic2_target.predict_q(batch.next_states.view(), next.action.view())?;

        let gamma = self.config.gamma;
        Ok(Zip::from(&batch.rewards)
            .and(&batch.dones)
            .and(&next_q1)
            .and(&next_q2)
            .and(&next.log_prob)
            .map_collect(|&r, &done, &q1, &q2, &lp| r + (1.0 - done) * gamma * (q1.min(q2) - alpha * lp)))
    }

    /// Minimize `mean(α·log π(a|s) − min(Q1, Q2)(s, a))` for freshly sampled `a`
    fn policy_step(&mut self, states: ArrayView2<f32>, alpha: f32) -> Result<(f32, Array1<f32>)> {
        let sample = self.policy.sample(states, None, &mut self.rng)?;
        let n = sample.action.nrows() as f32;

        let q1 = self.critic1.predict_q(states, sample.action.view())?;
        let q2 = self.critic2.predict_q(states, sample.action.view())?;
        let use_q1 = Zip::from(&q1).and(&q2).map_collect(|&a, &b| if a <= b { 1.0f32 } else { 0.0 });
        let use_q2 = use_q1.mapv(|u| 1.0 - u);

        let dq1 = self.critic1.action_gradient(states, sample.action.view(), use_q1.view())?;
        let dq2 = self.critic2.action_gradient(states, sample.action.view(), use_q2.view())?;
        let grad_action = (dq1 + dq2).mapv(|g| -g / n);
        let grad_log_prob = Array1::from_elem(sample.log_prob.len(), alpha / n);

        let min_q = Zip::from(&q1).and(&q2).map_collect(|&a, &b| a.min(b));
        let policy_loss = Zip::from(&sample.log_prob)
            .and(&min_q)
            .fold(0.0f32, |acc, &lp, &q| acc + alpha * lp - q)
            / n;

        let mut gradients = self.policy.backward(&sample, grad_action.view(), grad_log_prob.view())?;
        let mut parts: Vec<_> = gradients.iter_mut().collect();
        self.clipper.clip(&mut parts);

        self.policy_optimizer.begin_step();
        self.policy.apply_gradients(&mut self.policy_optimizer, &gradients, self.config.policy_lr);

        Ok((policy_loss, sample.log_prob))
    }

    /// `max(|Q1 − y|, |Q2 − y|)` under the current critics and a fresh target
    fn td_errors(&mut self, batch: &SampledBatch) -> Result<Array1<f32>> {
        let q1 = self.critic1.predict_q(batch.states.view(), batch.actions.view())?;
        let q2 = self.critic2.predict_q(batch.states.view(), batch.actions.view())?;
        let alpha = self.policy.get_alpha(batch.dominant_regime());
        let target = self.soft_target(batch, alpha)?;
        Ok(Zip::from(&q1)
            .and(&q2)
            .and(&target)
            .map_collect(|&a, &b, &y| (a - y).abs().max((b - y).abs())))
    }

    /// Polyak-average both target critics toward the live critics
    pub fn soft_update_targets(&mut self) {
        let tau = self.config.tau;
        self.critic1_target.soft_update_from(&self.critic1, tau);
        self.critic2_target.soft_update_from(&self.critic2, tau);
    }

    /// Advance the curriculum if `performance_metric` clears the next threshold.
    ///
    /// On advance the policy and all four critics grow by one stage; entering
    /// stage 3 also builds the policy ensemble.
    pub fn increase_curriculum_stage(&mut self, performance_metric: f32) -> bool {
        let Some(stage) = self.curriculum.try_advance(performance_metric) else {
            return false;
        };

        if let Some(snapshot) = self.policy.increase_complexity() {
            debug!(previous_stage = snapshot.stage, "Policy stage advanced");
        }
        for critic in [
            &mut self.critic1,
            &mut self.critic2,
            &mut self.critic1_target,
            &mut self.critic2_target,
        ] {
            critic.increase_complexity();
        }

        if stage >= 3 {
            self.initialize_ensemble();
        }
        true
    }

    fn initialize_ensemble(&mut self) {
        if self.ensemble.is_none() {
            self.ensemble = Some(PolicyEnsemble::from_policy(
                &self.policy,
                self.config.ensemble_size,
                self.config.ensemble_noise_scale,
                &mut self.rng,
            ));
        }
    }

    /// Ensemble mean action and disagreement, once the ensemble exists
    pub fn ensemble_action(&mut self, state: ArrayView1<f32>, regime: Option<RegimeId>) -> Result<Option<EnsembleAction>> {
        match self.ensemble.as_mut() {
            Some(ensemble) => ensemble.action(state, regime, &mut self.rng).map(Some),
            None => Ok(None),
        }
    }

    pub fn finish_episode(&mut self) {
        self.episodes += 1;
    }

    /// Switch the policy between training and evaluation behavior
    pub fn set_training(&mut self, training: bool) {
        self.policy.set_training(training);
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let checkpoint = Checkpoint {
            state_dim: self.config.state_dim,
            action_dim: self.config.action_dim,
            policy: self.policy.clone(),
            critic1: self.critic1.clone(),
            critic2: self.critic2.clone(),
            critic1_target: self.critic1_target.clone(),
            critic2_target: self.critic2_target.clone(),
            policy_optimizer: self.policy_optimizer.clone(),
            critic1_optimizer: self.critic1_optimizer.clone(),
            critic2_optimizer: self.critic2_optimizer.clone(),
            total_steps: self.total_steps,
            episodes: self.episodes,
            update_count: self.update_count,
            curriculum_stage: self.curriculum.stage(),
            exploration_noise: self.curriculum.exploration_noise(),
            objective_weights: self.curriculum.objective_weights(),
            current_regime: self.current_regime,
            regime_history: self.regime_history.clone(),
            regime_transitions: self.regime_transitions.clone(),
        };
        checkpoint.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Model saved");
        Ok(())
    }

    /// Restore from a checkpoint written by an agent of the same dimensions.
    ///
    /// The replay buffer is left as it is.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let checkpoint = Checkpoint::load(path.as_ref())?;

        let expected = (self.config.state_dim, self.config.action_dim);
        let found = (checkpoint.state_dim, checkpoint.action_dim);
        if expected != found {
            return Err(SacError::dimension_mismatch(format!("{:?}", expected), format!("{:?}", found)));
        }
        let expected_shapes: Vec<Vec<usize>> = self.policy.network.stages().iter().map(|s| s.shape()).collect();
        let found_shapes: Vec<Vec<usize>> = checkpoint.policy.network.stages().iter().map(|s| s.shape()).collect();
        if expected_shapes != found_shapes {
            return Err(SacError::dimension_mismatch(
                format!("policy stages {:?}", expected_shapes),
                format!("policy stages {:?}", found_shapes),
            ));
        }

        self.policy = checkpoint.policy;
        self.critic1 = checkpoint.critic1;
        self.critic2 = checkpoint.critic2;
        self.critic1_target = checkpoint.critic1_target;
        self.critic2_target = checkpoint.critic2_target;
        self.policy_optimizer = checkpoint.policy_optimizer;
        self.critic1_optimizer = checkpoint.critic1_optimizer;
        self.critic2_optimizer = checkpoint.critic2_optimizer;
        self.total_steps = checkpoint.total_steps;
        self.episodes = checkpoint.episodes;
        self.update_count = checkpoint.update_count;
        self.current_regime = checkpoint.current_regime;
        self.regime_history = checkpoint.regime_history;
        self.regime_transitions = checkpoint.regime_transitions;
        self.curriculum.restore(
            checkpoint.curriculum_stage,
            checkpoint.exploration_noise,
            checkpoint.objective_weights,
        );

        let network_stage = self.curriculum.stage().min(self.policy.network.max_stages());
        self.policy.restore_stage(network_stage)?;
        for critic in [
            &mut self.critic1,
            &mut self.critic2,
            &mut self.critic1_target,
            &mut self.critic2_target,
        ] {
            critic.restore_stage(network_stage)?;
        }

        self.ensemble = None;
        if self.curriculum.stage() >= 3 {
            self.initialize_ensemble();
        }

        info!(path = %path.as_ref().display(), stage = self.curriculum.stage(), "Model loaded");
        Ok(())
    }

    pub fn config(&self) -> &SacConfig {
        &self.config
    }

    pub fn policy(&self) -> &PolicyNetwork {
        &self.policy
    }

    pub fn critics(&self) -> [&CriticNetwork; 4] {
        [&self.critic1, &self.critic2, &self.critic1_target, &self.critic2_target]
    }

    pub fn replay_buffer(&self) -> &PrioritizedReplayBuffer {
        &self.replay_buffer
    }

    pub fn ensemble(&self) -> Option<&PolicyEnsemble> {
        self.ensemble.as_ref()
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn curriculum_stage(&self) -> usize {
        self.curriculum.stage()
    }

    pub fn exploration_noise(&self) -> f32 {
        self.curriculum.exploration_noise()
    }

    pub fn objective_weights(&self) -> ObjectiveWeights {
        self.curriculum.objective_weights()
    }

    pub fn current_regime(&self) -> Option<RegimeId> {
        self.current_regime
    }

    pub fn regime_history(&self) -> &[RegimeId] {
        &self.regime_history
    }

    pub fn regime_transitions(&self) -> &BTreeMap<RegimePair, u64> {
        &self.regime_transitions
    }

    /// The agent's generator, for callers that need reproducible sampling
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// Weighted MSE step of one critic toward `target_q`; returns the loss.
fn critic_step(
    critic: &mut CriticNetwork,
    optimizer: &mut OptimizerWrapper,
    clipper: &GradientClipper,
    batch: &SampledBatch,
    target_q: &Array1<f32>,
    learning_rate: f32,
) -> Result<f32> {
    let q = critic.get_q_value(batch.states.view(), batch.actions.view())?;
    let n = q.len() as f32;
    let diff = &q - target_q;
    let loss = (&batch.weights * &diff.mapv(|d| d * d)).sum() / n;
    let grad_q = &batch.weights * &diff * (2.0 / n);

    let (_, mut gradients) = critic.backward_q(grad_q.view())?;
    clipper.clip(&mut gradients.parts_mut());
    critic.apply_gradients(optimizer, &gradients, learning_rate);
    Ok(loss)
}

/// Builder for [`ProgressiveSac`]
pub struct ProgressiveSacBuilder {
    config: SacConfig,
}

impl ProgressiveSacBuilder {
    pub fn new(state_dim: usize, action_dim: usize) -> Self {
        ProgressiveSacBuilder { config: SacConfig::new(state_dim, action_dim) }
    }

    /// Start from a complete configuration
    pub fn from_config(config: SacConfig) -> Self {
        ProgressiveSacBuilder { config }
    }

    pub fn hidden_dims(mut self, dims: Vec<usize>) -> Self {
        self.config.hidden_dims = dims;
        self
    }

    pub fn max_stages(mut self, max_stages: usize) -> Self {
        self.config.max_stages = max_stages;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.replay.capacity = capacity;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn tau(mut self, tau: f32) -> Self {
        self.config.tau = tau;
        self
    }

    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.config.policy_lr = lr;
        self.config.critic_lr = lr;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.config.alpha = alpha;
        self
    }

    pub fn auto_entropy_tuning(mut self, auto: bool) -> Self {
        self.config.auto_entropy_tuning = auto;
        self
    }

    pub fn start_steps(mut self, steps: u64) -> Self {
        self.config.start_steps = steps;
        self
    }

    pub fn update_schedule(mut self, update_after: u64, update_every: u64, num_updates: usize) -> Self {
        self.config.update_after = update_after;
        self.config.update_every = update_every;
        self.config.num_updates = num_updates;
        self
    }

    pub fn curriculum_thresholds(mut self, thresholds: Vec<f32>) -> Self {
        self.config.curriculum_thresholds = thresholds;
        self
    }

    pub fn max_grad_norm(mut self, max_norm: f32) -> Self {
        self.config.max_grad_norm = Some(max_norm);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<ProgressiveSac> {
        ProgressiveSac::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::optimizer::OptimizerKind;
    use ndarray::array;

    fn agent() -> ProgressiveSac {
        ProgressiveSacBuilder::new(4, 1)
            .hidden_dims(vec![16, 16])
            .buffer_capacity(256)
            .batch_size(8)
            .start_steps(0)
            .seed(42)
            .build()
            .unwrap()
    }

    fn fill(agent: &mut ProgressiveSac, n: usize) {
        for i in 0..n {
            let x = i as f32 * 0.1;
            agent
                .push_transition(Transition {
                    state: array![x, -x, 0.5, 1.0],
                    action: array![x.sin()],
                    reward: x.cos(),
                    next_state: array![x + 0.1, -x - 0.1, 0.5, 1.0],
                    done: i % 10 == 9,
                    regime: (i % 2) as RegimeId + 1,
                })
                .unwrap();
        }
    }

    #[test]
    fn test_sac_creation() {
        let agent = agent();
        assert_eq!(agent.total_steps(), 0);
        assert_eq!(agent.curriculum_stage(), 1);
        assert!((agent.exploration_noise() - 0.1).abs() < 1e-7);
    }

    #[test]
    fn test_select_action_counts_steps() {
        let mut agent = agent();
        let state = array![0.1, 0.2, 0.3, 0.4];
        let a = agent.select_action(state.view(), false, Some(1)).unwrap();
        assert_eq!(a.len(), 1);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(agent.total_steps(), 1);

        agent.select_action(state.view(), true, Some(1)).unwrap();
        assert_eq!(agent.total_steps(), 1);
    }

    #[test]
    fn test_random_phase_then_policy() {
        let mut agent = ProgressiveSacBuilder::new(4, 2).start_steps(2).seed(1).build().unwrap();
        let state = array![0.0, 0.0, 0.0, 0.0];
        for _ in 0..4 {
            let a = agent.select_action(state.view(), false, None).unwrap();
            assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
        assert_eq!(agent.total_steps(), 4);
        // noise was applied (and decayed) only for policy actions
        assert!(agent.exploration_noise() < 0.1);
    }

    #[test]
    fn test_regime_transitions_tracked() {
        let mut agent = agent();
        for r in [1, 1, 2, 1, 3] {
            agent.handle_regime_transition(r);
        }
        assert_eq!(agent.regime_history(), &[1, 2, 1, 3]);
        assert_eq!(agent.regime_transitions().get(&(1, 2)), Some(&1));
        assert_eq!(agent.regime_transitions().get(&(2, 1)), Some(&1));
        assert_eq!(agent.current_regime(), Some(3));
        assert!(agent.policy().has_regime(3));
        assert!(agent.critics().iter().all(|c| c.has_regime_head(3)));
    }

    #[test]
    fn test_update_parameters_runs() {
        let mut agent = agent();
        fill(&mut agent, 32);
        let stats = agent.update_parameters(None, Some(1)).unwrap();
        assert!(stats.critic_loss.is_finite());
        assert!(stats.policy_loss.is_finite());
        assert!(stats.alpha > 0.0);
        assert!((stats.critic_loss - stats.q1_loss - stats.q2_loss).abs() < 1e-5);
        assert_eq!(agent.update_count(), 1);
    }

    #[test]
    fn test_update_writes_td_priorities_to_sampled_slots() {
        let mut agent = agent();
        fill(&mut agent, 32);
        assert!((0..32).all(|i| agent.replay_buffer().priority(i) == Some(1.0)));

        // replay the draw the update is about to make
        let mut rng = agent.rng.clone();
        let mut buffer = agent.replay_buffer.clone();
        let sampled: BTreeSet<usize> = buffer.sample(8, Some(1), &mut rng).unwrap().indices.into_iter().collect();

        agent.update_parameters(None, Some(1)).unwrap();
        for slot in 0..32 {
            let priority = agent.replay_buffer().priority(slot).unwrap();
            if sampled.contains(&slot) {
                assert!(priority.is_finite() && priority >= PRIORITY_EPSILON);
                assert_ne!(priority, 1.0);
            } else {
                assert_eq!(priority, 1.0, "slot {slot} was not sampled");
            }
        }
    }

    #[test]
    fn test_targets_follow_live_critics_on_interval() {
        let config = SacConfig {
            hidden_dims: vec![16, 16],
            batch_size: 8,
            start_steps: 0,
            target_update_interval: 2,
            seed: Some(11),
            replay: crate::config::ReplayConfig { capacity: 64, ..Default::default() },
            ..SacConfig::new(4, 1)
        };
        let mut agent = ProgressiveSac::new(config).unwrap();
        fill(&mut agent, 32);

        let states = array![[0.1, -0.1, 0.5, 1.0], [0.7, -0.7, 0.5, 1.0]];
        let actions = array![[0.2], [-0.4]];
        let q = |c: &CriticNetwork| c.predict_q(states.view(), actions.view()).unwrap();

        let before = q(&agent.critic1_target);
        agent.update_parameters(None, None).unwrap();
        assert_eq!(q(&agent.critic1_target), before);
        assert_ne!(q(&agent.critic1), before);

        let mut expected = agent.critic1_target.clone();
        agent.update_parameters(None, None).unwrap();
        expected.soft_update_from(&agent.critic1, agent.config.tau);
        assert_ne!(q(&agent.critic1_target), before);
        assert_eq!(q(&agent.critic1_target), q(&expected));
    }

    #[test]
    fn test_optimizer_kind_from_config() {
        let config = SacConfig { optimizer: OptimizerKind::Sgd, seed: Some(2), ..SacConfig::new(4, 1) };
        let agent = ProgressiveSac::new(config).unwrap();
        assert_eq!(agent.policy_optimizer.kind(), OptimizerKind::Sgd);
        assert_eq!(agent.critic2_optimizer.kind(), OptimizerKind::Sgd);
        assert_eq!(ProgressiveSacBuilder::new(4, 1).build().unwrap().critic1_optimizer.kind(), OptimizerKind::Adam);
    }

    #[test]
    fn test_update_requires_data() {
        let mut agent = agent();
        fill(&mut agent, 3);
        assert!(matches!(
            agent.update_parameters(None, None),
            Err(SacError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_critic_loss_decreases_on_fixed_batch() {
        let mut agent = ProgressiveSacBuilder::new(4, 1)
            .hidden_dims(vec![32, 32])
            .buffer_capacity(64)
            .batch_size(16)
            .gamma(0.0)
            .learning_rate(1e-3)
            .seed(3)
            .build()
            .unwrap();
        fill(&mut agent, 16);
        let first = agent.update_parameters(None, None).unwrap().critic_loss;
        let mut last = first;
        for _ in 0..200 {
            last = agent.update_parameters(None, None).unwrap().critic_loss;
        }
        assert!(last < first, "{last} !< {first}");
    }

    #[test]
    fn test_curriculum_grows_networks() {
        let mut agent = agent();
        assert!(!agent.increase_curriculum_stage(0.3));
        assert!(agent.increase_curriculum_stage(0.6));
        assert_eq!(agent.policy().stage(), 2);
        assert!(agent.critics().iter().all(|c| c.stage() == 2));
        assert!(agent.ensemble().is_none());

        assert!(agent.increase_curriculum_stage(0.9));
        assert_eq!(agent.ensemble().map(|e| e.len()), Some(3));
        let out = agent.ensemble_action(array![0.1, 0.2, 0.3, 0.4].view(), None).unwrap();
        assert!(out.is_some());
    }

    #[test]
    fn test_should_update_cadence() {
        let mut agent = ProgressiveSacBuilder::new(4, 1)
            .buffer_capacity(64)
            .batch_size(4)
            .start_steps(100)
            .update_schedule(2, 3, 1)
            .seed(9)
            .build()
            .unwrap();
        fill(&mut agent, 8);
        let state = array![0.0, 0.0, 0.0, 0.0];
        let mut triggered = Vec::new();
        for _ in 0..9 {
            agent.select_action(state.view(), false, None).unwrap();
            if agent.should_update() {
                triggered.push(agent.total_steps());
            }
        }
        assert_eq!(triggered, vec![3, 6, 9]);
    }
}
