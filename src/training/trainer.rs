use std::path::PathBuf;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithms::ProgressiveSac;
use crate::error::{Result, SacError};
use crate::market::{MarketFrame, RegimeClassifier, RewardFunction, StateEncoder};
use crate::metrics::MetricsTracker;
use crate::replay_buffer::Transition;
use crate::training::evaluation::{evaluate_agent, EvaluationConfig};
use crate::training::report::TrainingReport;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub episodes: usize,
    /// Bars per episode; the whole frame when absent
    pub max_steps: Option<usize>,
    /// Episodes between evaluation, curriculum check and checkpoint
    pub eval_interval: usize,
    pub log_interval: usize,
    pub evaluation: EvaluationConfig,
    /// Directory for periodic and final checkpoints; none are written when absent
    pub checkpoint_dir: Option<PathBuf>,
    pub checkpoint_prefix: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            episodes: 1000,
            max_steps: None,
            eval_interval: 10,
            log_interval: 10,
            evaluation: EvaluationConfig::default(),
            checkpoint_dir: None,
            checkpoint_prefix: "progressive_sac".to_string(),
        }
    }
}

/// Runs training episodes of an agent over a market frame.
///
/// Episode starts follow the curriculum: stage 1 only starts in regime 1
/// bars, stage 2 in regimes up to 2, later stages anywhere.
pub struct Trainer<E, C, W> {
    config: TrainerConfig,
    encoder: E,
    classifier: C,
    reward: W,
    tracker: MetricsTracker,
}

impl<E, C, W> Trainer<E, C, W>
where
    E: StateEncoder,
    C: RegimeClassifier,
    W: RewardFunction,
{
    pub fn new(config: TrainerConfig, encoder: E, classifier: C, reward: W) -> Self {
        Trainer { config, encoder, classifier, reward, tracker: MetricsTracker::default() }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &MetricsTracker {
        &self.tracker
    }

    pub fn train(&mut self, agent: &mut ProgressiveSac, frame: &MarketFrame) -> Result<TrainingReport> {
        let state_dim = self.encoder.state_dim(frame);
        if state_dim != agent.config().state_dim {
            return Err(SacError::dimension_mismatch(
                format!("agent state_dim {}", agent.config().state_dim),
                format!("encoded state of length {}", state_dim),
            ));
        }
        let required = self.encoder.warmup() + 2;
        if frame.len() < required {
            return Err(SacError::InsufficientData { required, available: frame.len() });
        }

        let mut episode_rewards = Vec::with_capacity(self.config.episodes);
        let mut curriculum_metrics = Vec::new();

        for episode in 1..=self.config.episodes {
            let start = self.start_index(agent, frame);
            let total_reward = self.run_episode(agent, frame, start)?;
            episode_rewards.push(total_reward);

            if self.config.log_interval > 0 && episode % self.config.log_interval == 0 {
                info!(
                    episode,
                    episodes = self.config.episodes,
                    avg_reward = self.tracker.avg_episode_reward(self.config.log_interval).unwrap_or(0.0),
                    avg_critic_loss = self.tracker.avg_critic_loss(100).unwrap_or(0.0),
                    stage = agent.curriculum_stage(),
                    "Training progress"
                );
            }

            if self.config.eval_interval > 0 && episode % self.config.eval_interval == 0 {
                let metric = evaluate_agent(agent, frame, &self.encoder, &self.classifier, &self.config.evaluation)?;
                curriculum_metrics.push(metric);
                self.tracker.record_custom("curriculum_metric", metric);
                if agent.increase_curriculum_stage(metric) {
                    info!(stage = agent.curriculum_stage(), metric, "Advanced curriculum stage");
                }
                self.checkpoint(agent, &format!("episode_{}", episode))?;
            }
        }

        self.checkpoint(agent, "final")?;
        Ok(TrainingReport::from_agent(agent, episode_rewards, curriculum_metrics))
    }

    /// Pick where the next episode starts
    fn start_index(&self, agent: &mut ProgressiveSac, frame: &MarketFrame) -> usize {
        let warmup = self.encoder.warmup();
        let stage = agent.curriculum_stage();
        let candidates: Vec<usize> = (warmup..frame.len() - 1)
            .filter(|&idx| {
                let regime = self.classifier.classify(frame, idx);
                match stage {
                    1 => regime == 1,
                    2 => regime <= 2,
                    _ => true,
                }
            })
            .collect();
        candidates.choose(agent.rng_mut()).copied().unwrap_or(warmup)
    }

    fn run_episode(&mut self, agent: &mut ProgressiveSac, frame: &MarketFrame, start: usize) -> Result<f32> {
        let max_steps = self.config.max_steps.unwrap_or(frame.len());
        let last = frame.len() - 1;
        let mut position = 0.0f32;

        self.tracker.start_episode();
        for idx in start..(start + max_steps).min(last) {
            let regime = self.classifier.classify(frame, idx);
            let state = self.encoder.encode(frame, idx)?;
            let action = agent.select_action(state.view(), false, Some(regime))?;
            let new_position = action.first().copied().unwrap_or(0.0);
            let reward = self.reward.reward(frame, idx, new_position, position);

            let next_state = self.encoder.encode(frame, idx + 1)?;
            let done = idx + 1 == last;
            agent.push_transition(Transition { state, action, reward, next_state, done, regime })?;

            if agent.should_update() {
                for _ in 0..agent.config().num_updates {
                    let stats = agent.update_parameters(None, Some(regime))?;
                    self.tracker.record_update(&stats);
                }
            }

            position = new_position;
            self.tracker.step(reward);
        }

        agent.finish_episode();
        Ok(self.tracker.end_episode())
    }

    fn checkpoint(&self, agent: &ProgressiveSac, suffix: &str) -> Result<()> {
        if let Some(dir) = &self.config.checkpoint_dir {
            let path = dir.join(format!("{}_{}.bin", self.config.checkpoint_prefix, suffix));
            agent.save(path)?;
        }
        Ok(())
    }
}
