use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithms::UpdateStats;

/// Bounded histories of training signals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub critic_losses: VecDeque<f32>,
    pub policy_losses: VecDeque<f32>,
    pub alpha_losses: VecDeque<f32>,

    /// Entropy temperature after each update
    pub alphas: VecDeque<f32>,

    pub td_errors: VecDeque<f32>,

    /// Rewards per episode
    pub episode_rewards: VecDeque<f32>,

    /// Episode lengths
    pub episode_lengths: VecDeque<usize>,

    pub custom_metrics: BTreeMap<String, VecDeque<f32>>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, limit: usize) {
    if queue.len() >= limit {
        queue.pop_front();
    }
    queue.push_back(value);
}

fn recent_mean(queue: &VecDeque<f32>, window: usize) -> Option<f32> {
    if queue.is_empty() || window == 0 {
        return None;
    }
    let n = window.min(queue.len());
    let sum: f32 = queue.iter().rev().take(n).sum();
    Some(sum / n as f32)
}

/// Tracks metrics during training
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    history_size: usize,

    // Episode tracking
    current_episode_reward: f32,
    current_episode_length: usize,
    episode_count: usize,

    total_steps: usize,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        MetricsTracker {
            metrics: TrainingMetrics::default(),
            history_size: history_size.max(1),
            current_episode_reward: 0.0,
            current_episode_length: 0,
            episode_count: 0,
            total_steps: 0,
        }
    }

    /// Record the outcome of one update step
    pub fn record_update(&mut self, stats: &UpdateStats) {
        let limit = self.history_size;
        push_bounded(&mut self.metrics.critic_losses, stats.critic_loss, limit);
        push_bounded(&mut self.metrics.policy_losses, stats.policy_loss, limit);
        push_bounded(&mut self.metrics.alpha_losses, stats.alpha_loss, limit);
        push_bounded(&mut self.metrics.alphas, stats.alpha, limit);
        push_bounded(&mut self.metrics.td_errors, stats.mean_td_error, limit);
    }

    /// Record a custom metric
    pub fn record_custom(&mut self, name: &str, value: f32) {
        let metric = self.metrics.custom_metrics.entry(name.to_string()).or_default();
        push_bounded(metric, value, self.history_size);
    }

    /// Start a new episode
    pub fn start_episode(&mut self) {
        self.current_episode_reward = 0.0;
        self.current_episode_length = 0;
    }

    /// Record a step within an episode
    pub fn step(&mut self, reward: f32) {
        self.current_episode_reward += reward;
        self.current_episode_length += 1;
        self.total_steps += 1;
    }

    /// End the current episode and return its total reward
    pub fn end_episode(&mut self) -> f32 {
        let limit = self.history_size;
        push_bounded(&mut self.metrics.episode_rewards, self.current_episode_reward, limit);
        push_bounded(&mut self.metrics.episode_lengths, self.current_episode_length, limit);
        self.episode_count += 1;
        self.current_episode_reward
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Mean critic loss over the last `window` updates
    pub fn avg_critic_loss(&self, window: usize) -> Option<f32> {
        recent_mean(&self.metrics.critic_losses, window)
    }

    /// Mean episode reward over the last `window` episodes
    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        recent_mean(&self.metrics.episode_rewards, window)
    }

    /// Save metrics as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(&self.metrics)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load metrics from file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> crate::error::Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.metrics = serde_json::from_str(&data)?;
        Ok(())
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_tracking() {
        let mut tracker = MetricsTracker::new(2);
        for rewards in [[1.0, 2.0], [0.5, 0.5], [-1.0, 0.0]] {
            tracker.start_episode();
            for r in rewards {
                tracker.step(r);
            }
            tracker.end_episode();
        }
        assert_eq!(tracker.episode_count(), 3);
        assert_eq!(tracker.total_steps(), 6);
        // history keeps the last two episodes only
        assert_eq!(tracker.metrics().episode_rewards, VecDeque::from(vec![1.0, -1.0]));
        assert_eq!(tracker.avg_episode_reward(10), Some(0.0));
    }

    #[test]
    fn test_record_update_and_persist() {
        let mut tracker = MetricsTracker::default();
        tracker.record_update(&UpdateStats { critic_loss: 2.0, alpha: 0.2, ..Default::default() });
        tracker.record_update(&UpdateStats { critic_loss: 4.0, alpha: 0.19, ..Default::default() });
        tracker.record_custom("sharpe", 1.5);
        assert_eq!(tracker.avg_critic_loss(2), Some(3.0));
        assert_eq!(tracker.avg_critic_loss(0), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        tracker.save(&path).unwrap();

        let mut restored = MetricsTracker::default();
        restored.load(&path).unwrap();
        assert_eq!(restored.metrics().alphas.len(), 2);
        assert_eq!(restored.metrics().custom_metrics["sharpe"], VecDeque::from(vec![1.5]));
    }
}
