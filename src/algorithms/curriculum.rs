use serde::{Serialize, Deserialize};
use tracing::info;

/// Highest curriculum stage
pub const MAX_CURRICULUM_STAGE: usize = 3;

/// Relative weights of the training objectives, reshaped at curriculum advances
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    #[serde(rename = "return")]
    pub return_weight: f32,
    pub risk: f32,
    pub regime_robustness: f32,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        ObjectiveWeights {
            return_weight: 1.0,
            risk: 0.5,
            regime_robustness: 0.3,
        }
    }
}

/// Exploration schedule
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub initial_noise: f32,
    /// Multiplicative decay applied after every noisy action
    pub decay: f32,
    /// Noise is only added while above this floor
    pub min_noise: f32,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        ExplorationConfig {
            initial_noise: 0.1,
            decay: 0.9999,
            min_noise: 0.01,
        }
    }
}

/// Monotone curriculum over stages `1..=3`.
///
/// `thresholds[k - 1]` is the metric required to enter stage `k`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurriculumState {
    stage: usize,
    thresholds: Vec<f32>,
    exploration_noise: f32,
    exploration: ExplorationConfig,
    objective_weights: ObjectiveWeights,
}

impl CurriculumState {
    pub fn new(thresholds: Vec<f32>, exploration: ExplorationConfig, objective_weights: ObjectiveWeights) -> Self {
        CurriculumState {
            stage: 1,
            thresholds,
            exploration_noise: exploration.initial_noise,
            exploration,
            objective_weights,
        }
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn threshold(&self, stage: usize) -> Option<f32> {
        stage.checked_sub(1).and_then(|i| self.thresholds.get(i)).copied()
    }

    pub fn exploration_noise(&self) -> f32 {
        self.exploration_noise
    }

    pub fn objective_weights(&self) -> ObjectiveWeights {
        self.objective_weights
    }

    /// Noise scale to add to the next action, decaying the schedule.
    ///
    /// `None` once the noise has fallen to the floor.
    pub fn next_exploration_noise(&mut self) -> Option<f32> {
        if self.exploration_noise <= self.exploration.min_noise {
            return None;
        }
        let current = self.exploration_noise;
        self.exploration_noise = (current * self.exploration.decay).max(self.exploration.min_noise);
        Some(current)
    }

    /// Advance one stage if `metric` clears the next threshold.
    ///
    /// Entering stage 2 halves the noise and raises the risk weight by half;
    /// entering stage 3 halves the noise again and doubles the robustness
    /// weight. Returns the new stage.
    pub fn try_advance(&mut self, metric: f32) -> Option<usize> {
        if self.stage >= MAX_CURRICULUM_STAGE {
            return None;
        }
        let next = self.stage + 1;
        let threshold = self.threshold(next)?;
        if !(metric >= threshold) {
            return None;
        }

        self.stage = next;
        self.exploration_noise *= 0.5;
        match next {
            2 => self.objective_weights.risk *= 1.5,
            3 => self.objective_weights.regime_robustness *= 2.0,
            _ => {}
        }
        info!(
            stage = next,
            metric,
            exploration_noise = self.exploration_noise,
            "Advanced curriculum stage"
        );
        Some(next)
    }

    pub(crate) fn restore(&mut self, stage: usize, exploration_noise: f32, objective_weights: ObjectiveWeights) {
        self.stage = stage.clamp(1, MAX_CURRICULUM_STAGE);
        self.exploration_noise = exploration_noise;
        self.objective_weights = objective_weights;
    }
}
