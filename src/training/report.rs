use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithms::ProgressiveSac;
use crate::error::Result;
use crate::types::RegimeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeTransitionCount {
    pub from: RegimeId,
    pub to: RegimeId,
    pub count: u64,
}

/// Summary of a training run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episode_rewards: Vec<f32>,
    /// Evaluation score at each curriculum check
    pub curriculum_metrics: Vec<f32>,
    pub final_stage: usize,
    pub total_steps: u64,
    pub episodes: u64,
    pub regime_transitions: Vec<RegimeTransitionCount>,
}

impl TrainingReport {
    pub fn from_agent(agent: &ProgressiveSac, episode_rewards: Vec<f32>, curriculum_metrics: Vec<f32>) -> Self {
        TrainingReport {
            episode_rewards,
            curriculum_metrics,
            final_stage: agent.curriculum_stage(),
            total_steps: agent.total_steps(),
            episodes: agent.episodes(),
            regime_transitions: agent
                .regime_transitions()
                .iter()
                .map(|(&(from, to), &count)| RegimeTransitionCount { from, to, count })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
