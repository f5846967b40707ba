use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::algorithms::curriculum::ObjectiveWeights;
use crate::error::Result;
use crate::network::{CriticNetwork, PolicyNetwork};
use crate::optimizer::OptimizerWrapper;
use crate::types::{RegimeId, RegimePair};

/// Everything needed to resume an agent, except the replay buffer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Checkpoint {
    pub state_dim: usize,
    pub action_dim: usize,
    pub policy: PolicyNetwork,
    pub critic1: CriticNetwork,
    pub critic2: CriticNetwork,
    pub critic1_target: CriticNetwork,
    pub critic2_target: CriticNetwork,
    pub policy_optimizer: OptimizerWrapper,
    pub critic1_optimizer: OptimizerWrapper,
    pub critic2_optimizer: OptimizerWrapper,
    pub total_steps: u64,
    pub episodes: u64,
    pub update_count: u64,
    pub curriculum_stage: usize,
    pub exploration_noise: f32,
    pub objective_weights: ObjectiveWeights,
    pub current_regime: Option<RegimeId>,
    pub regime_history: Vec<RegimeId>,
    pub regime_transitions: BTreeMap<RegimePair, u64>,
}

impl Checkpoint {
    /// Write as bincode, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let serialized = bincode::serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        let checkpoint = bincode::deserialize(&data)?;
        Ok(checkpoint)
    }
}
