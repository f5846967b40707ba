use ndarray::{Array1, ArrayView1, Axis};
use rand::Rng;
use tracing::info;

use crate::error::{Result, SacError};
use crate::network::PolicyNetwork;
use crate::types::RegimeId;

/// Weighted deterministic action of the ensemble and its per-dimension spread
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleAction {
    pub mean: Array1<f32>,
    pub disagreement: Array1<f32>,
}

/// Perturbed clones of a policy used to check robustness
#[derive(Clone, Debug)]
pub struct PolicyEnsemble {
    members: Vec<PolicyNetwork>,
    weights: Vec<f32>,
}

impl PolicyEnsemble {
    /// `size` clones of `policy`, each with N(0, noise_scale²) added to every
    /// network parameter, weighted uniformly and kept in evaluation mode.
    pub fn from_policy<R: Rng + ?Sized>(policy: &PolicyNetwork, size: usize, noise_scale: f32, rng: &mut R) -> Self {
        let members: Vec<PolicyNetwork> = (0..size)
            .map(|_| {
                let mut member = policy.perturbed(noise_scale, rng);
                member.set_training(false);
                member
            })
            .collect();
        let weights = vec![1.0 / size.max(1) as f32; size];
        info!(size, noise_scale, "Initialized policy ensemble");
        PolicyEnsemble { members, weights }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn members(&self) -> &[PolicyNetwork] {
        &self.members
    }

    pub(crate) fn ensure_regime(&mut self, regime: RegimeId) {
        for member in &mut self.members {
            member.ensure_regime(regime);
        }
    }

    pub fn action<R: Rng + ?Sized>(
        &mut self,
        state: ArrayView1<f32>,
        regime: Option<RegimeId>,
        rng: &mut R,
    ) -> Result<EnsembleAction> {
        if self.members.is_empty() {
            return Err(SacError::EmptyBuffer("policy ensemble has no members".to_string()));
        }

        let batch = state.insert_axis(Axis(0));
        let mut actions = Vec::with_capacity(self.members.len());
        for member in &mut self.members {
            actions.push(member.deterministic_action(batch, regime, rng)?.index_axis_move(Axis(0), 0));
        }

        let mut mean = Array1::<f32>::zeros(actions[0].len());
        for (action, &w) in actions.iter().zip(&self.weights) {
            mean.scaled_add(w, action);
        }
        let mut variance = Array1::<f32>::zeros(mean.len());
        for (action, &w) in actions.iter().zip(&self.weights) {
            let diff = action - &mean;
            variance.scaled_add(w, &diff.mapv(|d| d * d));
        }

        Ok(EnsembleAction { mean, disagreement: variance.mapv(f32::sqrt) })
    }
}
