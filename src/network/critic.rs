use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::activations::Activation;
use crate::device::Device;
use crate::error::{Result, SacError};
use crate::layers::{DenseGradients, DenseLayer, WeightInit};
use crate::network::progressive::{ProgressiveNetwork, StageSnapshot};
use crate::optimizer::{apply_dense_gradients, Optimizer};
use crate::types::RegimeId;

const HEAD_INIT: WeightInit = WeightInit::FanInUniform;

/// Every head's estimate for a batch
#[derive(Clone, Debug)]
pub struct CriticOutput {
    pub q_main: Array1<f32>,
    /// Short, medium and long horizon heads
    pub q_horizons: (Array1<f32>, Array1<f32>, Array1<f32>),
    /// Present only once a head exists for the requested regime
    pub q_regime: Option<Array1<f32>>,
    pub risk: Array1<f32>,
}

/// Gradients for the parameters trained by the Bellman loss
#[derive(Clone, Debug)]
pub struct CriticGradients {
    pub features: Vec<DenseGradients>,
    pub main_head: DenseGradients,
}

impl CriticGradients {
    pub fn parts_mut(&mut self) -> Vec<&mut DenseGradients> {
        let mut parts: Vec<&mut DenseGradients> = self.features.iter_mut().collect();
        parts.push(&mut self.main_head);
        parts
    }
}

/// Action-value network: a progressive feature extractor over `[state, action]`
/// feeding a main head, three horizon heads, a risk head and lazily added
/// per-regime heads.
///
/// Only the main head and the feature extractor are trained; the others are
/// read for diagnostics.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CriticNetwork {
    features: ProgressiveNetwork,
    main_head: DenseLayer,
    short_head: DenseLayer,
    medium_head: DenseLayer,
    long_head: DenseLayer,
    risk_head: DenseLayer,
    regime_heads: BTreeMap<RegimeId, DenseLayer>,
    state_dim: usize,
    action_dim: usize,
    device: Device,
}

impl CriticNetwork {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        state_dim: usize,
        action_dim: usize,
        hidden_dims: &[usize],
        activation: Activation,
        max_stages: usize,
        device: Device,
        rng: &mut R,
    ) -> Self {
        let feature_dim = hidden_dims
            .get(1)
            .or_else(|| hidden_dims.first())
            .copied()
            .unwrap_or(256);

        let features = ProgressiveNetwork::new(
            state_dim + action_dim,
            feature_dim,
            hidden_dims,
            activation,
            Activation::Relu,
            max_stages,
            &HEAD_INIT,
            device,
            rng,
        );

        let head = |rng: &mut R| DenseLayer::new(feature_dim, 1, Activation::Linear, &HEAD_INIT, device, rng);

        CriticNetwork {
            features,
            main_head: head(rng),
            short_head: head(rng),
            medium_head: head(rng),
            long_head: head(rng),
            risk_head: head(rng),
            regime_heads: BTreeMap::new(),
            state_dim,
            action_dim,
            device,
        }
    }

    pub fn stage(&self) -> usize {
        self.features.stage()
    }

    pub fn feature_dim(&self) -> usize {
        self.features.output_dim()
    }

    fn join(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Array2<f32>> {
        if state.ncols() != self.state_dim || action.ncols() != self.action_dim || state.nrows() != action.nrows() {
            return Err(SacError::dimension_mismatch(
                format!("({}, {}) and (n, {})", state.nrows(), self.state_dim, self.action_dim),
                format!("{:?} and {:?}", state.dim(), action.dim()),
            ));
        }
        let mut joined = self.device.zeros2((state.nrows(), self.state_dim + self.action_dim));
        joined.slice_mut(s![.., ..self.state_dim]).assign(&state);
        joined.slice_mut(s![.., self.state_dim..]).assign(&action);
        Ok(joined)
    }

    /// All heads for a batch; caches the main path for [`backward_q`](Self::backward_q).
    pub fn forward(
        &mut self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        regime: Option<RegimeId>,
    ) -> Result<CriticOutput> {
        let x = self.join(state, action)?;
        let features = self.features.forward_batch(x.view())?;
        let q_main = column(self.main_head.forward_batch(features.view()));
        Ok(self.auxiliary(features.view(), q_main, regime))
    }

    /// All heads without touching the backward cache
    pub fn predict(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        regime: Option<RegimeId>,
    ) -> Result<CriticOutput> {
        let x = self.join(state, action)?;
        let features = self.features.predict_batch(x.view())?;
        let q_main = column(self.main_head.predict_batch(features.view()));
        Ok(self.auxiliary(features.view(), q_main, regime))
    }

    fn auxiliary(&self, features: ArrayView2<f32>, q_main: Array1<f32>, regime: Option<RegimeId>) -> CriticOutput {
        let head = |layer: &DenseLayer| column(layer.predict_batch(features));
        CriticOutput {
            q_main,
            q_horizons: (head(&self.short_head), head(&self.medium_head), head(&self.long_head)),
            q_regime: regime.and_then(|r| self.regime_heads.get(&r)).map(&head),
            risk: head(&self.risk_head),
        }
    }

    /// Main-head Q-value; caches for backward
    pub fn get_q_value(&mut self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Array1<f32>> {
        let x = self.join(state, action)?;
        let features = self.features.forward_batch(x.view())?;
        Ok(column(self.main_head.forward_batch(features.view())))
    }

    /// Main-head Q-value, no caching
    pub fn predict_q(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Array1<f32>> {
        let x = self.join(state, action)?;
        let features = self.features.predict_batch(x.view())?;
        Ok(column(self.main_head.predict_batch(features.view())))
    }

    /// Backpropagate `∂L/∂q_main` through the last cached forward pass.
    ///
    /// Returns the gradient with respect to the `[state, action]` input.
    pub fn backward_q(&self, grad_q: ArrayView1<f32>) -> Result<(Array2<f32>, CriticGradients)> {
        let errors = grad_q.insert_axis(Axis(1));
        let (feature_error, main_head) = self.main_head.backward_batch(errors)?;
        let (input_error, features) = self.features.backward_batch(feature_error.view())?;
        Ok((input_error, CriticGradients { features, main_head }))
    }

    /// `∂q_main/∂action`, scaled row-wise by `grad_q`
    pub fn action_gradient(
        &mut self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        grad_q: ArrayView1<f32>,
    ) -> Result<Array2<f32>> {
        self.get_q_value(state, action)?;
        let (input_error, _) = self.backward_q(grad_q)?;
        Ok(input_error.slice(s![.., self.state_dim..]).to_owned())
    }

    pub fn apply_gradients<O: Optimizer + ?Sized>(
        &mut self,
        optimizer: &mut O,
        gradients: &CriticGradients,
        learning_rate: f32,
    ) {
        self.features.apply_gradients(optimizer, &gradients.features, learning_rate);
        apply_dense_gradients(optimizer, "head.main", &mut self.main_head, &gradients.main_head, learning_rate);
    }

    /// Create a head for `regime` unless one exists. Returns whether one was created.
    pub fn add_regime_head<R: Rng + ?Sized>(&mut self, regime: RegimeId, rng: &mut R) -> bool {
        if self.regime_heads.contains_key(&regime) {
            return false;
        }
        let head = DenseLayer::new(self.feature_dim(), 1, Activation::Linear, &HEAD_INIT, self.device, rng);
        self.regime_heads.insert(regime, head);
        info!(regime, "Added regime-specific critic head");
        true
    }

    pub fn has_regime_head(&self, regime: RegimeId) -> bool {
        self.regime_heads.contains_key(&regime)
    }

    pub fn regime_head_count(&self) -> usize {
        self.regime_heads.len()
    }

    pub fn increase_complexity(&mut self) -> Option<StageSnapshot> {
        self.features.increase_complexity()
    }

    /// Polyak-average all stages and heads toward `source`
    pub fn soft_update_from(&mut self, source: &CriticNetwork, tau: f32) {
        self.features.soft_update_from(&source.features, tau);
        self.main_head.soft_update_from(&source.main_head, tau);
        self.short_head.soft_update_from(&source.short_head, tau);
        self.medium_head.soft_update_from(&source.medium_head, tau);
        self.long_head.soft_update_from(&source.long_head, tau);
        self.risk_head.soft_update_from(&source.risk_head, tau);
        for (regime, head) in self.regime_heads.iter_mut() {
            if let Some(source_head) = source.regime_heads.get(regime) {
                head.soft_update_from(source_head, tau);
            }
        }
    }

    pub(crate) fn restore_stage(&mut self, stage: usize) -> Result<()> {
        self.features.restore_stage(stage)
    }
}

fn column(output: Array2<f32>) -> Array1<f32> {
    output.index_axis_move(Axis(1), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn critic(rng: &mut StdRng) -> CriticNetwork {
        CriticNetwork::new(3, 1, &[16, 8], Activation::Relu, 3, Device::Cpu, rng)
    }

    #[test]
    fn test_forward_heads() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut c = critic(&mut rng);
        let s = array![[0.1, 0.2, 0.3], [1.0, -1.0, 0.0]];
        let a = array![[0.5], [-0.5]];
        let out = c.forward(s.view(), a.view(), Some(1)).unwrap();
        assert_eq!(out.q_main.len(), 2);
        assert_eq!(out.risk.len(), 2);
        assert!(out.q_regime.is_none());
        assert_eq!(out.q_main, c.predict_q(s.view(), a.view()).unwrap());
    }

    #[test]
    fn test_add_regime_head_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(22);
        let mut c = critic(&mut rng);
        let s = array![[0.1, 0.2, 0.3]];
        let a = array![[0.5]];
        assert!(c.add_regime_head(2, &mut rng));
        let first = c.predict(s.view(), a.view(), Some(2)).unwrap().q_regime.unwrap();
        assert!(!c.add_regime_head(2, &mut rng));
        let second = c.predict(s.view(), a.view(), Some(2)).unwrap().q_regime.unwrap();
        assert_eq!(first, second);
        assert_eq!(c.regime_head_count(), 1);
    }

    #[test]
    fn test_action_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut c = critic(&mut rng);
        let s = array![[0.4, -0.7, 0.2]];
        let a = array![[0.3]];
        let grad = c.action_gradient(s.view(), a.view(), array![1.0].view()).unwrap();

        let h = 1e-3;
        let q = |x: f32| c.predict_q(s.view(), array![[x]].view()).unwrap()[0];
        let numeric = (q(0.3 + h) - q(0.3 - h)) / (2.0 * h);
        assert!((grad[[0, 0]] - numeric).abs() < 1e-2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut rng = StdRng::seed_from_u64(24);
        let c = critic(&mut rng);
        assert!(matches!(
            c.predict_q(array![[1.0, 2.0]].view(), array![[0.0]].view()),
            Err(SacError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_soft_update_tau_one_copies() {
        let mut rng = StdRng::seed_from_u64(25);
        let source = critic(&mut rng);
        let mut target = critic(&mut rng);
        target.soft_update_from(&source, 1.0);
        let s = array![[0.1, 0.2, 0.3]];
        let a = array![[0.5]];
        assert_eq!(target.predict_q(s.view(), a.view()).unwrap(), source.predict_q(s.view(), a.view()).unwrap());
    }
}
