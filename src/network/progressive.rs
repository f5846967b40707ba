use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::activations::Activation;
use crate::device::Device;
use crate::error::{Result, SacError};
use crate::layers::{DenseGradients, DenseLayer, WeightInit};
use crate::optimizer::{apply_dense_gradients, Optimizer};

/// Capacity variant of one stage.
///
/// Stages are siblings with their own parameters; none extends another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    /// `in → h0 → out`
    Shallow,
    /// `in → h0 → h0 → out`
    Deep,
    /// `in → h0 → h1 → h0 → out`
    Bottleneck,
    /// `in → h0 → h1 × n → h0 → out`
    Extended(usize),
}

impl StageKind {
    pub fn for_stage(stage: usize) -> Self {
        match stage {
            0 | 1 => StageKind::Shallow,
            2 => StageKind::Deep,
            3 => StageKind::Bottleneck,
            k => StageKind::Extended(k - 2),
        }
    }

    /// Hidden layer widths for this variant
    pub fn hidden_layout(&self, hidden_dims: &[usize]) -> Vec<usize> {
        let h0 = hidden_dims.first().copied().unwrap_or(256);
        let h1 = hidden_dims.get(1).copied().unwrap_or(h0);
        match self {
            StageKind::Shallow => vec![h0],
            StageKind::Deep => vec![h0, h0],
            StageKind::Bottleneck => vec![h0, h1, h0],
            StageKind::Extended(n) => {
                let mut layout = vec![h0];
                layout.extend(std::iter::repeat(h1).take(*n));
                layout.push(h0);
                layout
            }
        }
    }
}

/// A plain feed-forward stack used as one stage
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StageNetwork {
    pub kind: StageKind,
    pub layers: Vec<DenseLayer>,
}

impl StageNetwork {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        kind: StageKind,
        input_dim: usize,
        output_dim: usize,
        hidden_dims: &[usize],
        hidden_activation: Activation,
        output_activation: Activation,
        init: &WeightInit,
        device: Device,
        rng: &mut R,
    ) -> Self {
        let mut sizes = vec![input_dim];
        sizes.extend(kind.hidden_layout(hidden_dims));
        sizes.push(output_dim);

        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == last { output_activation } else { hidden_activation };
                DenseLayer::new(window[0], window[1], activation, init, device, rng)
            })
            .collect();

        StageNetwork { kind, layers }
    }

    /// Layer widths including input and output
    pub fn shape(&self) -> Vec<usize> {
        let mut shape: Vec<usize> = self.layers.iter().map(|l| l.input_size()).collect();
        if let Some(last) = self.layers.last() {
            shape.push(last.output_size());
        }
        shape
    }

    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &mut self.layers {
            current = layer.forward_batch(current.view());
        }
        current
    }

    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            current = layer.predict_batch(current.view());
        }
        current
    }

    /// Backpropagate through the cached forward pass.
    ///
    /// Returns the input error and per-layer gradients in layer order.
    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<DenseGradients>)> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_errors.to_owned();
        for layer in self.layers.iter().rev() {
            let (input_error, grads) = layer.backward_batch(current_error.view())?;
            gradients.push(grads);
            current_error = input_error;
        }
        gradients.reverse();
        Ok((current_error, gradients))
    }

    pub fn apply_gradients<O: Optimizer + ?Sized>(
        &mut self,
        optimizer: &mut O,
        prefix: &str,
        gradients: &[DenseGradients],
        learning_rate: f32,
    ) {
        for (i, (layer, grads)) in self.layers.iter_mut().zip(gradients).enumerate() {
            apply_dense_gradients(optimizer, &format!("{prefix}.layer{i}"), layer, grads, learning_rate);
        }
    }

    pub fn soft_update_from(&mut self, source: &StageNetwork, tau: f32) {
        for (target, source) in self.layers.iter_mut().zip(&source.layers) {
            target.soft_update_from(source, tau);
        }
    }

    pub fn perturb<R: Rng + ?Sized>(&mut self, scale: f32, rng: &mut R) {
        for layer in &mut self.layers {
            layer.perturb(scale, rng);
        }
    }

    pub fn clear_cache(&mut self) {
        for layer in &mut self.layers {
            layer.clear_cache();
        }
    }
}

/// Parameters of the active stage captured right before a stage advance
#[derive(Clone, Debug)]
pub struct StageSnapshot {
    pub stage: usize,
    pub network: StageNetwork,
}

/// Feed-forward approximator with several independently parameterized
/// capacity stages, all built up front.
///
/// Only the active stage takes part in computation. The stage index is
/// 1-based and only ever grows.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProgressiveNetwork {
    stages: Vec<StageNetwork>,
    stage: usize,
    input_dim: usize,
    output_dim: usize,
}

impl ProgressiveNetwork {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        hidden_dims: &[usize],
        hidden_activation: Activation,
        output_activation: Activation,
        max_stages: usize,
        init: &WeightInit,
        device: Device,
        rng: &mut R,
    ) -> Self {
        let stages = (1..=max_stages.max(1))
            .map(|k| {
                StageNetwork::new(
                    StageKind::for_stage(k),
                    input_dim,
                    output_dim,
                    hidden_dims,
                    hidden_activation,
                    output_activation,
                    init,
                    device,
                    rng,
                )
            })
            .collect();

        ProgressiveNetwork { stages, stage: 1, input_dim, output_dim }
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn max_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn active(&self) -> &StageNetwork {
        &self.stages[self.stage - 1]
    }

    pub(crate) fn active_mut(&mut self) -> &mut StageNetwork {
        &mut self.stages[self.stage - 1]
    }

    pub fn stages(&self) -> &[StageNetwork] {
        &self.stages
    }

    fn check_input(&self, inputs: &ArrayView2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_dim {
            return Err(SacError::dimension_mismatch(
                format!("{} input features", self.input_dim),
                format!("{} input features", inputs.ncols()),
            ));
        }
        Ok(())
    }

    /// Forward through the active stage, caching for backward
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&inputs)?;
        Ok(self.active_mut().forward_batch(inputs))
    }

    /// Forward through the active stage without caching
    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&inputs)?;
        Ok(self.active().predict_batch(inputs))
    }

    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<DenseGradients>)> {
        self.active().backward_batch(output_errors)
    }

    /// Apply gradients to the active stage, keyed `stage{k}.layer{i}`
    pub fn apply_gradients<O: Optimizer + ?Sized>(
        &mut self,
        optimizer: &mut O,
        gradients: &[DenseGradients],
        learning_rate: f32,
    ) {
        let prefix = format!("stage{}", self.stage);
        self.active_mut().apply_gradients(optimizer, &prefix, gradients, learning_rate);
    }

    /// Advance to the next stage.
    ///
    /// Returns the parameters of the stage that was active before the
    /// advance, or `None` (and changes nothing) at the last stage. Weights are
    /// never copied between stages.
    pub fn increase_complexity(&mut self) -> Option<StageSnapshot> {
        if self.stage >= self.stages.len() {
            info!(stage = self.stage, "Already at maximum complexity stage");
            return None;
        }

        let snapshot = StageSnapshot { stage: self.stage, network: self.active().clone() };
        self.stage += 1;
        info!(stage = self.stage, "Increasing network complexity");
        Some(snapshot)
    }

    /// Polyak-average every stage toward `source`
    pub fn soft_update_from(&mut self, source: &ProgressiveNetwork, tau: f32) {
        for (target, source) in self.stages.iter_mut().zip(&source.stages) {
            target.soft_update_from(source, tau);
        }
    }

    /// Jump to `stage` (used when restoring a checkpoint)
    pub(crate) fn restore_stage(&mut self, stage: usize) -> Result<()> {
        if stage == 0 || stage > self.stages.len() {
            return Err(SacError::invalid_parameter(
                "stage".to_string(),
                format!("{} is outside 1..={}", stage, self.stages.len()),
            ));
        }
        self.stage = stage;
        Ok(())
    }

    pub fn perturb<R: Rng + ?Sized>(&mut self, scale: f32, rng: &mut R) {
        for stage in &mut self.stages {
            stage.perturb(scale, rng);
        }
    }

    pub fn clear_cache(&mut self) {
        for stage in &mut self.stages {
            stage.clear_cache();
        }
    }
}
