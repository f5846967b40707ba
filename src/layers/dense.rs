use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::Normal;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::device::Device;
use crate::error::{Result, SacError};
use super::initialization::WeightInit;

/// Weight and bias gradients produced by one backward pass
#[derive(Clone, Debug)]
pub struct DenseGradients {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer initialized with `init`.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        init: &WeightInit,
        device: Device,
        rng: &mut R,
    ) -> Self {
        let weights = init.initialize_weights((input_size, output_size), device, rng);
        let biases = init.initialize_biases(input_size, output_size, device, rng);
        DenseLayer {
            weights,
            biases,
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Forward pass for a batch, caching what the backward pass needs.
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Forward pass without touching the backward cache.
    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Backward pass for a batch of output errors.
    ///
    /// Returns the error with respect to this layer's inputs together with the
    /// weight and bias gradients. Requires a prior [`forward_batch`](Self::forward_batch).
    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<(Array2<f32>, DenseGradients)> {
        let pre_activation_output = self.pre_activation_output.as_ref()
            .ok_or_else(|| SacError::EmptyBuffer("dense layer has no cached forward pass".to_string()))?;
        let inputs = self.inputs.as_ref()
            .ok_or_else(|| SacError::EmptyBuffer("dense layer has no cached inputs".to_string()))?;

        let activation_deriv = self.activation.derivative_batch(pre_activation_output.view());
        let adjusted_error = output_errors.to_owned() * &activation_deriv;
        let weight_gradients = inputs.t().dot(&adjusted_error);
        let bias_gradients = adjusted_error.sum_axis(Axis(0));
        let input_error = adjusted_error.dot(&self.weights.t());

        Ok((input_error, DenseGradients { weights: weight_gradients, biases: bias_gradients }))
    }

    /// Polyak step toward `source`: `self ← (1 − τ)·self + τ·source`.
    pub fn soft_update_from(&mut self, source: &DenseLayer, tau: f32) {
        self.weights.zip_mut_with(&source.weights, |t, &s| *t = *t * (1.0 - tau) + s * tau);
        self.biases.zip_mut_with(&source.biases, |t, &s| *t = *t * (1.0 - tau) + s * tau);
    }

    /// Add N(0, scale²) noise to every parameter.
    pub fn perturb<R: Rng + ?Sized>(&mut self, scale: f32, rng: &mut R) {
        if scale <= 0.0 {
            return;
        }
        let Ok(normal) = Normal::new(0.0f32, scale) else {
            return;
        };
        self.weights.mapv_inplace(|w| w + rng.sample(normal));
        self.biases.mapv_inplace(|b| b + rng.sample(normal));
    }

    /// Drop cached activations (after cloning or loading).
    pub fn clear_cache(&mut self) {
        self.inputs = None;
        self.pre_activation_output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer(activation: Activation) -> DenseLayer {
        let mut rng = StdRng::seed_from_u64(7);
        DenseLayer::new(2, 1, activation, &WeightInit::Zeros, Device::Cpu, &mut rng)
    }

    #[test]
    fn test_forward_linear() {
        let mut l = layer(Activation::Linear);
        l.weights = array![[2.0], [-1.0]];
        l.biases = array![0.5];
        let out = l.forward_batch(array![[1.0, 1.0], [0.0, 2.0]].view());
        assert_eq!(out, array![[1.5], [-1.5]]);
        assert_eq!(l.predict_batch(array![[1.0, 1.0]].view()), array![[1.5]]);
    }

    #[test]
    fn test_backward_gradients() {
        let mut l = layer(Activation::Linear);
        l.weights = array![[2.0], [-1.0]];
        l.forward_batch(array![[1.0, 3.0]].view());
        let (input_err, grads) = l.backward_batch(array![[1.0]].view()).unwrap();
        assert_eq!(grads.weights, array![[1.0], [3.0]]);
        assert_eq!(grads.biases, array![1.0]);
        assert_eq!(input_err, array![[2.0, -1.0]]);
    }

    #[test]
    fn test_backward_without_forward_is_error() {
        let l = layer(Activation::Relu);
        assert!(l.backward_batch(array![[1.0]].view()).is_err());
    }

    #[test]
    fn test_soft_update() {
        let mut target = layer(Activation::Linear);
        let mut source = layer(Activation::Linear);
        source.weights.fill(1.0);
        source.biases.fill(1.0);
        target.soft_update_from(&source, 0.25);
        assert!(target.weights.iter().all(|&w| (w - 0.25).abs() < 1e-6));
        assert!((target.biases[0] - 0.25).abs() < 1e-6);
    }
}
