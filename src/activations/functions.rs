use ndarray::{Array2, ArrayView2};
use serde::{Serialize, Deserialize};

/// Activation applied after a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu { alpha: f32 },
    Tanh,
    Linear,
}

impl Activation {
    /// Apply the activation function to a batch in-place.
    pub fn apply_batch(&self, inputs: &mut Array2<f32>) {
        match self {
            Activation::Relu => {
                inputs.mapv_inplace(|v| v.max(0.0));
            }
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                inputs.mapv_inplace(|v| if v > 0.0 { v } else { a * v });
            }
            Activation::Tanh => {
                inputs.mapv_inplace(|v| v.tanh());
            }
            Activation::Linear => {}
        }
    }

    /// Derivative with respect to the pre-activation values.
    pub fn derivative_batch(&self, pre_activation: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => {
                pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
            }
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { a })
            }
            Activation::Tanh => {
                pre_activation.mapv(|v| {
                    let t = v.tanh();
                    1.0 - t * t
                })
            }
            Activation::Linear => Array2::ones(pre_activation.dim()),
        }
    }
}
