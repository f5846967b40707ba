use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Serialize, Deserialize};

/// Inverted dropout on the network input.
///
/// Only active in training mode; the policy never backpropagates into its
/// input, so no mask is kept.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DropoutLayer {
    /// Probability of dropping a unit
    pub dropout_rate: f32,

    /// Whether we're in training mode
    pub training: bool,
}

impl DropoutLayer {
    pub fn new(dropout_rate: f32) -> Self {
        DropoutLayer {
            dropout_rate: dropout_rate.clamp(0.0, 0.99),
            training: true,
        }
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward_batch<R: Rng + ?Sized>(&self, inputs: ArrayView2<f32>, rng: &mut R) -> Array2<f32> {
        if !self.training || self.dropout_rate == 0.0 {
            return inputs.to_owned();
        }

        let keep = 1.0 - self.dropout_rate;
        let scale = 1.0 / keep;
        inputs.mapv(|x| if rng.gen::<f32>() < keep { x * scale } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dropout_identity_in_eval() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut dropout = DropoutLayer::new(0.5);
        dropout.set_training(false);
        let x = Array2::ones((4, 8));
        assert_eq!(dropout.forward_batch(x.view(), &mut rng), x);
    }

    #[test]
    fn test_dropout_scales_kept_units() {
        let mut rng = StdRng::seed_from_u64(4);
        let dropout = DropoutLayer::new(0.5);
        let out = dropout.forward_batch(Array2::ones((16, 16)).view(), &mut rng);
        assert!(out.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        assert!(out.iter().any(|&v| v == 0.0));
    }
}
