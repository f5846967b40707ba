use serde::{Serialize, Deserialize};

use crate::layers::DenseGradients;

/// Gradient clipping methods
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum GradientClipper {
    /// Rescale all gradients of one update so their joint L2 norm is at most `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    #[default]
    None,
}

impl GradientClipper {
    pub fn from_max_norm(max_norm: Option<f32>) -> Self {
        match max_norm {
            Some(max_norm) if max_norm > 0.0 => GradientClipper::ClipByGlobalNorm { max_norm },
            _ => GradientClipper::None,
        }
    }

    /// Clip in place; returns the norm before clipping.
    pub fn clip(&self, gradients: &mut [&mut DenseGradients]) -> f32 {
        let norm = Self::compute_global_norm(gradients);
        if let GradientClipper::ClipByGlobalNorm { max_norm } = self {
            if norm > *max_norm && norm.is_finite() {
                let scale = max_norm / norm;
                for g in gradients.iter_mut() {
                    g.weights.mapv_inplace(|x| x * scale);
                    g.biases.mapv_inplace(|x| x * scale);
                }
            }
        }
        norm
    }

    /// Compute global norm of all gradients
    pub fn compute_global_norm(gradients: &[&mut DenseGradients]) -> f32 {
        gradients
            .iter()
            .map(|g| {
                g.weights.iter().map(|&x| x * x).sum::<f32>()
                    + g.biases.iter().map(|&x| x * x).sum::<f32>()
            })
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_global_norm_clip() {
        let mut a = DenseGradients { weights: array![[3.0]], biases: array![0.0] };
        let mut b = DenseGradients { weights: array![[0.0]], biases: array![4.0] };
        let clipper = GradientClipper::from_max_norm(Some(1.0));
        let norm = clipper.clip(&mut [&mut a, &mut b]);
        assert!((norm - 5.0).abs() < 1e-6);
        assert!((a.weights[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((b.biases[0] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_no_clip() {
        let mut a = DenseGradients { weights: array![[30.0]], biases: array![0.0] };
        GradientClipper::from_max_norm(None).clip(&mut [&mut a]);
        assert_eq!(a.weights[[0, 0]], 30.0);
    }
}
