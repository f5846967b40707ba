use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Serialize, Deserialize};

use crate::device::Device;

/// Parameter-free layer normalization across the feature axis of each row.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LayerNorm {
    pub epsilon: f32,
}

impl LayerNorm {
    pub fn new(epsilon: f32) -> Self {
        LayerNorm { epsilon }
    }

    pub fn forward_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut output = inputs.to_owned();
        for mut row in output.axis_iter_mut(Axis(0)) {
            let n = row.len().max(1) as f32;
            let mean = row.sum() / n;
            let var = row.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / n;
            let std = (var + self.epsilon).sqrt();
            row.mapv_inplace(|x| (x - mean) / std);
        }
        output
    }
}

impl Default for LayerNorm {
    fn default() -> Self {
        Self::new(1e-5)
    }
}

/// Running (exponential moving) feature normalization.
///
/// Both modes normalize with the running statistics; only training mode
/// updates them, so evaluation is a pure function of the stored state.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunningNorm {
    /// Running mean for each feature
    pub running_mean: Array1<f32>,

    /// Running variance for each feature
    pub running_var: Array1<f32>,

    /// Weight of the newest batch in the running statistics
    pub momentum: f32,

    /// Small constant for numerical stability
    pub epsilon: f32,

    /// Whether we're in training mode
    pub training: bool,
}

impl RunningNorm {
    pub fn new(num_features: usize, momentum: f32, epsilon: f32, device: Device) -> Self {
        RunningNorm {
            running_mean: device.zeros1(num_features),
            running_var: device.zeros1(num_features) + 1.0,
            momentum,
            epsilon,
            training: true,
        }
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        if self.training && inputs.nrows() > 0 {
            self.update_statistics(inputs);
        }
        self.normalize(inputs)
    }

    /// Normalize with the current statistics, leaving them untouched
    pub fn normalize(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let std = self.running_var.mapv(|v| (v + self.epsilon).sqrt());
        let centered = &inputs - &self.running_mean.view().insert_axis(Axis(0));
        centered / &std.view().insert_axis(Axis(0))
    }

    fn update_statistics(&mut self, inputs: ArrayView2<f32>) {
        let Some(batch_mean) = inputs.mean_axis(Axis(0)) else {
            return;
        };
        // variance around the previous running mean
        let deviation = &inputs - &self.running_mean.view().insert_axis(Axis(0));
        let observed_var = deviation.mapv(|d| d * d).mean_axis(Axis(0));

        let m = self.momentum;
        self.running_mean.zip_mut_with(&batch_mean, |r, &b| *r = (1.0 - m) * *r + m * b);
        if let Some(observed_var) = observed_var {
            self.running_var.zip_mut_with(&observed_var, |r, &v| *r = (1.0 - m) * *r + m * v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_layer_norm_rows_centered() {
        let ln = LayerNorm::default();
        let out = ln.forward_batch(array![[1.0, 2.0, 3.0], [10.0, 10.0, 10.0]].view());
        assert!(out.row(0).sum().abs() < 1e-5);
        assert!(out.row(1).iter().all(|&x| x.abs() < 1e-3));
    }

    #[test]
    fn test_running_norm_eval_is_frozen() {
        let mut norm = RunningNorm::new(2, 0.1, 1e-5, Device::Cpu);
        norm.forward_batch(array![[4.0, -4.0]].view());
        let mean_after_train = norm.running_mean.clone();
        assert!(mean_after_train[0] > 0.0);

        norm.set_training(false);
        let a = norm.forward_batch(array![[1.0, 1.0]].view());
        let b = norm.forward_batch(array![[1.0, 1.0]].view());
        assert_eq!(a, b);
        assert_eq!(norm.running_mean, mean_after_train);
    }
}
