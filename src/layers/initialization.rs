use ndarray::{Array1, Array2};
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::Normal;
use serde::{Serialize, Deserialize};

use crate::device::Device;

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Xavier/Glorot uniform scaled by `gain`, zero biases
    XavierUniform { gain: f32 },

    /// `U(-1/√fan_in, 1/√fan_in)` for weights and biases
    FanInUniform,

    /// Normal distribution with custom mean and std, zero biases
    Normal { mean: f32, std: f32 },

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Initialize weights for a layer of shape `(fan_in, fan_out)`
    pub fn initialize_weights<R: Rng + ?Sized>(
        &self,
        shape: (usize, usize),
        device: Device,
        rng: &mut R,
    ) -> Array2<f32> {
        let (fan_in, fan_out) = shape;

        match self {
            WeightInit::XavierUniform { gain } => {
                let limit = gain * (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                device.random2(shape, Uniform::new_inclusive(-limit, limit), rng)
            }

            WeightInit::FanInUniform => {
                let limit = 1.0 / (fan_in.max(1) as f32).sqrt();
                device.random2(shape, Uniform::new_inclusive(-limit, limit), rng)
            }

            WeightInit::Normal { mean, std } => match Normal::new(*mean, *std) {
                Ok(dist) => device.random2(shape, dist, rng),
                Err(_) => device.zeros2(shape),
            },

            WeightInit::Zeros => device.zeros2(shape),
        }
    }

    /// Initialize biases for a layer
    pub fn initialize_biases<R: Rng + ?Sized>(
        &self,
        fan_in: usize,
        size: usize,
        device: Device,
        rng: &mut R,
    ) -> Array1<f32> {
        match self {
            WeightInit::FanInUniform => {
                let limit = 1.0 / (fan_in.max(1) as f32).sqrt();
                device.random1(size, Uniform::new_inclusive(-limit, limit), rng)
            }
            WeightInit::XavierUniform { .. } | WeightInit::Normal { .. } | WeightInit::Zeros => {
                device.zeros1(size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xavier_gain_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = WeightInit::XavierUniform { gain: 0.1 }.initialize_weights((10, 20), Device::Cpu, &mut rng);
        let limit = 0.1 * (6.0f32 / 30.0).sqrt();
        assert!(w.iter().all(|&x| x.abs() <= limit + 1e-6));
    }

    #[test]
    fn test_fan_in_biases_nonzero() {
        let mut rng = StdRng::seed_from_u64(2);
        let b = WeightInit::FanInUniform.initialize_biases(4, 16, Device::Cpu, &mut rng);
        assert!(b.iter().all(|&x| x.abs() <= 0.5 + 1e-6));
        assert!(b.iter().any(|&x| x != 0.0));
    }
}
