//! Compute device selection.
//!
//! The device is chosen once in [`SacConfig`](crate::config::SacConfig) and handed to
//! every component that allocates arrays, instead of being read from global state.

use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Numeric backend used for network forward/backward passes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// ndarray on the host CPU
    #[default]
    Cpu,
}

impl Device {
    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }

    pub fn zeros1(&self, len: usize) -> Array1<f32> {
        match self {
            Device::Cpu => Array1::zeros(len),
        }
    }

    pub fn zeros2(&self, shape: (usize, usize)) -> Array2<f32> {
        match self {
            Device::Cpu => Array2::zeros(shape),
        }
    }

    /// Sample a matrix from `dist` using the caller's generator
    pub fn random2<D, R>(&self, shape: (usize, usize), dist: D, rng: &mut R) -> Array2<f32>
    where
        D: Distribution<f32>,
        R: Rng + ?Sized,
    {
        match self {
            Device::Cpu => Array2::random_using(shape, dist, rng),
        }
    }

    /// Sample a vector from `dist` using the caller's generator
    pub fn random1<D, R>(&self, len: usize, dist: D, rng: &mut R) -> Array1<f32>
    where
        D: Distribution<f32>,
        R: Rng + ?Sized,
    {
        match self {
            Device::Cpu => Array1::random_using(len, dist, rng),
        }
    }
}
