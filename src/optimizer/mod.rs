pub mod gradient_clipper;

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};

use crate::layers::{DenseGradients, DenseLayer};

pub use gradient_clipper::GradientClipper;

/// Parameter update rule.
///
/// Every parameter tensor is addressed by a stable `key` so stateful
/// optimizers keep their moments per tensor, independent of call order.
pub trait Optimizer {
    /// Advance the step counter; call once per optimization step.
    fn begin_step(&mut self) {}

    fn update_weights(&mut self, key: &str, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32);

    fn update_biases(&mut self, key: &str, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);
}

/// Update rule selected in the agent configuration
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl OptimizerWrapper {
    pub fn adam() -> Self {
        OptimizerWrapper::Adam(Adam::default())
    }

    pub fn sgd() -> Self {
        OptimizerWrapper::SGD(SGD::new())
    }

    pub fn from_kind(kind: OptimizerKind) -> Self {
        match kind {
            OptimizerKind::Sgd => Self::sgd(),
            OptimizerKind::Adam => Self::adam(),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            OptimizerWrapper::SGD(_) => OptimizerKind::Sgd,
            OptimizerWrapper::Adam(_) => OptimizerKind::Adam,
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update_weights(&mut self, key: &str, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_weights(key, weights, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_weights(key, weights, gradients, learning_rate),
        }
    }

    fn update_biases(&mut self, key: &str, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_biases(key, biases, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_biases(key, biases, gradients, learning_rate),
        }
    }
}

/// Apply one layer's gradients under `key.w` / `key.b`.
pub fn apply_dense_gradients<O: Optimizer + ?Sized>(
    optimizer: &mut O,
    key: &str,
    layer: &mut DenseLayer,
    gradients: &DenseGradients,
    learning_rate: f32,
) {
    optimizer.update_weights(&format!("{key}.w"), &mut layer.weights, &gradients.weights, learning_rate);
    optimizer.update_biases(&format!("{key}.b"), &mut layer.biases, &gradients.biases, learning_rate);
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn update_weights(&mut self, _key: &str, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        weights.zip_mut_with(gradients, |w, &g| *w -= learning_rate * g);
    }

    fn update_biases(&mut self, _key: &str, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        biases.zip_mut_with(gradients, |b, &g| *b -= learning_rate * g);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub t: u64,
    #[serde(default)]
    steps: BTreeMap<String, u64>,
    m_weights: BTreeMap<String, Array2<f32>>,
    v_weights: BTreeMap<String, Array2<f32>>,
    m_biases: BTreeMap<String, Array1<f32>>,
    v_biases: BTreeMap<String, Array1<f32>>,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            t: 0,
            steps: BTreeMap::new(),
            m_weights: BTreeMap::new(),
            v_weights: BTreeMap::new(),
            m_biases: BTreeMap::new(),
            v_biases: BTreeMap::new(),
        }
    }

    /// Number of parameter tensors with moment state
    pub fn tracked_parameters(&self) -> usize {
        self.m_weights.len() + self.m_biases.len()
    }

    /// Number of updates applied to `key` so far
    pub fn step_count(&self, key: &str) -> u64 {
        self.steps.get(key).copied().unwrap_or(0)
    }

    /// Bias corrections for the next update of `key`. Each key counts its own
    /// steps, so parameters first used after a stage advance start at step 1.
    fn advance(&mut self, key: &str) -> (f32, f32) {
        let step = self.steps.entry(key.to_string()).or_insert(0);
        *step += 1;
        let t = (*step).min(i32::MAX as u64) as i32;
        (1.0 - self.beta1.powi(t), 1.0 - self.beta2.powi(t))
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update_weights(&mut self, key: &str, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        let (c1, c2) = self.advance(key);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);

        let m = self.m_weights.entry(key.to_string()).or_insert_with(|| Array2::zeros(weights.dim()));
        m.zip_mut_with(gradients, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        let v = self.v_weights.entry(key.to_string()).or_insert_with(|| Array2::zeros(weights.dim()));
        v.zip_mut_with(gradients, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);

        let m = &self.m_weights[key];
        let v = &self.v_weights[key];
        ndarray::Zip::from(weights).and(m).and(v).for_each(|w, &m, &v| {
            *w -= learning_rate * (m / c1) / ((v / c2).sqrt() + eps);
        });
    }

    fn update_biases(&mut self, key: &str, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        let (c1, c2) = self.advance(key);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);

        let m = self.m_biases.entry(key.to_string()).or_insert_with(|| Array1::zeros(biases.dim()));
        m.zip_mut_with(gradients, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        let v = self.v_biases.entry(key.to_string()).or_insert_with(|| Array1::zeros(biases.dim()));
        v.zip_mut_with(gradients, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);

        let m = &self.m_biases[key];
        let v = &self.v_biases[key];
        ndarray::Zip::from(biases).and(m).and(v).for_each(|b, &m, &v| {
            *b -= learning_rate * (m / c1) / ((v / c2).sqrt() + eps);
        });
    }
}

/// Adam for a single scalar parameter (entropy temperatures).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScalarAdam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: f32,
    v: f32,
    t: u64,
}

impl ScalarAdam {
    pub fn new(learning_rate: f32) -> Self {
        ScalarAdam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: 0.0,
            v: 0.0,
            t: 0,
        }
    }

    pub fn step(&mut self, param: &mut f32, gradient: f32) {
        self.t += 1;
        self.m = self.beta1 * self.m + (1.0 - self.beta1) * gradient;
        self.v = self.beta2 * self.v + (1.0 - self.beta2) * gradient * gradient;
        let t = self.t as i32;
        let m_hat = self.m / (1.0 - self.beta1.powi(t));
        let v_hat = self.v / (1.0 - self.beta2.powi(t));
        *param -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
    }
}
