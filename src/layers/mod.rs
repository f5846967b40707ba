pub mod dense;
pub mod dropout;
pub mod initialization;
pub mod normalization;

pub use dense::{DenseGradients, DenseLayer};
pub use dropout::DropoutLayer;
pub use initialization::WeightInit;
pub use normalization::{LayerNorm, RunningNorm};
