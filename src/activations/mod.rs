//! # Activation Functions Module
//!
//! Non-linearities used by the progressive stage networks.
//!
//! - **ReLU**: `max(0, x)`, the default for hidden layers
//! - **LeakyReLU**: ReLU with a small negative slope
//! - **Tanh**: hyperbolic tangent, bounded in `[-1, 1]`
//! - **Linear**: identity, used on output layers

pub mod functions;

pub use functions::Activation;
