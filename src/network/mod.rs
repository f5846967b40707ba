//! Function approximators: the progressive stage container, the squashed
//! Gaussian policy built on it and the hierarchical critic.

pub mod critic;
pub mod policy;
pub mod progressive;

pub use critic::{CriticGradients, CriticNetwork, CriticOutput};
pub use policy::{PolicyNetwork, PolicyOutput, PolicySample, RegimeParams};
pub use progressive::{ProgressiveNetwork, StageKind, StageNetwork, StageSnapshot};
