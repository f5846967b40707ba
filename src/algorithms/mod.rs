//! # Progressive Soft Actor-Critic
//!
//! The agent in [`progressive_sac`] ties together the networks in
//! [`crate::network`], the prioritized replay buffer and the pieces defined
//! here:
//!
//! - [`curriculum`]: three-stage difficulty schedule with exploration decay
//!   and objective weights
//! - [`ensemble`]: perturbed policy copies built at the last curriculum stage
//! - [`checkpoint`]: the persisted form of the agent
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use progressive_sac::algorithms::ProgressiveSacBuilder;
//! use ndarray::Array1;
//!
//! let mut agent = ProgressiveSacBuilder::new(40, 1)
//!     .hidden_dims(vec![256, 256])
//!     .batch_size(256)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//!
//! let state = Array1::<f32>::zeros(40);
//! let position = agent.select_action(state.view(), false, Some(1)).unwrap();
//! ```

pub mod checkpoint;
pub mod curriculum;
pub mod ensemble;
pub mod progressive_sac;

pub use checkpoint::Checkpoint;
pub use curriculum::{CurriculumState, ExplorationConfig, ObjectiveWeights, MAX_CURRICULUM_STAGE};
pub use ensemble::{EnsembleAction, PolicyEnsemble};
pub use progressive_sac::{ProgressiveSac, ProgressiveSacBuilder, UpdateStats};
