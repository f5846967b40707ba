//! Market data and the hooks that turn it into an RL environment.
//!
//! A [`MarketFrame`] holds aligned per-bar columns. The three traits decide
//! what the agent sees ([`StateEncoder`]), which regime each bar belongs to
//! ([`RegimeClassifier`]) and how a position is scored ([`RewardFunction`]).

pub mod encoder;
pub mod frame;
pub mod regime;
pub mod reward;

pub use encoder::{LookbackEncoder, StateEncoder};
pub use frame::MarketFrame;
pub use regime::{LabelledRegimes, RegimeClassifier};
pub use reward::{PositionReward, RewardFunction};
