use crate::device::Device;
use crate::error::{Result, SacError};
use crate::replay_buffer::PrioritizedReplayBuffer;

/// Builder for the regime-aware [`PrioritizedReplayBuffer`]
pub struct ReplayBufferBuilder {
    capacity: Option<usize>,
    alpha: f32,
    beta_start: f32,
    beta_frames: usize,
    device: Device,
}

impl ReplayBufferBuilder {
    /// Create a new replay buffer builder
    pub fn new() -> Self {
        ReplayBufferBuilder {
            capacity: None,
            alpha: 0.6,
            beta_start: 0.4,
            beta_frames: 100_000,
            device: Device::Cpu,
        }
    }

    /// Set the capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Priority exponent α
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Initial importance-sampling exponent and the number of sampling calls to anneal it to 1
    pub fn beta_schedule(mut self, beta_start: f32, beta_frames: usize) -> Self {
        self.beta_start = beta_start;
        self.beta_frames = beta_frames;
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Build the replay buffer
    pub fn build(self) -> Result<PrioritizedReplayBuffer> {
        let capacity = self.capacity.ok_or_else(|| SacError::InvalidParameter {
            name: "capacity".to_string(),
            reason: "Capacity not specified".to_string(),
        })?;

        if capacity == 0 {
            return Err(SacError::InvalidParameter {
                name: "capacity".to_string(),
                reason: "Capacity must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(SacError::InvalidParameter {
                name: "alpha".to_string(),
                reason: format!("must be in [0, 1], got {}", self.alpha),
            });
        }

        if !(0.0..=1.0).contains(&self.beta_start) || self.beta_frames == 0 {
            return Err(SacError::InvalidParameter {
                name: "beta".to_string(),
                reason: "beta_start must be in [0, 1] and beta_frames positive".to_string(),
            });
        }

        Ok(PrioritizedReplayBuffer::new(
            capacity,
            self.alpha,
            self.beta_start,
            self.beta_frames,
            self.device,
        ))
    }
}

impl Default for ReplayBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}
