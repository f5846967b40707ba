use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::device::Device;
use crate::error::{Result, SacError};
use crate::types::RegimeId;

/// Smallest priority used for sampling, so every stored slot stays reachable
/// and importance weights stay finite.
pub const PRIORITY_FLOOR: f32 = 1e-6;

/// One recorded environment step
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: Array1<f32>,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
    pub regime: RegimeId,
}

/// A sampled minibatch, stacked row-wise
#[derive(Clone, Debug)]
pub struct SampledBatch {
    pub states: Array2<f32>,
    pub actions: Array2<f32>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    pub dones: Array1<f32>,
    /// Buffer slots the rows were drawn from
    pub indices: Vec<usize>,
    /// Importance-sampling weights, max-normalized to 1
    pub weights: Array1<f32>,
    pub regimes: Vec<RegimeId>,
}

impl SampledBatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The regime shared by every row, if there is exactly one.
    pub fn dominant_regime(&self) -> Option<RegimeId> {
        let first = *self.regimes.first()?;
        self.regimes.iter().all(|&r| r == first).then_some(first)
    }
}

/// Fixed-capacity circular buffer with proportional prioritization and a
/// per-regime slot index.
///
/// Not synchronized; wrap in a mutex if several threads push and sample.
#[derive(Clone, Debug)]
pub struct PrioritizedReplayBuffer {
    buffer: Vec<Transition>,
    priorities: Vec<f32>,
    capacity: usize,
    position: usize,
    alpha: f32,
    beta_start: f32,
    beta_frames: usize,
    frame: usize,
    regime_slots: BTreeMap<RegimeId, BTreeSet<usize>>,
    device: Device,
}

impl PrioritizedReplayBuffer {
    pub fn new(capacity: usize, alpha: f32, beta_start: f32, beta_frames: usize, device: Device) -> Self {
        PrioritizedReplayBuffer {
            buffer: Vec::with_capacity(capacity),
            priorities: vec![0.0; capacity],
            capacity,
            position: 0,
            alpha,
            beta_start,
            beta_frames: beta_frames.max(1),
            frame: 1,
            regime_slots: BTreeMap::new(),
            device,
        }
    }

    /// Store a transition at the next circular slot with the current max priority.
    pub fn push(&mut self, transition: Transition) {
        let max_priority = self.max_priority();
        let slot = self.position;
        let regime = transition.regime;

        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[slot] = transition;
        }
        self.priorities[slot] = max_priority;

        // One slot, one regime.
        for (&r, slots) in self.regime_slots.iter_mut() {
            if r != regime {
                slots.remove(&slot);
            }
        }
        self.regime_slots.entry(regime).or_default().insert(slot);

        self.position = (self.position + 1) % self.capacity;
    }

    fn max_priority(&self) -> f32 {
        if self.buffer.is_empty() {
            return 1.0;
        }
        let max = self.priorities[..self.buffer.len()]
            .iter()
            .fold(0.0f32, |m, &p| m.max(p));
        if max > 0.0 { max } else { 1.0 }
    }

    /// Current importance-sampling exponent
    pub fn beta(&self) -> f32 {
        let progress = self.frame as f32 / self.beta_frames as f32;
        (self.beta_start + (1.0 - self.beta_start) * progress).min(1.0)
    }

    /// `priority^α` per slot, with priorities floored at [`PRIORITY_FLOOR`]
    fn sampling_weights(&self, slots: &[usize]) -> Vec<f32> {
        let floor = PRIORITY_FLOOR.powf(self.alpha);
        slots
            .iter()
            .map(|&i| {
                let p = self.priorities[i].max(PRIORITY_FLOOR).powf(self.alpha);
                if p.is_finite() { p } else { floor }
            })
            .collect()
    }

    fn draw<R: Rng + ?Sized>(&self, pool: &[usize], count: usize, rng: &mut R) -> Result<Vec<usize>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let dist = WeightedIndex::new(self.sampling_weights(pool))
            .map_err(|e| SacError::invalid_parameter("priorities".to_string(), e.to_string()))?;
        Ok((0..count).map(|_| pool[dist.sample(rng)]).collect())
    }

    /// Sample `batch_size` transitions.
    ///
    /// With a `regime` that has stored slots, half of the batch (rounded
    /// down, capped by the regime's slot count) is drawn from that regime and
    /// the rest from the whole buffer. Each call advances β.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        batch_size: usize,
        regime: Option<RegimeId>,
        rng: &mut R,
    ) -> Result<SampledBatch> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return Err(SacError::InsufficientData {
                required: batch_size.max(1),
                available: self.buffer.len(),
            });
        }

        let all: Vec<usize> = (0..self.buffer.len()).collect();
        let regime_pool: Option<Vec<usize>> = regime
            .and_then(|r| self.regime_slots.get(&r))
            .filter(|slots| !slots.is_empty())
            .map(|slots| slots.iter().copied().collect());

        let indices = match regime_pool {
            Some(pool) => {
                let regime_size = (batch_size / 2).min(pool.len());
                let mut indices = self.draw(&pool, regime_size, rng)?;
                indices.extend(self.draw(&all, batch_size - regime_size, rng)?);
                indices
            }
            None => self.draw(&all, batch_size, rng)?,
        };

        let beta = self.beta();
        self.frame = (self.frame + 1).min(self.beta_frames);

        // IS weights use the whole-buffer distribution for every row.
        let priority_weights = self.sampling_weights(&all);
        let total: f32 = priority_weights.iter().sum();
        let n = self.buffer.len() as f32;
        let mut weights: Array1<f32> = indices
            .iter()
            .map(|&i| (n * priority_weights[i] / total).powf(-beta))
            .collect();
        let max_weight = weights.iter().fold(0.0f32, |m, &w| m.max(w));
        if max_weight > 0.0 && max_weight.is_finite() {
            weights.mapv_inplace(|w| w / max_weight);
        } else {
            weights.fill(1.0);
        }

        Ok(self.stack(indices, weights))
    }

    fn stack(&self, indices: Vec<usize>, weights: Array1<f32>) -> SampledBatch {
        let first = &self.buffer[indices[0]];
        let (state_dim, action_dim) = (first.state.len(), first.action.len());
        let batch = indices.len();

        let mut states = self.device.zeros2((batch, state_dim));
        let mut actions = self.device.zeros2((batch, action_dim));
        let mut next_states = self.device.zeros2((batch, state_dim));
        let mut rewards = self.device.zeros1(batch);
        let mut dones = self.device.zeros1(batch);
        let mut regimes = Vec::with_capacity(batch);

        for (row, &i) in indices.iter().enumerate() {
            let t = &self.buffer[i];
            states.row_mut(row).assign(&t.state);
            actions.row_mut(row).assign(&t.action);
            next_states.row_mut(row).assign(&t.next_state);
            rewards[row] = t.reward;
            dones[row] = if t.done { 1.0 } else { 0.0 };
            regimes.push(t.regime);
        }

        SampledBatch { states, actions, rewards, next_states, dones, indices, weights, regimes }
    }

    /// Overwrite priorities at the given slots.
    pub fn update_priorities(&mut self, indices: &[usize], priorities: &[f32]) {
        for (&idx, &priority) in indices.iter().zip(priorities.iter()) {
            if idx < self.buffer.len() {
                self.priorities[idx] = if priority.is_finite() { priority.max(0.0) } else { 0.0 };
            }
        }
    }

    pub fn priority(&self, slot: usize) -> Option<f32> {
        (slot < self.buffer.len()).then(|| self.priorities[slot])
    }

    /// Slots currently holding `regime`
    pub fn regime_slots(&self, regime: RegimeId) -> Option<&BTreeSet<usize>> {
        self.regime_slots.get(&regime)
    }

    pub fn get(&self, slot: usize) -> Option<&Transition> {
        self.buffer.get(slot)
    }

    pub fn can_sample(&self, batch_size: usize) -> bool {
        batch_size > 0 && self.buffer.len() >= batch_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(x: f32, regime: RegimeId) -> Transition {
        Transition {
            state: array![x, -x],
            action: array![0.1],
            reward: x,
            next_state: array![x + 1.0, -x - 1.0],
            done: false,
            regime,
        }
    }

    #[test]
    fn test_first_push_gets_unit_priority() {
        let mut buffer = PrioritizedReplayBuffer::new(4, 0.6, 0.4, 100, Device::Cpu);
        buffer.push(transition(0.0, 1));
        assert_eq!(buffer.priority(0), Some(1.0));
        buffer.update_priorities(&[0], &[3.0]);
        buffer.push(transition(1.0, 1));
        assert_eq!(buffer.priority(1), Some(3.0));
    }

    #[test]
    fn test_sample_too_large_is_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = PrioritizedReplayBuffer::new(4, 0.6, 0.4, 100, Device::Cpu);
        buffer.push(transition(0.0, 1));
        assert!(matches!(
            buffer.sample(2, None, &mut rng),
            Err(SacError::InsufficientData { required: 2, available: 1 })
        ));
    }

    #[test]
    fn test_beta_anneals_to_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut buffer = PrioritizedReplayBuffer::new(8, 0.6, 0.4, 4, Device::Cpu);
        for i in 0..4 {
            buffer.push(transition(i as f32, 0));
        }
        assert!((buffer.beta() - 0.55).abs() < 1e-6);
        for _ in 0..10 {
            buffer.sample(2, None, &mut rng).unwrap();
        }
        assert!((buffer.beta() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_shapes_and_weights() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut buffer = PrioritizedReplayBuffer::new(16, 0.6, 0.4, 100, Device::Cpu);
        for i in 0..10 {
            buffer.push(transition(i as f32, i % 3));
        }
        buffer.update_priorities(&[0, 1, 2], &[5.0, 0.1, 2.0]);
        let batch = buffer.sample(6, Some(2), &mut rng).unwrap();
        assert_eq!(batch.states.dim(), (6, 2));
        assert_eq!(batch.actions.dim(), (6, 1));
        assert_eq!(batch.len(), 6);
        let max = batch.weights.iter().cloned().fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(batch.weights.iter().all(|&w| w >= 0.0));
        // the first half comes from regime 2
        assert!(batch.regimes[..3].iter().all(|&r| r == 2));
    }

    #[test]
    fn test_zero_priorities_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut buffer = PrioritizedReplayBuffer::new(4, 0.6, 0.4, 100, Device::Cpu);
        for i in 0..4 {
            buffer.push(transition(i as f32, 0));
        }
        buffer.update_priorities(&[0, 1, 2, 3], &[0.0, 0.0, 0.0, f32::NAN]);
        let batch = buffer.sample(4, None, &mut rng).unwrap();
        assert!(batch.weights.iter().all(|&w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_zero_priority_regime_keeps_weight_correction() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut buffer = PrioritizedReplayBuffer::new(4, 0.6, 0.4, 100, Device::Cpu);
        for (i, regime) in [1, 1, 2, 2].into_iter().enumerate() {
            buffer.push(transition(i as f32, regime));
        }
        buffer.update_priorities(&[0, 1, 2, 3], &[5.0, 0.1, 0.0, 0.0]);

        let mut high_priority_rows = 0;
        for _ in 0..20 {
            let batch = buffer.sample(4, Some(2), &mut rng).unwrap();
            assert!(batch.weights.iter().all(|w| w.is_finite()));
            assert!(batch.regimes[..2].iter().all(|&r| r == 2));
            for (&slot, &w) in batch.indices.iter().zip(batch.weights.iter()) {
                match slot {
                    2 | 3 => assert!((w - 1.0).abs() < 1e-6),
                    0 => {
                        high_priority_rows += 1;
                        assert!(w < 0.5, "slot 0 weight {w}");
                    }
                    _ => {}
                }
            }
        }
        assert!(high_priority_rows > 0);
    }

    #[test]
    fn test_dominant_regime() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut buffer = PrioritizedReplayBuffer::new(4, 0.6, 0.4, 100, Device::Cpu);
        for i in 0..4 {
            buffer.push(transition(i as f32, 7));
        }
        let batch = buffer.sample(3, None, &mut rng).unwrap();
        assert_eq!(batch.dominant_regime(), Some(7));
    }
}
