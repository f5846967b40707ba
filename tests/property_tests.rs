#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use progressive_sac::activations::Activation;
    use progressive_sac::device::Device;
    use progressive_sac::layers::WeightInit;
    use progressive_sac::network::{PolicyNetwork, ProgressiveNetwork};
    use progressive_sac::replay_buffer::{PrioritizedReplayBuffer, Transition};
    use ndarray::{Array1, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Strategy for state rows, including very large magnitudes
    fn state_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(prop_oneof![-1e6f32..1e6, -1.0f32..1.0], dim)
    }

    // Regime tags for a run of pushes
    fn regimes_strategy() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(0i32..4, 1..40)
    }

    fn transition(i: usize, regime: i32) -> Transition {
        Transition {
            state: Array1::from_elem(2, i as f32),
            action: Array1::zeros(1),
            reward: 0.0,
            next_state: Array1::from_elem(2, i as f32 + 1.0),
            done: false,
            regime,
        }
    }

    proptest! {
        #[test]
        fn test_sampled_actions_are_bounded(state in state_strategy(4), seed in any::<u64>(), regime in 0i32..3) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut policy = PolicyNetwork::new(4, 2, &[16, 16], Activation::Relu, 2, 0.2, Device::Cpu, &mut rng);
            policy.ensure_regime(regime);
            let batch = Array2::from_shape_vec((1, 4), state).unwrap();

            let sample = policy.sample(batch.view(), Some(regime), &mut rng).unwrap();
            prop_assert!(sample.action.iter().all(|a| a.is_finite() && (-1.0..=1.0).contains(a)));

            let action = policy.deterministic_action(batch.view(), Some(regime), &mut rng).unwrap();
            prop_assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));
        }

        #[test]
        fn test_buffer_invariants(regimes in regimes_strategy(), capacity in 1usize..10, seed in any::<u64>()) {
            let mut buffer = PrioritizedReplayBuffer::new(capacity, 0.6, 0.4, 1000, Device::Cpu);
            let mut rng = StdRng::seed_from_u64(seed);

            for (i, &regime) in regimes.iter().enumerate() {
                buffer.push(transition(i, regime));
                let slot = i % capacity;

                // the slot is indexed under its regime only
                for r in 0..4 {
                    let indexed = buffer.regime_slots(r).map_or(false, |s| s.contains(&slot));
                    prop_assert_eq!(indexed, r == regime);
                }

                let batch_size = buffer.len().min(3);
                let query = if i % 2 == 0 { Some(regime) } else { None };
                let batch = buffer.sample(batch_size, query, &mut rng).unwrap();
                prop_assert_eq!(batch.len(), batch_size);
                prop_assert!(batch.indices.iter().all(|&idx| idx < buffer.len()));
                prop_assert!(batch.weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
                let max_weight = batch.weights.iter().cloned().fold(0.0f32, f32::max);
                prop_assert!((max_weight - 1.0).abs() < 1e-5);
            }
            prop_assert_eq!(buffer.len(), regimes.len().min(capacity));
        }

        #[test]
        fn test_stage_stays_in_range(max_stages in 1usize..6, calls in 0usize..10) {
            let mut rng = StdRng::seed_from_u64(0);
            let mut net = ProgressiveNetwork::new(
                3, 2, &[4, 2], Activation::Relu, Activation::Linear, max_stages,
                &WeightInit::FanInUniform, Device::Cpu, &mut rng,
            );
            let advanced = (0..calls).filter(|_| net.increase_complexity().is_some()).count();
            prop_assert_eq!(advanced, calls.min(max_stages - 1));
            prop_assert!((1..=max_stages).contains(&net.stage()));
        }
    }
}
