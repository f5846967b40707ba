use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::device::Device;
use crate::layers::WeightInit;
use crate::network::{CriticNetwork, PolicyNetwork, ProgressiveNetwork, StageKind};
use crate::optimizer::{Optimizer, OptimizerWrapper};

fn rng() -> StdRng {
    StdRng::seed_from_u64(21)
}

#[test]
fn test_stage_kinds() {
    assert_eq!(StageKind::for_stage(1), StageKind::Shallow);
    assert_eq!(StageKind::for_stage(2), StageKind::Deep);
    assert_eq!(StageKind::for_stage(3), StageKind::Bottleneck);
    assert_eq!(StageKind::for_stage(5).hidden_layout(&[8, 4]), vec![8, 4, 4, 4, 8]);
}

#[test]
fn test_progressive_training_only_touches_active_stage() {
    let mut net = ProgressiveNetwork::new(
        2, 1, &[6, 6], Activation::Relu, Activation::Linear, 2,
        &WeightInit::FanInUniform, Device::Cpu, &mut rng(),
    );
    net.increase_complexity();
    let frozen = net.stages()[0].clone();

    let mut optimizer = OptimizerWrapper::sgd();
    let x = array![[0.5, -0.5], [1.0, 2.0]];
    for _ in 0..5 {
        net.forward_batch(x.view()).unwrap();
        let (_, grads) = net.backward_batch(Array2::ones((2, 1)).view()).unwrap();
        optimizer.begin_step();
        net.apply_gradients(&mut optimizer, &grads, 0.01);
    }

    let shapes: Vec<_> = net.stages().iter().map(|s| s.shape()).collect();
    assert_eq!(shapes, vec![vec![2, 6, 1], vec![2, 6, 6, 1]]);
    assert_eq!(
        net.stages()[0].predict_batch(x.view()),
        frozen.predict_batch(x.view())
    );
}

#[test]
fn test_policy_and_critic_shapes() {
    let mut rng = rng();
    let mut policy = PolicyNetwork::new(5, 2, &[16, 16], Activation::Relu, 3, 0.2, Device::Cpu, &mut rng);
    let critic = CriticNetwork::new(5, 2, &[16, 8], Activation::Relu, 3, Device::Cpu, &mut rng);
    assert_eq!(critic.feature_dim(), 8);

    let states = Array2::from_shape_fn((4, 5), |(i, j)| (i + j) as f32 * 0.1);
    let sample = policy.sample(states.view(), Some(1), &mut rng).unwrap();
    assert_eq!(sample.action.dim(), (4, 2));
    assert_eq!(sample.log_prob.len(), 4);
    assert!(sample.action.iter().all(|a| (-1.0..=1.0).contains(a)));

    let q = critic.predict_q(states.view(), sample.action.view()).unwrap();
    assert_eq!(q.len(), 4);
}

#[test]
fn test_policy_gradient_step_moves_action_toward_critic() {
    let mut rng = rng();
    let mut policy = PolicyNetwork::new(3, 1, &[16, 16], Activation::Relu, 1, 0.2, Device::Cpu, &mut rng);
    policy.set_training(false);
    let mut optimizer = OptimizerWrapper::adam();
    let states = Array2::from_elem((8, 3), 0.3);

    let before = policy.deterministic_action(states.view(), None, &mut rng).unwrap().mean().unwrap();
    for _ in 0..100 {
        let sample = policy.sample(states.view(), None, &mut rng).unwrap();
        // loss = −mean(action): push actions up
        let grad_action = Array2::from_elem(sample.action.dim(), -1.0 / 8.0);
        let grad_log_prob = ndarray::Array1::zeros(8);
        let grads = policy.backward(&sample, grad_action.view(), grad_log_prob.view()).unwrap();
        optimizer.begin_step();
        policy.apply_gradients(&mut optimizer, &grads, 1e-2);
    }
    let after = policy.deterministic_action(states.view(), None, &mut rng).unwrap().mean().unwrap();
    assert!(after > before + 0.1, "{before} -> {after}");
}
