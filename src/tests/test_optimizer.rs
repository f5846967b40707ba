use ndarray::{array, Array2};
use crate::layers::DenseGradients;
use crate::optimizer::{Adam, GradientClipper, Optimizer, OptimizerWrapper, ScalarAdam, SGD};

#[test]
fn test_sgd_update_weights() {
    let mut sgd = SGD::new();
    let mut weights = array![[1.0, 1.0], [1.0, 1.0]];
    let gradients = array![[0.1, 0.2], [0.3, 0.4]];

    sgd.update_weights("w", &mut weights, &gradients, 0.5);

    let expected = array![[0.95, 0.9], [0.85, 0.8]];
    for (w, e) in weights.iter().zip(expected.iter()) {
        assert!((w - e).abs() < 1e-6);
    }
}

#[test]
fn test_adam_first_step_is_learning_rate() {
    let mut adam = Adam::default();
    let mut weights = array![[1.0, 1.0], [1.0, 1.0]];
    let gradients = array![[0.1, 0.2], [0.3, -0.4]];

    adam.begin_step();
    adam.update_weights("w", &mut weights, &gradients, 0.01);

    let expected = array![[0.99, 0.99], [0.99, 1.01]];
    for (w, e) in weights.iter().zip(expected.iter()) {
        assert!((w - e).abs() < 1e-5);
    }
}

#[test]
fn test_adam_state_is_keyed() {
    let mut adam = Adam::default();
    let mut a = Array2::<f32>::zeros((2, 2));
    let mut b = Array2::<f32>::zeros((3, 1));
    adam.begin_step();
    adam.update_weights("stage1.layer0.w", &mut a, &Array2::ones((2, 2)), 0.1);
    adam.update_weights("head.main.w", &mut b, &Array2::ones((3, 1)), 0.1);
    adam.update_biases("head.main.b", &mut array![0.0], &array![1.0], 0.1);
    assert_eq!(adam.tracked_parameters(), 3);
}

#[test]
fn test_wrapper_serializes_state() {
    let mut opt = OptimizerWrapper::adam();
    let mut w = Array2::<f32>::zeros((1, 1));
    opt.begin_step();
    opt.update_weights("w", &mut w, &array![[1.0]], 0.1);

    let bytes = bincode::serialize(&opt).unwrap();
    let restored: OptimizerWrapper = bincode::deserialize(&bytes).unwrap();
    match restored {
        OptimizerWrapper::Adam(adam) => {
            assert_eq!(adam.t, 1);
            assert_eq!(adam.tracked_parameters(), 1);
        }
        OptimizerWrapper::SGD(_) => panic!("expected Adam"),
    }
}

#[test]
fn test_scalar_adam_descends() {
    let mut adam = ScalarAdam::new(0.1);
    let mut x = 3.0f32;
    for _ in 0..200 {
        let grad = 2.0 * x;
        adam.step(&mut x, grad);
    }
    assert!(x.abs() < 0.5);
}

#[test]
fn test_gradient_clipping() {
    let mut g1 = DenseGradients { weights: array![[3.0]], biases: array![0.0] };
    let mut g2 = DenseGradients { weights: array![[0.0]], biases: array![4.0] };

    let clipper = GradientClipper::ClipByGlobalNorm { max_norm: 1.0 };
    let norm = clipper.clip(&mut [&mut g1, &mut g2]);
    assert!((norm - 5.0).abs() < 1e-5);
    assert!((g1.weights[[0, 0]] - 0.6).abs() < 1e-5);
    assert!((g2.biases[0] - 0.8).abs() < 1e-5);

    let mut g3 = DenseGradients { weights: array![[30.0]], biases: array![0.0] };
    GradientClipper::default().clip(&mut [&mut g3]);
    assert_eq!(g3.weights[[0, 0]], 30.0);
}
