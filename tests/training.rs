use mlp_layers::{
    Activation, AnyLayer, BatchNormalization, Bias, BinaryAct, CenterNormalization, Float,
    FullyConnected, Layer, Linear, MeanNormalization, ReLU, Sigmoid, SoftMax, Tensor,
    UpdatePolicy,
};

fn forward_all(net: &mut [AnyLayer], x: &Tensor) -> Tensor {
    net.iter_mut().fold(x.clone(), |y, layer| layer.forward(&y))
}

fn backward_all(net: &mut [AnyLayer], grad: Tensor) -> Tensor {
    net.iter_mut().rev().fold(grad, |g, layer| layer.backward(&g))
}

/// Returns `0.5 * mean squared error` and its gradient per output (not batch-averaged).
fn mse_and_grad(pred: &Tensor, target: &Tensor) -> (Float, Tensor) {
    assert_eq!(pred.shape(), target.shape());
    let diff: Vec<Float> = pred
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(p, t)| p - t)
        .collect();
    let loss = diff.iter().map(|d| 0.5 * d * d).sum::<Float>() / diff.len() as Float;
    (loss, Tensor::from_flat(diff, pred.features()).unwrap())
}

#[test]
fn learns_xor() {
    let x = Tensor::from_rows(&[[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]).unwrap();
    let t = Tensor::from_rows(&[[0.0_f32], [1.0], [1.0], [0.0]]).unwrap();

    let mut net: Vec<AnyLayer> = vec![
        FullyConnected::new_with_seed(2, 16, Activation::ReLU, Bias::Enabled, 0)
            .unwrap()
            .into(),
        ReLU::new().into(),
        FullyConnected::new_with_seed(16, 1, Activation::Sigmoid, Bias::Enabled, 1)
            .unwrap()
            .into(),
        Sigmoid::new().into(),
    ];

    let (initial, _) = mse_and_grad(&forward_all(&mut net, &x), &t);
    let mut last = initial;
    for _ in 0..3_000 {
        let pred = forward_all(&mut net, &x);
        let (loss, grad) = mse_and_grad(&pred, &t);
        last = loss;
        backward_all(&mut net, grad);
        for layer in &mut net {
            layer.update(0.25);
        }
    }

    assert!(last < initial, "loss did not decrease: {initial} -> {last}");
    assert!(last < 0.05, "xor not learned, final loss {last}");
}

#[test]
fn dense_layer_fits_a_linear_target() {
    // y = 2 * x0 - 3 * x1 + 1
    let rows: Vec<[Float; 2]> = (0..16)
        .map(|i| [(i % 4) as Float / 4.0, (i / 4) as Float / 4.0])
        .collect();
    let x = Tensor::from_rows(&rows).unwrap();
    let targets: Vec<Float> = rows.iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 1.0).collect();
    let t = Tensor::from_flat(targets, 1).unwrap();

    let mut layer = FullyConnected::new_with_seed(2, 1, Activation::Identity, Bias::Enabled, 7)
        .unwrap()
        .with_update_policy(UpdatePolicy::Averaged);

    for _ in 0..5_000 {
        let pred = layer.forward(&x);
        let (_, grad) = mse_and_grad(&pred, &t);
        layer.backward(&grad);
        layer.update(0.5);
    }

    let w = layer.weights();
    let b = layer.biases().unwrap();
    assert!((w[0] - 2.0).abs() < 1e-2, "w={w:?}");
    assert!((w[1] + 3.0).abs() < 1e-2, "w={w:?}");
    assert!((b[0] - 1.0).abs() < 1e-2, "b={b:?}");
}

#[test]
fn sequential_step_is_batch_size_times_averaged_step() {
    let x = Tensor::from_rows(&[[1.0_f32, 2.0], [0.5, -1.0], [3.0, 0.0]]).unwrap();
    let grad = Tensor::from_rows(&[[0.5_f32], [-1.0], [2.0]]).unwrap();

    let base = FullyConnected::new_with_seed(2, 1, Activation::Identity, Bias::Enabled, 3).unwrap();
    let step = |policy: UpdatePolicy| -> Vec<Float> {
        let mut layer = base.clone().with_update_policy(policy);
        layer.forward(&x);
        layer.backward(&grad);
        layer.update(0.1);
        layer
            .weights()
            .iter()
            .zip(base.weights())
            .map(|(after, before)| after - before)
            .collect()
    };

    let seq = step(UpdatePolicy::Sequential);
    let avg = step(UpdatePolicy::Averaged);
    for (s, a) in seq.iter().zip(&avg) {
        assert!((s - 3.0 * a).abs() < 1e-5, "seq={seq:?} avg={avg:?}");
    }
}

#[test]
fn every_layer_returns_input_shaped_gradients() {
    let x = Tensor::from_rows(&[
        [0.5_f32, -1.0, 2.0, 0.0],
        [1.5, 0.25, -0.75, 3.0],
        [0.0, 0.0, 0.0, 0.0],
    ])
    .unwrap();

    let mut layers: Vec<AnyLayer> = vec![
        Linear::new().into(),
        Sigmoid::new().into(),
        SoftMax::new().into(),
        ReLU::new().into(),
        BinaryAct::new().into(),
        FullyConnected::new_with_seed(4, 4, Activation::Sigmoid, Bias::Disabled, 0)
            .unwrap()
            .into(),
        BatchNormalization::new_with_seed(4, 0).unwrap().into(),
        MeanNormalization::new(4).unwrap().into(),
        CenterNormalization::new(4).unwrap().into(),
    ];

    for layer in &mut layers {
        let y = layer.forward(&x);
        assert_eq!(y.shape(), x.shape(), "{}", layer.name());
        let dx = layer.backward(&y);
        assert_eq!(dx.shape(), x.shape(), "{}", layer.name());
        assert!(dx.as_slice().iter().all(|v| v.is_finite()), "{}", layer.name());
        layer.update(0.01);
    }
}

#[test]
fn normalized_stack_trains_without_blowing_up() {
    let x = Tensor::from_rows(&[
        [0.1_f32, 0.9, 0.3],
        [0.8, 0.2, 0.5],
        [0.4, 0.4, 0.9],
        [0.7, 0.6, 0.1],
    ])
    .unwrap();
    let t = Tensor::from_rows(&[
        [1.0_f32, 0.0],
        [0.0, 1.0],
        [1.0, 0.0],
        [0.0, 1.0],
    ])
    .unwrap();

    let mut net: Vec<AnyLayer> = vec![
        FullyConnected::new_with_seed(3, 6, Activation::ReLU, Bias::Enabled, 11)
            .unwrap()
            .into(),
        BatchNormalization::new_with_seed(6, 12).unwrap().into(),
        ReLU::new().into(),
        FullyConnected::new_with_seed(6, 2, Activation::SoftMax, Bias::Enabled, 13)
            .unwrap()
            .into(),
        SoftMax::new().into(),
    ];

    for _ in 0..200 {
        let p = forward_all(&mut net, &x);
        // Softmax + cross-entropy: dL/dlogits = p - t.
        let (_, grad) = mse_and_grad(&p, &t);
        backward_all(&mut net, grad);
        for layer in &mut net {
            layer.update(0.05);
        }
    }

    let p = forward_all(&mut net, &x);
    for row in p.rows() {
        let sum: Float = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(row.iter().all(|v| v.is_finite()));
    }
}
