use mlp_layers::{Activation, AnyLayer, Bias, FullyConnected, Layer, ReLU, Sigmoid, Tensor};

fn main() -> mlp_layers::Result<()> {
    // Classic XOR dataset.
    let x = Tensor::from_rows(&[[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]])?;
    let t = [0.0_f32, 1.0, 1.0, 0.0];

    // 2 -> 8 -> 1 network.
    // ReLU hidden layer, sigmoid output for a probability-like output.
    let mut net: Vec<AnyLayer> = vec![
        FullyConnected::new_with_seed(2, 8, Activation::ReLU, Bias::Enabled, 0)?.into(),
        ReLU::new().into(),
        FullyConnected::new_with_seed(8, 1, Activation::Sigmoid, Bias::Enabled, 1)?.into(),
        Sigmoid::new().into(),
    ];

    let mut loss = 0.0;
    for _ in 0..2_000 {
        let mut y = x.clone();
        for layer in &mut net {
            y = layer.forward(&y);
        }

        let diff: Vec<f32> = y.as_slice().iter().zip(t).map(|(p, t)| p - t).collect();
        loss = diff.iter().map(|d| d * d).sum::<f32>() / diff.len() as f32;

        let mut grad = Tensor::from_flat(diff, 1)?;
        for layer in net.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        for layer in &mut net {
            layer.update(0.1);
        }
    }
    println!("final_mse={loss}");

    let mut y = x.clone();
    for layer in &mut net {
        y = layer.forward(&y);
    }
    for (input, out) in x.rows().zip(y.rows()) {
        println!("x={input:?} y={:?}", out[0]);
    }

    Ok(())
}
