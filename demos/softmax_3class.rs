use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mlp_layers::{
    Activation, AnyLayer, BatchNormalization, Bias, FullyConnected, Layer, ReLU, SoftMax, Tensor,
    UpdatePolicy,
};

fn main() -> mlp_layers::Result<()> {
    // Tiny synthetic 3-class dataset in 2D.
    // Each class is a blob around a different center.
    let mut rng = StdRng::seed_from_u64(0);

    let centers = [[-1.0_f32, -1.0], [1.0, -1.0], [0.0, 1.0]];
    let n_per_class = 64;
    let mut xs = Vec::with_capacity(3 * n_per_class);
    let mut ys = Vec::with_capacity(3 * n_per_class);

    for (class, center) in centers.iter().enumerate() {
        for _ in 0..n_per_class {
            let x0 = center[0] + rng.random_range(-0.3..0.3);
            let x1 = center[1] + rng.random_range(-0.3..0.3);
            xs.push([x0, x1]);

            let mut one_hot = [0.0_f32; 3];
            one_hot[class] = 1.0;
            ys.push(one_hot);
        }
    }
    let x = Tensor::from_rows(&xs)?;
    let y = Tensor::from_rows(&ys)?;

    let mut net: Vec<AnyLayer> = vec![
        FullyConnected::new_with_rng(2, 16, Activation::ReLU, Bias::Enabled, &mut rng)?
            .with_update_policy(UpdatePolicy::Averaged)
            .into(),
        BatchNormalization::new_with_rng(16, &mut rng)?
            .with_update_policy(UpdatePolicy::Averaged)
            .into(),
        ReLU::new().into(),
        FullyConnected::new_with_rng(16, 3, Activation::SoftMax, Bias::Enabled, &mut rng)?
            .with_update_policy(UpdatePolicy::Averaged)
            .into(),
        SoftMax::new().into(),
    ];

    for epoch in 0..200 {
        let mut p = x.clone();
        for layer in &mut net {
            p = layer.forward(&p);
        }

        // SoftMax::backward is the identity, so feed the combined
        // softmax + cross-entropy gradient `p - y` directly.
        let mut loss = 0.0;
        let mut grad = p.clone();
        for (g, &t) in grad.as_mut_slice().iter_mut().zip(y.as_slice()) {
            if t > 0.0 {
                loss -= g.max(1e-12).ln();
            }
            *g -= t;
        }
        loss /= x.batch_size() as f32;

        for layer in net.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        for layer in &mut net {
            layer.update(0.1);
        }

        if epoch % 50 == 0 {
            println!("epoch={epoch} cross_entropy={loss}");
        }
    }

    let mut p = x.clone();
    for layer in &mut net {
        p = layer.forward(&p);
    }
    let correct = p
        .rows()
        .zip(y.rows())
        .filter(|(p, t)| argmax(p) == argmax(t))
        .count();
    println!("accuracy={}", correct as f32 / x.batch_size() as f32);

    Ok(())
}

fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
