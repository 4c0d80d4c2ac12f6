//! Elementwise activations with autograd support.
//!
//! All three activations parallelize their forward and backward passes
//! with `rayon` and capture only what the backward pass needs: ReLU keeps
//! the input, sigmoid keeps its own output, dropout keeps the mask.

use crate::ops::FnTen64To;
use crate::tensors::{Ten64, Tensor};
use rand::Rng;
use rayon::prelude::*;

/// Applies the ReLU activation (Rectified Linear Unit): `max(0, x)` elementwise.
///
/// # Returns
/// - `out`: Tensor with negatives zeroed.
/// - `back`: Closure mapping `dL/d(out)` to `dL/d(input)` by passing
///   gradients only where input > 0.
///
/// # Example
/// ```rust
/// use hashvgg::ops::activation::relu;
/// use hashvgg::tensor;
///
/// let input = tensor!([[3.0, -3.0], [9.0, 0.0]]);
/// let (out, back) = relu(&input);
/// assert_eq!(out.data, vec![3.0, 0.0, 9.0, 0.0]);
/// let grad_in = back(&tensor!([[2.0, 4.0], [6.0, 3.0]]));
/// assert_eq!(grad_in.data, vec![2.0, 0.0, 6.0, 0.0]);
/// ```
pub fn relu(input: &Ten64) -> (Ten64, Box<FnTen64To>) {
    let shape = input.shape.clone();
    let mut data = vec![0.0f64; input.data.len()];

    data.par_iter_mut()
        .zip(input.data.par_iter())
        .for_each(|(y, &x)| {
            *y = if x > 0.0 { x } else { 0.0 };
        });

    let out = Tensor::new(shape.clone(), data);
    let input_data = input.data.clone();

    let back = move |grad_output: &Ten64| {
        let mut grad = vec![0.0f64; grad_output.data.len()];

        grad.par_iter_mut()
            .zip(input_data.par_iter())
            .zip(grad_output.data.par_iter())
            .for_each(|((g, &x), &dy)| {
                *g = if x > 0.0 { dy } else { 0.0 };
            });

        Tensor::new(shape.clone(), grad)
    };

    (out, Box::new(back))
}

/// Applies the logistic sigmoid `1 / (1 + e^{-x})` elementwise.
///
/// # Returns
/// - `out`: Tensor of values in `(0, 1)`.
/// - `back`: Closure computing `dL/d(input) = dL/d(out) * y * (1 - y)`
///   from the saved forward output.
pub fn sigmoid(input: &Ten64) -> (Ten64, Box<FnTen64To>) {
    let shape = input.shape.clone();
    let mut data = vec![0.0f64; input.data.len()];

    data.par_iter_mut()
        .zip(input.data.par_iter())
        .for_each(|(y, &x)| {
            *y = 1.0 / (1.0 + (-x).exp());
        });

    let out = Tensor::new(shape.clone(), data);
    let y_saved = out.data.clone();

    let back = move |grad_output: &Ten64| {
        let grad: Vec<f64> = y_saved
            .par_iter()
            .zip(grad_output.data.par_iter())
            .map(|(&y, &dy)| dy * y * (1.0 - y))
            .collect();

        Tensor::new(shape.clone(), grad)
    };

    (out, Box::new(back))
}

/// Applies inverted dropout: each element is zeroed with probability
/// `rate`, survivors are scaled by `1 / (1 - rate)` so the expected
/// activation is unchanged.
///
/// Intended for training passes only; evaluation passes skip the op
/// entirely instead of calling it with a zero rate.
///
/// # Returns
/// - `out`: Masked and rescaled tensor.
/// - `back`: Closure applying the same mask to upstream gradients.
///
/// # Panics
/// Panics if `rate` is outside `[0, 1)`.
pub fn dropout(input: &Ten64, rate: f64) -> (Ten64, Box<FnTen64To>) {
    assert!(
        (0.0..1.0).contains(&rate),
        "dropout rate must lie in [0, 1), got {}",
        rate
    );

    let shape = input.shape.clone();
    let keep_scale = 1.0 / (1.0 - rate);
    let mut rng = rand::rng();
    let mask: Vec<f64> = (0..input.data.len())
        .map(|_| {
            if rng.random::<f64>() < rate {
                0.0
            } else {
                keep_scale
            }
        })
        .collect();

    let data: Vec<f64> = input
        .data
        .par_iter()
        .zip(mask.par_iter())
        .map(|(&x, &m)| x * m)
        .collect();

    let out = Tensor::new(shape.clone(), data);

    let back = move |grad_output: &Ten64| {
        let grad: Vec<f64> = grad_output
            .data
            .par_iter()
            .zip(mask.par_iter())
            .map(|(&dy, &m)| dy * m)
            .collect();

        Tensor::new(shape.clone(), grad)
    };

    (out, Box::new(back))
}
