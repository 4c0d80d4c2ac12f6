//! Loss and metric assembly.
//!
//! # Loss/Metric Assembler
//!
//! Composes the scalar training objective and the reported metric from a
//! forward pass:
//!
//! - Sigmoid cross-entropy between binary labels and logits, averaged
//!   over the batch, in the numerically stable formulation
//!   `max(x, 0) - x·z + ln(1 + e^{-|x|})`.
//! - L1 and L2 penalties over every trainable parameter, scaled by the
//!   configured coefficients. A zero coefficient still runs the sum and
//!   contributes exactly `0.0`; the term is never special-cased away.
//! - Binary accuracy with a 0.5 threshold on predicted probabilities.
//!
//! The cross-entropy follows the autograd pattern of the tensor ops: the
//! forward call returns the scalar plus a closure mapping an upstream
//! scalar gradient into a logit-shaped gradient tensor. Penalty gradients
//! skip the closure and accumulate directly into the parameter store,
//! since they touch every parameter rather than one activation.

use crate::ops::FnF64Ten64;
use crate::params::ParamStore;
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

/// Computes sigmoid cross-entropy between `logits` and binary `target`
/// labels, averaged over all elements.
///
/// # Returns
/// - Scalar loss `f64`
/// - Backward function mapping upstream scalar gradient `dL` to a
///   logit-shaped tensor with entries `(σ(x) - z) · dL / n`
///
/// # Panics
/// Panics if shapes of `logits` and `target` differ.
pub fn sigmoid_cross_entropy(logits: &Ten64, target: &Ten64) -> (f64, Box<FnF64Ten64>) {
    assert_eq!(
        logits.shape, target.shape,
        "cross-entropy shape mismatch: logits {:?} vs targets {:?}",
        logits.shape, target.shape
    );

    let n = logits.data.len() as f64;

    let loss = logits
        .data
        .par_iter()
        .zip(target.data.par_iter())
        .map(|(&x, &z)| x.max(0.0) - x * z + (-x.abs()).exp().ln_1p())
        .sum::<f64>()
        / n;

    let shape = logits.shape.clone();
    let logit_data = logits.data.clone();
    let target_data = target.data.clone();

    let back = move |grad_output: f64| {
        let grad: Vec<f64> = logit_data
            .par_iter()
            .zip(target_data.par_iter())
            .map(|(&x, &z)| {
                let p = 1.0 / (1.0 + (-x).exp());
                (p - z) * grad_output / n
            })
            .collect();

        Tensor::new(shape.clone(), grad)
    };

    (loss, Box::new(back))
}

/// Fraction of samples whose thresholded probability agrees with the
/// binary label: `(p ≥ 0.5) == (z > 0.5)`.
///
/// # Panics
/// Panics if shapes differ or the batch is empty.
pub fn binary_accuracy(prob: &Ten64, target: &Ten64) -> f64 {
    assert_eq!(
        prob.shape, target.shape,
        "accuracy shape mismatch: probabilities {:?} vs targets {:?}",
        prob.shape, target.shape
    );
    assert!(!prob.data.is_empty(), "accuracy over an empty batch");

    let hits = prob
        .data
        .iter()
        .zip(&target.data)
        .filter(|&(&p, &z)| (p >= 0.5) == (z > 0.5))
        .count();

    hits as f64 / prob.data.len() as f64
}

/// Sums `lambda_l1 · Σ|w|  +  lambda_l2 · Σ w²/2` over every parameter
/// in the store, biases included.
pub fn regularization_penalty(store: &ParamStore, lambda_l1: f64, lambda_l2: f64) -> f64 {
    let mut l1 = 0.0;
    let mut l2 = 0.0;
    for (_, slot) in store.iter() {
        l1 += slot.value.data.par_iter().map(|w| w.abs()).sum::<f64>();
        l2 += slot.value.data.par_iter().map(|w| w * w).sum::<f64>();
    }
    lambda_l1 * l1 + lambda_l2 * l2 / 2.0
}

/// Adds the penalty gradients `lambda_l1 · sign(w) + lambda_l2 · w` onto
/// the accumulated gradient of every parameter in the store.
pub fn accumulate_regularization_grads(store: &mut ParamStore, lambda_l1: f64, lambda_l2: f64) {
    for (_, slot) in store.iter_mut() {
        let values = &slot.value.data;
        slot.grad
            .data
            .par_iter_mut()
            .zip(values.par_iter())
            .for_each(|(g, &w)| {
                let sign = if w > 0.0 {
                    1.0
                } else if w < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                *g += lambda_l1 * sign + lambda_l2 * w;
            });
    }
}
