//! Fully-connected layers and flattening.
//!
//! # Dense Kernel
//!
//! `dense` fuses the matrix product with the broadcast bias add the way
//! the network consumes it: `out = x · w + bias`, with `x` of shape
//! `(batch, in)`, `w` of shape `(in, out)`, `bias` of shape `(out,)`.
//! The backward closure produces gradients for all three inputs.
//!
//! `flatten` collapses every non-batch dimension of a feature map into a
//! single feature axis, the bridge between the convolutional stages and
//! the dense stack. It fails fast when the sample dimensions are not
//! fully defined, since downstream weight shapes depend on them.

use crate::ops::{FnTen64To, FnToTripleTen64};
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

/// Computes `x · w + bias` over a batch of row vectors.
///
/// # Returns
/// - Output tensor of shape `(batch, out)`
/// - Backward function computing `(dL/dx, dL/dw, dL/d(bias))`
///
/// # Panics
/// - If `x` or `w` is not rank 2, or `bias` is not rank 1.
/// - If the inner dimensions disagree.
///
/// # Example
/// ```rust
/// use hashvgg::ops::dense::dense;
/// use hashvgg::tensor;
///
/// let x = tensor!([[1.0, 2.0]]);
/// let w = tensor!([[1.0, 0.0], [0.0, 1.0]]);
/// let bias = tensor!([10.0, 20.0]);
/// let (out, _back) = dense(&x, &w, &bias);
/// assert_eq!(out.data, vec![11.0, 22.0]);
/// ```
pub fn dense(x: &Ten64, w: &Ten64, bias: &Ten64) -> (Ten64, Box<FnToTripleTen64>) {
    assert_eq!(x.shape.len(), 2, "dense expects a (batch, in) input, got {:?}", x.shape);
    assert_eq!(w.shape.len(), 2, "dense expects an (in, out) weight, got {:?}", w.shape);
    assert_eq!(bias.shape.len(), 1, "dense expects an (out,) bias, got {:?}", bias.shape);

    let (m, k) = (x.shape[0], x.shape[1]);
    let n = w.shape[1];
    assert_eq!(
        k, w.shape[0],
        "dense shape mismatch: input width {} vs weight height {}",
        k, w.shape[0]
    );
    assert_eq!(
        n,
        bias.shape[0],
        "dense shape mismatch: weight width {} vs bias length {}",
        n,
        bias.shape[0]
    );

    let x_data = &x.data;
    let w_data = &w.data;
    let b_data = &bias.data;

    let mut out_data = vec![0.0f64; m * n];
    out_data
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            row.copy_from_slice(b_data);
            for l in 0..k {
                let xv = x_data[i * k + l];
                let wrow = &w_data[l * n..(l + 1) * n];
                for j in 0..n {
                    row[j] += xv * wrow[j];
                }
            }
        });

    let out = Tensor::new(vec![m, n], out_data);

    let x_saved = x.data.clone();
    let w_saved = w.data.clone();

    let back = move |grad_output: &Ten64| {
        assert_eq!(
            grad_output.shape,
            vec![m, n],
            "dense gradient shape mismatch"
        );
        let g = &grad_output.data;

        // dL/dx = g · wᵀ
        let mut grad_x = vec![0.0f64; m * k];
        grad_x
            .par_chunks_mut(k)
            .enumerate()
            .for_each(|(i, row)| {
                for (l, cell) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    let wrow = &w_saved[l * n..(l + 1) * n];
                    for j in 0..n {
                        acc += g[i * n + j] * wrow[j];
                    }
                    *cell = acc;
                }
            });

        // dL/dw = xᵀ · g
        let mut grad_w = vec![0.0f64; k * n];
        grad_w
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(l, row)| {
                for i in 0..m {
                    let xv = x_saved[i * k + l];
                    for j in 0..n {
                        row[j] += xv * g[i * n + j];
                    }
                }
            });

        // dL/d(bias) = column sums of g
        let mut grad_b = vec![0.0f64; n];
        grad_b.par_iter_mut().enumerate().for_each(|(j, cell)| {
            let mut acc = 0.0;
            for i in 0..m {
                acc += g[i * n + j];
            }
            *cell = acc;
        });

        (
            Tensor::new(vec![m, k], grad_x),
            Tensor::new(vec![k, n], grad_w),
            Tensor::new(vec![n], grad_b),
        )
    };

    (out, Box::new(back))
}

/// Collapses all non-batch dimensions into one feature axis.
///
/// # Returns
/// - Output tensor of shape `(batch, d1 * d2 * … * dn)`
/// - Backward function restoring the original shape
///
/// # Panics
/// Panics if the input has no sample dimensions or any of them is zero;
/// dense weight shapes are derived from the flattened width, so it must
/// be fully defined.
pub fn flatten(input: &Ten64) -> (Ten64, Box<FnTen64To>) {
    assert!(
        input.shape.len() >= 2 && input.shape[1..].iter().all(|&d| d > 0),
        "flatten requires fully-defined sample dimensions, got shape {:?}",
        input.shape
    );

    let batch = input.shape[0];
    let flat: usize = input.shape[1..].iter().product();
    let out = Tensor::new(vec![batch, flat], input.data.clone());

    let in_shape = input.shape.clone();
    let back = move |grad_output: &Ten64| {
        assert_eq!(
            grad_output.shape,
            vec![batch, flat],
            "flatten gradient shape mismatch"
        );
        Tensor::new(in_shape.clone(), grad_output.data.clone())
    };

    (out, Box::new(back))
}
