//! 2×2 stride-2 max-pooling over NHWC tensors.
//!
//! Same padding with a stride equal to the window means output extents are
//! `ceil(h / 2)` and `ceil(w / 2)`; windows at the bottom/right edge clamp
//! to whatever cells exist. The forward pass records the flat index of
//! each window's maximum so the backward pass can scatter upstream
//! gradients straight onto the winning cells.

use crate::ops::FnTen64To;
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

/// Max-pools each 2×2 window (stride 2, same padding).
///
/// # Returns
/// - Output tensor of shape `(batch, ceil(h/2), ceil(w/2), channels)`
/// - Backward function routing `dL/d(out)` to the argmax cell of each
///   window, zero elsewhere.
///
/// # Panics
/// Panics if `input` is not rank 4.
pub fn max_pool(input: &Ten64) -> (Ten64, Box<FnTen64To>) {
    assert_eq!(
        input.shape.len(),
        4,
        "max_pool expects an NHWC input, got shape {:?}",
        input.shape
    );

    let (b, h, w, c) = (
        input.shape[0],
        input.shape[1],
        input.shape[2],
        input.shape[3],
    );
    let ho = h.div_ceil(2);
    let wo = w.div_ceil(2);

    let input_data = &input.data;
    let mut out_data = vec![0.0f64; b * ho * wo * c];
    let mut switches = vec![0usize; b * ho * wo * c];

    out_data
        .par_chunks_mut(wo * c)
        .zip(switches.par_chunks_mut(wo * c))
        .enumerate()
        .for_each(|(r, (row, sw_row))| {
            let bi = r / ho;
            let oy = r % ho;
            for ox in 0..wo {
                for ch in 0..c {
                    let mut best = f64::NEG_INFINITY;
                    let mut best_idx = 0usize;
                    for iy in (oy * 2)..usize::min(oy * 2 + 2, h) {
                        for ix in (ox * 2)..usize::min(ox * 2 + 2, w) {
                            let idx = ((bi * h + iy) * w + ix) * c + ch;
                            if input_data[idx] > best {
                                best = input_data[idx];
                                best_idx = idx;
                            }
                        }
                    }
                    row[ox * c + ch] = best;
                    sw_row[ox * c + ch] = best_idx;
                }
            }
        });

    let out = Tensor::new(vec![b, ho, wo, c], out_data);
    let in_shape = input.shape.clone();
    let in_len = input.data.len();

    let back = move |grad_output: &Ten64| {
        assert_eq!(
            grad_output.shape,
            vec![b, ho, wo, c],
            "max_pool gradient shape mismatch"
        );
        // Windows never overlap at stride 2, so every switch target is
        // distinct; a plain scatter suffices.
        let mut grad = vec![0.0f64; in_len];
        for (i, &src) in switches.iter().enumerate() {
            grad[src] += grad_output.data[i];
        }
        Tensor::new(in_shape.clone(), grad)
    };

    (out, Box::new(back))
}
