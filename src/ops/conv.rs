//! 2D convolution over NHWC tensors.
//!
//! # Convolution Kernel
//!
//! Implements the stride-1, same-padding convolution the backbone stacks
//! repeat, with autograd closures for the filter and input gradients.
//!
//! ## Layout
//!
//! - Input: `(batch, height, width, in_channels)`, row-major
//! - Filter: `(kh, kw, in_channels, out_channels)`, odd `kh`/`kw`
//! - Output: `(batch, height, width, out_channels)` (same padding keeps
//!   the spatial extent)
//!
//! Convolution layers carry no bias term; a ReLU directly follows each
//! one in the backbone.
//!
//! ## Parallelism
//!
//! The forward pass and the input-gradient pass parallelize over output
//! rows, the filter-gradient pass over filter rows, all via `rayon`'s
//! `par_chunks_mut`.

use crate::ops::FnToDoubleTen64;
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

/// Convolves `input` with `filter` (stride 1, same padding).
///
/// # Returns
/// - Output tensor of shape `(batch, h, w, out_channels)`
/// - Backward function computing `(dL/d(input), dL/d(filter))`
///
/// # Panics
/// - If either tensor is not rank 4.
/// - If the kernel extent is even.
/// - If the filter's input-channel count does not match the input.
pub fn conv2d(input: &Ten64, filter: &Ten64) -> (Ten64, Box<FnToDoubleTen64>) {
    assert_eq!(
        input.shape.len(),
        4,
        "conv2d expects an NHWC input, got shape {:?}",
        input.shape
    );
    assert_eq!(
        filter.shape.len(),
        4,
        "conv2d expects a (kh, kw, in, out) filter, got shape {:?}",
        filter.shape
    );

    let (b, h, w, cin) = (
        input.shape[0],
        input.shape[1],
        input.shape[2],
        input.shape[3],
    );
    let (kh, kw, fin, cout) = (
        filter.shape[0],
        filter.shape[1],
        filter.shape[2],
        filter.shape[3],
    );
    assert!(
        kh % 2 == 1 && kw % 2 == 1,
        "same padding requires odd kernel extents, got {}x{}",
        kh,
        kw
    );
    assert_eq!(
        cin, fin,
        "conv2d channel mismatch: input holds {} channels, filter expects {}",
        cin, fin
    );

    let (ph, pw) = (kh / 2, kw / 2);
    let input_data = &input.data;
    let filter_data = &filter.data;

    let mut out_data = vec![0.0f64; b * h * w * cout];
    out_data
        .par_chunks_mut(w * cout)
        .enumerate()
        .for_each(|(r, row)| {
            let bi = r / h;
            let y = r % h;
            for x in 0..w {
                for dy in 0..kh {
                    let iy = y as isize + dy as isize - ph as isize;
                    if iy < 0 || iy >= h as isize {
                        continue;
                    }
                    for dx in 0..kw {
                        let ix = x as isize + dx as isize - pw as isize;
                        if ix < 0 || ix >= w as isize {
                            continue;
                        }
                        let in_base = ((bi * h + iy as usize) * w + ix as usize) * cin;
                        let f_base = (dy * kw + dx) * cin;
                        for c in 0..cin {
                            let xv = input_data[in_base + c];
                            let fw = &filter_data[(f_base + c) * cout..(f_base + c + 1) * cout];
                            let acc = &mut row[x * cout..(x + 1) * cout];
                            for o in 0..cout {
                                acc[o] += xv * fw[o];
                            }
                        }
                    }
                }
            }
        });

    let out = Tensor::new(vec![b, h, w, cout], out_data);

    let input_saved = input.data.clone();
    let filter_saved = filter.data.clone();

    let back = move |grad_output: &Ten64| {
        assert_eq!(
            grad_output.shape,
            vec![b, h, w, cout],
            "conv2d gradient shape mismatch"
        );
        let dout = &grad_output.data;

        // dL/d(input): route each upstream cell back through the filter taps.
        let mut grad_in = vec![0.0f64; b * h * w * cin];
        grad_in
            .par_chunks_mut(w * cin)
            .enumerate()
            .for_each(|(r, row)| {
                let bi = r / h;
                let iy = r % h;
                for dy in 0..kh {
                    let y = iy as isize + ph as isize - dy as isize;
                    if y < 0 || y >= h as isize {
                        continue;
                    }
                    for dx in 0..kw {
                        let f_base = (dy * kw + dx) * cin;
                        for ix in 0..w {
                            let x = ix as isize + pw as isize - dx as isize;
                            if x < 0 || x >= w as isize {
                                continue;
                            }
                            let out_base = ((bi * h + y as usize) * w + x as usize) * cout;
                            for c in 0..cin {
                                let mut acc = 0.0;
                                let fw =
                                    &filter_saved[(f_base + c) * cout..(f_base + c + 1) * cout];
                                for o in 0..cout {
                                    acc += fw[o] * dout[out_base + o];
                                }
                                row[ix * cin + c] += acc;
                            }
                        }
                    }
                }
            });

        // dL/d(filter): one reduction over every spatial position per tap.
        let mut grad_f = vec![0.0f64; kh * kw * cin * cout];
        grad_f
            .par_chunks_mut(cout)
            .enumerate()
            .for_each(|(f, row)| {
                let dy = f / (kw * cin);
                let rem = f % (kw * cin);
                let dx = rem / cin;
                let c = rem % cin;
                for bi in 0..b {
                    for y in 0..h {
                        let iy = y as isize + dy as isize - ph as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for x in 0..w {
                            let ix = x as isize + dx as isize - pw as isize;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            let xv = input_saved
                                [((bi * h + iy as usize) * w + ix as usize) * cin + c];
                            let out_base = ((bi * h + y) * w + x) * cout;
                            for o in 0..cout {
                                row[o] += xv * dout[out_base + o];
                            }
                        }
                    }
                }
            });

        (
            Tensor::new(vec![b, h, w, cin], grad_in),
            Tensor::new(vec![kh, kw, cin, cout], grad_f),
        )
    };

    (out, Box::new(back))
}
