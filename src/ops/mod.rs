//! # Differentiable Operations
//!
//! This module groups the tensor operations the network is assembled from,
//! one submodule per op family.
//!
//! ## Submodules
//!
//! - [`activation`] — ReLU, sigmoid, and inverted dropout
//! - [`conv`] — 3×3 stride-1 same-padding NHWC convolution
//! - [`dense`] — fully-connected layer and flattening
//! - [`pool`] — 2×2 stride-2 same-padding max-pooling
//!
//! ## Autograd Pattern
//!
//! Each operation follows a simple pattern:
//! 1. **Inputs** are plain `Ten64` references (activations and, for
//!    parametric ops, parameter values owned by the caller's store).
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** returns a boxed closure capturing minimal cloned
//!    data to compute gradients.
//!
//! The closure aliases below name the three backward arities. Parametric
//! ops return gradients for every input in argument order, activations
//! return a single gradient.
//!
//! ## Usage Guidelines
//!
//! - Operations **panic** on shape mismatches; consistent tensor
//!   dimensions are a build-time contract.
//! - The backward closures implement `Fn`, allowing multiple invocations
//!   if needed.
//! - Forward kernels parallelize over output rows with
//!   [`rayon`](https://docs.rs/rayon); backward kernels mirror that split.

pub mod activation;
pub mod conv;
pub mod dense;
pub mod pool;

use crate::tensors::Ten64;

/// Backward closure mapping `dL/d(out)` to `dL/d(input)`.
pub type FnTen64To = dyn Fn(&Ten64) -> Ten64;

/// Backward closure mapping `dL/d(out)` to `(dL/d(input), dL/d(filter))`.
pub type FnToDoubleTen64 = dyn Fn(&Ten64) -> (Ten64, Ten64);

/// Backward closure mapping `dL/d(out)` to
/// `(dL/d(input), dL/d(weight), dL/d(bias))`.
pub type FnToTripleTen64 = dyn Fn(&Ten64) -> (Ten64, Ten64, Ten64);

/// Backward closure mapping an upstream scalar gradient to a tensor
/// gradient (used by scalar losses).
pub type FnF64Ten64 = dyn Fn(f64) -> Ten64;
