//! hashvgg: a VGG-style image-hashing network trainer in Rust.
//!
//! Builds a convolutional backbone with a learned binary-ish hash code
//! and a binary classification head from a declarative config, then
//! trains and evaluates it with a synchronous minibatch loop.
//!
//! # Features
//!
//! - Multi-dimensional tensor management with gradient support.
//! - Core deep learning operations with manual backpropagation closures,
//!   parallelized with `rayon`.
//! - Immutable architecture graph over a separate name-indexed parameter
//!   store.
//! - SGD and Adam updates with continuous per-step learning-rate decay.
//! - Checkpoint serialization with validated loading, tagged by global
//!   step.
//! - Scalar summary logging and sample-weighted held-out evaluation.
//!
//! # Goals
//!
//! - Keep every state transition explicit: parameters move only through
//!   the optimizer step or a checkpoint restore.
//! - Prioritize correctness and explicitness over black-box abstraction.
//!
//! # Modules
//!
//! - [`tensors`] — Core tensor data structures.
//! - [`ops`] — Differentiable operations (conv, pool, dense, activations).
//! - [`params`] — Name-indexed trainable parameter store.
//! - [`config`] — Declarative network description.
//! - [`graph`] — Architecture building, forward passes, backward tape.
//! - [`loss`] — Cross-entropy, penalties, accuracy.
//! - [`optim`] — Update rules, learning-rate decay, the global step.
//! - [`data`] — In-memory dataset slicing and gathering.
//! - [`summary`] — Scalar event logging.
//! - [`modelio`] — Checkpoint saving/loading.
//! - [`model`] — The assembled model and its step surface.
//! - [`train`] — The epoch/batch loop and held-out evaluation.
//!
//! # Example
//!
//! ```rust
//! use hashvgg::config::NetConfig;
//! use hashvgg::model::{HashVgg, ModelOptions};
//!
//! let config = NetConfig {
//!     input: (4, 4, 1),
//!     conv_layers: vec![1],
//!     conv_channels: vec![2],
//!     dense_units: vec![3],
//!     hash_codes: 2,
//!     lambda_l1: 0.0,
//!     lambda_l2: 5e-4,
//! };
//! let model = HashVgg::build(config, ModelOptions::default()).unwrap();
//! assert_eq!(model.global_step(), 0);
//! assert_eq!(model.l_rate(), 0.05);
//! ```

pub mod config;
pub mod data;
pub mod graph;
pub mod loss;
pub mod model;
pub mod modelio;
pub mod ops;
pub mod optim;
pub mod params;
pub mod summary;
pub mod tensors;
pub mod train;
