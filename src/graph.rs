//! Forward computation graph.
//!
//! # Network Architecture Builder
//!
//! Builds the backbone once from a [`NetConfig`](crate::config::NetConfig)
//! as an immutable list of typed op nodes. Trainable tensors are not part
//! of the graph; each parametric node carries the slot index of its
//! parameter in the [`ParamStore`](crate::params::ParamStore) the graph
//! was built against.
//!
//! ## Node sequence
//!
//! For each conv stage `i`: `conv_layers[i]` repetitions of
//! (3×3 conv → ReLU) at `conv_channels[i]` channels, then one 2×2
//! max-pool. Then flatten, then per hidden width: dense → ReLU →
//! optional dropout, each block's output recorded as a hidden
//! activation. With hashing enabled one more dense + sigmoid block of
//! the configured hash width joins the hidden list. The final node is
//! the width-1 dense classification logit, unactivated.
//!
//! ## Modes
//!
//! A forward pass runs in [`Mode::Train`] or [`Mode::Eval`]. Training
//! passes apply dropout and record a tape of backward closures;
//! evaluation passes skip dropout and the caller simply drops the tape.
//! `backward` consumes the tape in reverse, accumulating parameter
//! gradients into the store and chaining activation gradients through
//! each op.

use crate::config::NetConfig;
use crate::ops::{activation, conv, dense, pool, FnTen64To, FnToDoubleTen64, FnToTripleTen64};
use crate::params::{glorot_uniform, ParamStore};
use crate::tensors::Ten64;

/// Forward-pass mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dropout active, backward tape recorded.
    Train,
    /// Deterministic pass; dropout skipped.
    Eval,
}

/// One typed operation in the forward graph.
#[derive(Debug, Clone)]
pub enum Node {
    /// 3×3 same-padding convolution with the filter in the given slot.
    Conv { filter: usize },
    /// ReLU activation.
    Relu,
    /// 2×2 stride-2 max-pool.
    MaxPool,
    /// Collapse sample dimensions into one feature axis.
    Flatten,
    /// Fully-connected layer with weight/bias slots.
    Dense { weight: usize, bias: usize },
    /// Sigmoid activation.
    Sigmoid,
    /// Inverted dropout at the given rate (training passes only).
    Dropout { rate: f64 },
}

/// One recorded backward step.
pub enum TapeOp {
    /// Activation-only op: maps the upstream gradient through.
    Unary(Box<FnTen64To>),
    /// Convolution: splits the gradient into input and filter parts.
    Conv {
        back: Box<FnToDoubleTen64>,
        filter: usize,
    },
    /// Dense layer: splits the gradient into input, weight and bias parts.
    Dense {
        back: Box<FnToTripleTen64>,
        weight: usize,
        bias: usize,
    },
}

/// Everything a forward pass produces.
pub struct ForwardPass {
    /// Dense hidden activations in graph order; the hash code is last
    /// when hashing is enabled.
    pub hidden: Vec<Ten64>,
    /// Unactivated classification logits of shape `(batch, 1)`.
    pub logits: Ten64,
    /// Backward closures in forward order; evaluation callers drop it
    /// unused.
    pub tape: Vec<TapeOp>,
}

/// Immutable op-node list plus the tap points for the hidden list.
#[derive(Debug)]
pub struct Architecture {
    nodes: Vec<Node>,
    hidden_taps: Vec<usize>,
}

impl Architecture {
    /// Assembles the graph for `config` and declares every parameter it
    /// needs into `store` under stable scope-path names.
    ///
    /// # Panics
    /// Panics if the config violates its structural invariants.
    pub fn build(config: &NetConfig, use_hash: bool, dropout: f64, store: &mut ParamStore) -> Self {
        config.validate();

        let mut nodes = Vec::new();
        let mut hidden_taps = Vec::new();

        let mut in_ch = config.input.2;
        for (lay_idx, (&depth, &out_ch)) in config
            .conv_layers
            .iter()
            .zip(&config.conv_channels)
            .enumerate()
        {
            for inner_idx in 0..depth {
                let filter = store.declare(
                    format!("conv/lay_{}/inner_{}/filter", lay_idx, inner_idx),
                    glorot_uniform(vec![3, 3, in_ch, out_ch]),
                );
                nodes.push(Node::Conv { filter });
                nodes.push(Node::Relu);
                in_ch = out_ch;
            }
            nodes.push(Node::MaxPool);
        }

        nodes.push(Node::Flatten);
        let mut width = config.flat_dim();

        for (lay_idx, &units) in config.dense_units.iter().enumerate() {
            let scope = format!("dense/lay_{}", lay_idx);
            Self::push_dense(&mut nodes, store, &scope, width, units);
            nodes.push(Node::Relu);
            if dropout != 0.0 {
                nodes.push(Node::Dropout { rate: dropout });
            }
            hidden_taps.push(nodes.len() - 1);
            width = units;
        }

        if use_hash {
            Self::push_dense(&mut nodes, store, "hash_layer", width, config.hash_codes);
            nodes.push(Node::Sigmoid);
            hidden_taps.push(nodes.len() - 1);
            width = config.hash_codes;
        }

        Self::push_dense(&mut nodes, store, "classification", width, 1);

        Self { nodes, hidden_taps }
    }

    fn push_dense(
        nodes: &mut Vec<Node>,
        store: &mut ParamStore,
        scope: &str,
        in_width: usize,
        out_width: usize,
    ) {
        let weight = store.declare(
            format!("{}/weight", scope),
            glorot_uniform(vec![in_width, out_width]),
        );
        let bias = store.declare(format!("{}/bias", scope), Ten64::zeros(vec![out_width]));
        nodes.push(Node::Dense { weight, bias });
    }

    /// Runs the graph over `input` of shape `(batch, h, w, c)`.
    pub fn forward(&self, store: &ParamStore, input: &Ten64, mode: Mode) -> ForwardPass {
        let mut cur = input.clone();
        let mut tape = Vec::with_capacity(self.nodes.len());
        let mut hidden = Vec::with_capacity(self.hidden_taps.len());

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Conv { filter } => {
                    let (out, back) = conv::conv2d(&cur, &store.get(*filter).value);
                    tape.push(TapeOp::Conv {
                        back,
                        filter: *filter,
                    });
                    cur = out;
                }
                Node::Relu => {
                    let (out, back) = activation::relu(&cur);
                    tape.push(TapeOp::Unary(back));
                    cur = out;
                }
                Node::MaxPool => {
                    let (out, back) = pool::max_pool(&cur);
                    tape.push(TapeOp::Unary(back));
                    cur = out;
                }
                Node::Flatten => {
                    let (out, back) = dense::flatten(&cur);
                    tape.push(TapeOp::Unary(back));
                    cur = out;
                }
                Node::Dense { weight, bias } => {
                    let (out, back) =
                        dense::dense(&cur, &store.get(*weight).value, &store.get(*bias).value);
                    tape.push(TapeOp::Dense {
                        back,
                        weight: *weight,
                        bias: *bias,
                    });
                    cur = out;
                }
                Node::Sigmoid => {
                    let (out, back) = activation::sigmoid(&cur);
                    tape.push(TapeOp::Unary(back));
                    cur = out;
                }
                Node::Dropout { rate } => {
                    if mode == Mode::Train {
                        let (out, back) = activation::dropout(&cur, *rate);
                        tape.push(TapeOp::Unary(back));
                        cur = out;
                    }
                }
            }
            if self.hidden_taps.binary_search(&i).is_ok() {
                hidden.push(cur.clone());
            }
        }

        ForwardPass {
            hidden,
            logits: cur,
            tape,
        }
    }

    /// Walks the tape in reverse, accumulating parameter gradients into
    /// `store` and chaining the activation gradient backwards from
    /// `grad_logits`.
    pub fn backward(&self, store: &mut ParamStore, tape: Vec<TapeOp>, grad_logits: Ten64) {
        let mut grad = grad_logits;
        for op in tape.into_iter().rev() {
            match op {
                TapeOp::Unary(back) => {
                    grad = back(&grad);
                }
                TapeOp::Conv { back, filter } => {
                    let (dx, df) = back(&grad);
                    store.accumulate(filter, &df);
                    grad = dx;
                }
                TapeOp::Dense { back, weight, bias } => {
                    let (dx, dw, db) = back(&grad);
                    store.accumulate(weight, &dw);
                    store.accumulate(bias, &db);
                    grad = dx;
                }
            }
        }
    }

    /// The op nodes in forward order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
