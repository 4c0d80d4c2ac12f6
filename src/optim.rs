//! Parameter updates and learning-rate scheduling.
//!
//! # Optimizer/Step Scheduler
//!
//! The optimizer owns the learning-rate scalar and the global step
//! counter. Two variants are supported:
//!
//! - **SGD**: `param -= lr · grad` with the owned, decaying rate.
//! - **Adam**: adaptive moment estimation with its own fixed internal
//!   rate; first/second moments are kept per parameter, keyed by the
//!   parameter's stable name. The owned rate scalar still exists (and
//!   still decays) but Adam never reads it.
//!
//! Both variants zero every accumulated gradient after applying the
//! update and advance the global step exactly once per call.
//!
//! Decay is a separate operation: after every training step the caller
//! multiplies the rate by `1 - decay`, unconditionally. `reset_lr`
//! restores the configured start rate on demand and is never invoked
//! automatically.

use crate::params::ParamStore;
use crate::tensors::Ten64;
use std::collections::HashMap;
use std::str::FromStr;

const ADAM_LR: f64 = 0.001;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Supported update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    /// Plain gradient descent on the decaying owned rate.
    Sgd,
    /// Adaptive moment estimation with internal defaults.
    Adam,
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sgd" => Ok(Self::Sgd),
            "adam" => Ok(Self::Adam),
            other => Err(format!("unrecognized optimizer {:?}", other)),
        }
    }
}

/// Update rule plus the scheduling state it owns.
#[derive(Debug)]
pub struct Optimizer {
    kind: OptimizerKind,
    l_rate: f64,
    start_lr: f64,
    decay_factor: f64,
    global_step: u64,
    moments: HashMap<String, (Ten64, Ten64)>,
}

impl Optimizer {
    /// Creates an optimizer with rate `start_lr` and per-step decay
    /// coefficient `decay` (the rate is multiplied by `1 - decay`).
    pub fn new(kind: OptimizerKind, start_lr: f64, decay: f64) -> Self {
        Self {
            kind,
            l_rate: start_lr,
            start_lr,
            decay_factor: 1.0 - decay,
            global_step: 0,
            moments: HashMap::new(),
        }
    }

    /// Current learning rate.
    pub fn l_rate(&self) -> f64 {
        self.l_rate
    }

    /// Number of completed training steps.
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Overrides the step counter (checkpoint restore).
    pub fn set_global_step(&mut self, step: u64) {
        self.global_step = step;
    }

    /// Resets the learning rate to the configured start value.
    pub fn reset_lr(&mut self) {
        self.l_rate = self.start_lr;
    }

    /// Multiplies the learning rate by `1 - decay`; call once after
    /// every training step.
    pub fn decay(&mut self) {
        self.l_rate *= self.decay_factor;
    }

    /// Applies one update to every parameter in the store, zeroes the
    /// gradients, and advances the global step.
    pub fn step(&mut self, store: &mut ParamStore) {
        match self.kind {
            OptimizerKind::Sgd => {
                let lr = self.l_rate;
                for (_, slot) in store.iter_mut() {
                    for (w, g) in slot.value.data.iter_mut().zip(&slot.grad.data) {
                        *w -= lr * *g;
                    }
                    slot.zero_grad();
                }
            }
            OptimizerKind::Adam => {
                let t = (self.global_step + 1) as f64;
                let bc1 = 1.0 - ADAM_BETA1.powf(t);
                let bc2 = 1.0 - ADAM_BETA2.powf(t);
                for (name, slot) in store.iter_mut() {
                    let (m, v) = self.moments.entry(name.to_string()).or_insert_with(|| {
                        (
                            Ten64::zeros(slot.value.shape.clone()),
                            Ten64::zeros(slot.value.shape.clone()),
                        )
                    });
                    for i in 0..slot.value.data.len() {
                        let g = slot.grad.data[i];
                        m.data[i] = ADAM_BETA1 * m.data[i] + (1.0 - ADAM_BETA1) * g;
                        v.data[i] = ADAM_BETA2 * v.data[i] + (1.0 - ADAM_BETA2) * g * g;
                        let m_hat = m.data[i] / bc1;
                        let v_hat = v.data[i] / bc2;
                        slot.value.data[i] -= ADAM_LR * m_hat / (v_hat.sqrt() + ADAM_EPS);
                    }
                    slot.zero_grad();
                }
            }
        }
        self.global_step += 1;
    }
}
