//! Trainable parameter storage.
//!
//! # Parameter Store
//!
//! All trainable tensors live in one `ParamStore`, separate from the
//! immutable architecture graph that references them. Each parameter is
//! declared once at build time under a stable scope-path name (for
//! example `conv/lay_0/inner_1/filter` or `dense/lay_0/bias`) and is
//! addressed by its slot index afterwards; the name survives into
//! checkpoints so restores match parameters by identity rather than by
//! declaration order.
//!
//! ## Design Highlights
//! - Slots are insertion-ordered `WithGrad<Ten64>` cells; iteration order
//!   is declaration order, so checkpoints are deterministic
//! - A name index enforces uniqueness and serves restore-by-name
//! - Gradient accumulation is additive; the optimizer zeroes gradients
//!   after each applied step

use crate::tensors::{Ten64, Tensor, WithGrad};
use rand::Rng;
use std::collections::HashMap;
use std::error::Error;

/// Ordered, name-indexed collection of trainable parameters.
#[derive(Debug, Default)]
pub struct ParamStore {
    names: Vec<String>,
    slots: Vec<WithGrad<Ten64>>,
    index: HashMap<String, usize>,
}

impl ParamStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new parameter and returns its slot index.
    ///
    /// # Panics
    /// Panics if the name is already taken.
    pub fn declare(&mut self, name: impl Into<String>, value: Ten64) -> usize {
        let name = name.into();
        let idx = self.slots.len();
        let prev = self.index.insert(name.clone(), idx);
        assert!(prev.is_none(), "duplicate parameter name {:?}", name);
        self.names.push(name);
        self.slots.push(WithGrad::new(value));
        idx
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows a parameter slot by index.
    pub fn get(&self, idx: usize) -> &WithGrad<Ten64> {
        &self.slots[idx]
    }

    /// Looks up a slot index by parameter name.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Name of the parameter in the given slot.
    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    /// Iterates `(name, slot)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WithGrad<Ten64>)> {
        self.names.iter().map(String::as_str).zip(self.slots.iter())
    }

    /// Iterates `(name, slot)` pairs with mutable slots, in declaration
    /// order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut WithGrad<Ten64>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.slots.iter_mut())
    }

    /// Adds `grad` onto the accumulated gradient of slot `idx`.
    ///
    /// # Panics
    /// Panics if the gradient shape does not match the parameter shape.
    pub fn accumulate(&mut self, idx: usize, grad: &Ten64) {
        let slot = &mut self.slots[idx];
        assert_eq!(
            slot.grad.shape, grad.shape,
            "gradient shape mismatch for {:?}",
            self.names[idx]
        );
        for (g, &v) in slot.grad.data.iter_mut().zip(&grad.data) {
            *g += v;
        }
    }

    /// Resets every accumulated gradient to zero.
    pub fn zero_grads(&mut self) {
        for slot in &mut self.slots {
            slot.zero_grad();
        }
    }

    /// Replaces parameter values from `(name, tensor)` pairs, matching by
    /// name. Gradients are zeroed.
    ///
    /// # Errors
    /// Fails if an entry names an unknown parameter, a shape disagrees,
    /// or the entries do not cover the whole store.
    pub fn restore(&mut self, entries: Vec<(String, Ten64)>) -> Result<(), Box<dyn Error>> {
        if entries.len() != self.slots.len() {
            return Err(format!(
                "checkpoint holds {} parameters, model expects {}",
                entries.len(),
                self.slots.len()
            )
            .into());
        }
        for (name, tensor) in entries {
            let idx = self
                .index
                .get(&name)
                .copied()
                .ok_or_else(|| format!("checkpoint parameter {:?} not found in model", name))?;
            let slot = &mut self.slots[idx];
            if slot.value.shape != tensor.shape {
                return Err(format!(
                    "checkpoint parameter {:?} has shape {:?}, model expects {:?}",
                    name, tensor.shape, slot.value.shape
                )
                .into());
            }
            slot.value.update(tensor);
            slot.zero_grad();
        }
        Ok(())
    }
}

/// Draws a Glorot-uniform tensor: entries sampled from
/// `[-limit, limit]` with `limit = sqrt(6 / (fan_in + fan_out))`.
///
/// Fans follow the convolutional convention: the trailing two dimensions
/// are the in/out widths, anything before them counts as receptive field.
///
/// # Panics
/// Panics if the shape has fewer than two dimensions.
pub fn glorot_uniform(shape: impl Into<Vec<usize>>) -> Ten64 {
    let shape = shape.into();
    assert!(
        shape.len() >= 2,
        "glorot initialization needs at least two dimensions, got {:?}",
        shape
    );

    let receptive: usize = shape[..shape.len() - 2].iter().product();
    let fan_in = shape[shape.len() - 2] * receptive;
    let fan_out = shape[shape.len() - 1] * receptive;
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();

    let len = shape.iter().product();
    let mut rng = rand::rng();
    let data = (0..len).map(|_| rng.random_range(-limit..limit)).collect();
    Tensor::new(shape, data)
}
