//! Model assembly and the per-batch step surface.
//!
//! # Image-Hashing Model
//!
//! `HashVgg` ties the pieces together: the immutable architecture graph,
//! the parameter store the optimizer mutates, and the optimizer itself
//! with its learning-rate and step state. Everything is fixed at
//! [`HashVgg::build`] time; afterwards parameters change only through
//! [`HashVgg::train_step`] and [`HashVgg::restore`], and all other
//! state is exposed through read-only accessors.
//!
//! A training step is one pure pass over a batch: forward in train mode,
//! loss and penalty, backward accumulation, optimizer update, rate
//! decay. Evaluation passes reuse the same forward graph
//! deterministically and never touch parameters.

use crate::config::NetConfig;
use crate::graph::{Architecture, ForwardPass, Mode};
use crate::loss;
use crate::modelio;
use crate::ops::activation;
use crate::optim::{Optimizer, OptimizerKind};
use crate::params::ParamStore;
use crate::tensors::Ten64;
use std::error::Error;

/// Construction parameters beyond the network description itself.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Whether to append the sigmoid hash layer.
    pub use_hash: bool,
    /// Dropout rate for the dense hidden layers; zero disables dropout.
    pub dropout: f64,
    /// Update rule name: `"sgd"` or `"adam"`.
    pub optimizer: String,
    /// Initial learning rate.
    pub start_lr: f64,
    /// Per-step decay coefficient; the rate is multiplied by
    /// `1 - decay` after every step.
    pub decay: f64,
    /// Directory checkpoints are written into.
    pub save_path: String,
    /// Model name, used in checkpoint filenames.
    pub name: String,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            use_hash: true,
            dropout: 0.0,
            optimizer: "sgd".to_string(),
            start_lr: 0.05,
            decay: 1e-3,
            save_path: "save".to_string(),
            name: "hashVGG16".to_string(),
        }
    }
}

/// Scalar results of one training or evaluation batch.
#[derive(Debug, Clone, Copy)]
pub struct StepMetrics {
    /// Cross-entropy plus regularization penalty.
    pub loss: f64,
    /// Binary accuracy at the 0.5 threshold.
    pub accuracy: f64,
}

/// The assembled network: graph, parameters, optimizer state.
pub struct HashVgg {
    config: NetConfig,
    arch: Architecture,
    store: ParamStore,
    optimizer: Optimizer,
    use_hash: bool,
    name: String,
    save_path: String,
}

impl HashVgg {
    /// Builds the architecture, initializes every parameter, and wires
    /// up the optimizer.
    ///
    /// # Errors
    /// Fails on an unrecognized optimizer name.
    ///
    /// # Panics
    /// Panics if the config violates its structural invariants.
    ///
    /// # Example
    /// ```rust
    /// use hashvgg::config::NetConfig;
    /// use hashvgg::model::{HashVgg, ModelOptions};
    ///
    /// let config = NetConfig {
    ///     input: (4, 4, 1),
    ///     conv_layers: vec![1],
    ///     conv_channels: vec![2],
    ///     dense_units: vec![3],
    ///     hash_codes: 2,
    ///     lambda_l1: 0.0,
    ///     lambda_l2: 5e-4,
    /// };
    /// let model = HashVgg::build(config, ModelOptions::default()).unwrap();
    /// assert_eq!(model.global_step(), 0);
    /// ```
    pub fn build(config: NetConfig, options: ModelOptions) -> Result<Self, Box<dyn Error>> {
        let kind: OptimizerKind = options.optimizer.parse()?;
        let mut store = ParamStore::new();
        let arch = Architecture::build(&config, options.use_hash, options.dropout, &mut store);
        let optimizer = Optimizer::new(kind, options.start_lr, options.decay);
        Ok(Self {
            config,
            arch,
            store,
            optimizer,
            use_hash: options.use_hash,
            name: options.name,
            save_path: options.save_path,
        })
    }

    /// Runs one training step over a batch: forward, loss, backward,
    /// optimizer update, learning-rate decay.
    pub fn train_step(&mut self, input: &Ten64, target: &Ten64) -> StepMetrics {
        let ForwardPass { logits, tape, .. } = self.arch.forward(&self.store, input, Mode::Train);

        let (ce, ce_back) = loss::sigmoid_cross_entropy(&logits, target);
        let penalty = loss::regularization_penalty(
            &self.store,
            self.config.lambda_l1,
            self.config.lambda_l2,
        );
        let (probs, _) = activation::sigmoid(&logits);
        let accuracy = loss::binary_accuracy(&probs, target);

        let grad_logits = ce_back(1.0);
        self.arch.backward(&mut self.store, tape, grad_logits);
        loss::accumulate_regularization_grads(
            &mut self.store,
            self.config.lambda_l1,
            self.config.lambda_l2,
        );
        self.optimizer.step(&mut self.store);
        self.optimizer.decay();

        StepMetrics {
            loss: ce + penalty,
            accuracy,
        }
    }

    /// Computes loss and accuracy over a batch without touching any
    /// parameter. The reported loss includes the regularization penalty,
    /// matching the training objective.
    pub fn eval_batch(&self, input: &Ten64, target: &Ten64) -> StepMetrics {
        let pass = self.arch.forward(&self.store, input, Mode::Eval);
        self.batch_metrics(&pass.logits, target)
    }

    /// Like [`HashVgg::eval_batch`], additionally returning the dense
    /// hidden activations (the hash code last, when enabled).
    pub fn eval_batch_with_hidden(
        &self,
        input: &Ten64,
        target: &Ten64,
    ) -> (StepMetrics, Vec<Ten64>) {
        let pass = self.arch.forward(&self.store, input, Mode::Eval);
        let metrics = self.batch_metrics(&pass.logits, target);
        (metrics, pass.hidden)
    }

    /// Predicted probabilities for a batch, shape `(batch, 1)`.
    pub fn predict(&self, input: &Ten64) -> Ten64 {
        let pass = self.arch.forward(&self.store, input, Mode::Eval);
        let (probs, _) = activation::sigmoid(&pass.logits);
        probs
    }

    fn batch_metrics(&self, logits: &Ten64, target: &Ten64) -> StepMetrics {
        let (ce, _) = loss::sigmoid_cross_entropy(logits, target);
        let penalty = loss::regularization_penalty(
            &self.store,
            self.config.lambda_l1,
            self.config.lambda_l2,
        );
        let (probs, _) = activation::sigmoid(logits);
        let accuracy = loss::binary_accuracy(&probs, target);
        StepMetrics {
            loss: ce + penalty,
            accuracy,
        }
    }

    /// Resets the learning rate to its configured start value.
    pub fn reset_lr(&mut self) {
        self.optimizer.reset_lr();
    }

    /// Current learning rate.
    pub fn l_rate(&self) -> f64 {
        self.optimizer.l_rate()
    }

    /// Number of completed training steps.
    pub fn global_step(&self) -> u64 {
        self.optimizer.global_step()
    }

    /// The network description this model was built from.
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Whether the hash layer is part of the graph.
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Model name used in checkpoint filenames.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory checkpoints are written into.
    pub fn save_path(&self) -> &str {
        &self.save_path
    }

    /// The trainable parameters.
    pub fn params(&self) -> &ParamStore {
        &self.store
    }

    /// Writes a checkpoint tagged with the current global step and
    /// returns its path.
    ///
    /// # Errors
    /// Fails on directory or file I/O errors.
    pub fn save(&self) -> Result<String, Box<dyn Error>> {
        std::fs::create_dir_all(&self.save_path)?;
        let path = format!(
            "{}/{}-{}.bpat",
            self.save_path,
            self.name,
            self.optimizer.global_step()
        );
        let entries: Vec<(&str, &Ten64)> =
            self.store.iter().map(|(n, s)| (n, &s.value)).collect();
        modelio::save_checkpoint(&path, self.optimizer.global_step(), &entries)?;
        Ok(path)
    }

    /// Restores parameter values and the global step from a checkpoint.
    ///
    /// # Errors
    /// Fails if the file is unreadable or does not match this model's
    /// parameters.
    pub fn restore(&mut self, path: &str) -> Result<(), Box<dyn Error>> {
        let ckpt = modelio::load_checkpoint(path)?;
        self.store.restore(ckpt.tensors)?;
        self.optimizer.set_global_step(ckpt.global_step);
        Ok(())
    }
}
