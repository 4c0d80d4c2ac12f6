//! Epoch/batch driving and held-out evaluation.
//!
//! # Training/Evaluation Loop
//!
//! The trainer owns a mutable borrow of the model plus the summary
//! writer the caller opened, and drives the state machine over epochs
//! and batches:
//!
//! - Every epoch draws a fresh random permutation of the training
//!   indices and slices it into consecutive batches; the final batch of
//!   an epoch may be smaller than the configured size.
//! - In sorted-fetch mode each batch's indices are sorted ascending
//!   before the gather, for storage that prefers ordered access. The
//!   permutation still decides batch membership.
//! - Every step trains once, decays the learning rate, and reprints the
//!   in-place progress line. On every `summary_step`-th global step the
//!   training scalars are logged and a full held-out evaluation runs,
//!   logging its own scalars at the same step.
//! - Checkpoints are written every `save_step`-th step, at the end of
//!   each epoch, and once more after the final epoch.
//!
//! Evaluation iterates the held-out set in fixed-size contiguous
//! batches and reports sample-weighted means, so a smaller trailing
//! batch is weighted exactly. The alternative evaluation mode collects
//! the dense hidden activations of every batch instead of metrics; per
//! call the two modes are mutually exclusive.

use crate::data::Dataset;
use crate::model::{HashVgg, StepMetrics};
use crate::summary::SummaryWriter;
use crate::tensors::{Ten64, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;
use std::error::Error;
use std::io::{self, Write};

/// Knobs for one `fit` run.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Samples per training (and evaluation) batch.
    pub batch_size: usize,
    /// Number of passes over the training set.
    pub epochs: usize,
    /// Log training scalars and evaluate every this many global steps.
    pub summary_step: u64,
    /// Write a checkpoint every this many global steps.
    pub save_step: u64,
    /// Sort each batch's indices ascending before fetching.
    pub sorted_fetch: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            epochs: 20,
            summary_step: 50,
            save_step: 150,
            sorted_fetch: true,
        }
    }
}

/// Streaming sample-weighted mean: `Σ value·weight / Σ weight`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMean {
    sum: f64,
    weight: f64,
}

impl WeightedMean {
    /// Adds one batch's metric with its sample count as weight.
    pub fn add(&mut self, value: f64, weight: f64) {
        self.sum += value * weight;
        self.weight += weight;
    }

    /// The aggregated mean; zero when nothing was added.
    pub fn mean(&self) -> f64 {
        if self.weight == 0.0 {
            0.0
        } else {
            self.sum / self.weight
        }
    }
}

/// Draws a fresh random permutation of `0..n`.
pub fn shuffled_indices(n: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}

/// Slices a permutation into consecutive batches of `batch_size`; the
/// final batch keeps whatever remains. With `sorted_fetch` each batch is
/// sorted ascending, leaving membership to the permutation.
///
/// # Panics
/// Panics if `batch_size` is zero.
pub fn epoch_batches(perm: &[usize], batch_size: usize, sorted_fetch: bool) -> Vec<Vec<usize>> {
    assert!(batch_size > 0, "batch size must be positive");
    perm.chunks(batch_size)
        .map(|chunk| {
            let mut batch = chunk.to_vec();
            if sorted_fetch {
                batch.sort_unstable();
            }
            batch
        })
        .collect()
}

/// Drives training and evaluation for one model.
pub struct Trainer<'a> {
    model: &'a mut HashVgg,
    summary: &'a mut SummaryWriter,
    loss_bottle: f64,
    metric_bottle: f64,
}

impl<'a> Trainer<'a> {
    /// Couples a model with the summary stream the caller opened.
    pub fn new(model: &'a mut HashVgg, summary: &'a mut SummaryWriter) -> Self {
        Self {
            model,
            summary,
            loss_bottle: 0.0,
            metric_bottle: 0.0,
        }
    }

    /// Last evaluation loss snapshotted for logging.
    pub fn loss_bottle(&self) -> f64 {
        self.loss_bottle
    }

    /// Last evaluation accuracy snapshotted for logging.
    pub fn metric_bottle(&self) -> f64 {
        self.metric_bottle
    }

    /// Trains for the configured number of epochs, interleaving summary
    /// logging, held-out evaluation, and checkpointing.
    ///
    /// # Errors
    /// Fails on summary or checkpoint I/O errors; training failures
    /// themselves propagate as panics from the numeric layer.
    pub fn fit(
        &mut self,
        train_data: &Dataset,
        dev_data: &Dataset,
        options: &FitOptions,
    ) -> Result<(), Box<dyn Error>> {
        let samples = train_data.len();
        let mut rng = rand::rng();

        for epoch in 0..options.epochs {
            println!("Epoch {} / {}", epoch + 1, options.epochs);
            let perm = shuffled_indices(samples, &mut rng);
            let mut used = 0;
            for batch in epoch_batches(&perm, options.batch_size, options.sorted_fetch) {
                used += batch.len();
                let (inp, out) = train_data.gather(&batch);
                let metrics = self.model.train_step(&inp, &out);
                let step = self.model.global_step();

                print!(
                    "\r[{} / {}]:\tloss: {:.6}; accuracy: {:.6}",
                    used, samples, metrics.loss, metrics.accuracy
                );
                io::stdout().flush()?;

                if step % options.summary_step == 0 {
                    self.summary.scalar("train/loss", metrics.loss, step)?;
                    self.summary.scalar("train/acc", metrics.accuracy, step)?;
                    self.evaluate(dev_data, options.batch_size, step, true)?;
                    self.summary.flush()?;
                }
                if step % options.save_step == 0 {
                    println!("Save model ...");
                    self.model.save()?;
                }
            }
            println!();
            self.model.save()?;
        }

        println!("Fit finish. Save model ...");
        self.model.save()?;
        self.summary.flush()?;
        Ok(())
    }

    /// Evaluates the held-out set in contiguous fixed-size batches and
    /// returns the sample-weighted metrics. With `add_summary` the
    /// result is snapshotted into the bottle scalars and logged at
    /// `global_step`.
    ///
    /// # Errors
    /// Fails on summary I/O errors.
    pub fn evaluate(
        &mut self,
        dev_data: &Dataset,
        batch_size: usize,
        global_step: u64,
        add_summary: bool,
    ) -> Result<StepMetrics, Box<dyn Error>> {
        let samples = dev_data.len();
        let mut loss_agg = WeightedMean::default();
        let mut acc_agg = WeightedMean::default();

        let mut start = 0;
        while start < samples {
            let end = usize::min(start + batch_size, samples);
            let (inp, out) = dev_data.slice(start..end);
            let metrics = self.model.eval_batch(&inp, &out);
            loss_agg.add(metrics.loss, (end - start) as f64);
            acc_agg.add(metrics.accuracy, (end - start) as f64);
            start = end;
        }

        let loss = loss_agg.mean();
        let accuracy = acc_agg.mean();
        println!("\n[dev]:\tloss: {:.6}; accuracy: {:.6}", loss, accuracy);

        if add_summary {
            self.loss_bottle = loss;
            self.metric_bottle = accuracy;
            self.summary.scalar("dev/loss", self.loss_bottle, global_step)?;
            self.summary
                .scalar("dev/acc", self.metric_bottle, global_step)?;
        }

        Ok(StepMetrics { loss, accuracy })
    }

    /// Collects the dense hidden activations over the whole held-out
    /// set, one tensor per hidden layer (the hash code last when
    /// enabled), each of shape `(samples, width)`, batches concatenated
    /// in iteration order. Nothing is logged.
    pub fn hidden_features(&self, dev_data: &Dataset, batch_size: usize) -> Vec<Ten64> {
        let samples = dev_data.len();
        let mut widths: Vec<usize> = Vec::new();
        let mut buffers: Vec<Vec<f64>> = Vec::new();

        let mut start = 0;
        while start < samples {
            let end = usize::min(start + batch_size, samples);
            let (inp, out) = dev_data.slice(start..end);
            let (_, hidden) = self.model.eval_batch_with_hidden(&inp, &out);

            if buffers.is_empty() {
                widths = hidden.iter().map(|t| t.shape[1]).collect();
                buffers = hidden.iter().map(|_| Vec::new()).collect();
            }
            for (buf, t) in buffers.iter_mut().zip(hidden) {
                buf.extend(t.data);
            }
            start = end;
        }

        widths
            .into_iter()
            .zip(buffers)
            .map(|(width, buf)| Tensor::new(vec![samples, width], buf))
            .collect()
    }
}
