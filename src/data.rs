//! In-memory training/evaluation datasets.
//!
//! A `Dataset` pairs an `(N, h, w, c)` input tensor with an `(N, 1)`
//! tensor of binary float labels. Batches are produced two ways: by an
//! index list (the training path, which supports sorted-fetch access)
//! and by a contiguous range (the evaluation path).

use crate::tensors::{Ten64, Tensor};
use std::ops::Range;

/// Input/label pair covering a whole split.
#[derive(Debug, Clone)]
pub struct Dataset {
    input: Ten64,
    output: Ten64,
}

impl Dataset {
    /// Wraps input and label tensors.
    ///
    /// # Panics
    /// Panics if the tensors disagree on sample count, the input has no
    /// sample dimensions, or the labels are not `(N, 1)`.
    pub fn new(input: Ten64, output: Ten64) -> Self {
        assert!(
            input.shape.len() >= 2,
            "dataset input must have sample dimensions, got shape {:?}",
            input.shape
        );
        assert_eq!(
            output.shape,
            vec![input.shape[0], 1],
            "dataset labels must be (N, 1) matching {} samples, got {:?}",
            input.shape[0],
            output.shape
        );
        Self { input, output }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.input.shape[0]
    }

    /// Whether the split holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of one input sample (the non-batch dimensions).
    pub fn sample_shape(&self) -> &[usize] {
        &self.input.shape[1..]
    }

    /// Gathers the samples at `indices` into a fresh `(batch, …)` input
    /// tensor and `(batch, 1)` label tensor, in index order.
    ///
    /// # Panics
    /// Panics if any index is out of range.
    pub fn gather(&self, indices: &[usize]) -> (Ten64, Ten64) {
        let n = self.len();
        let row: usize = self.sample_shape().iter().product();

        let mut inp = Vec::with_capacity(indices.len() * row);
        let mut out = Vec::with_capacity(indices.len());
        for &i in indices {
            assert!(i < n, "sample index {} out of range for {} samples", i, n);
            inp.extend_from_slice(&self.input.data[i * row..(i + 1) * row]);
            out.push(self.output.data[i]);
        }

        let mut shape = vec![indices.len()];
        shape.extend_from_slice(self.sample_shape());
        (
            Tensor::new(shape, inp),
            Tensor::new(vec![indices.len(), 1], out),
        )
    }

    /// Copies the contiguous sample range into batch tensors.
    ///
    /// # Panics
    /// Panics if the range exceeds the sample count.
    pub fn slice(&self, range: Range<usize>) -> (Ten64, Ten64) {
        let n = self.len();
        assert!(
            range.start <= range.end && range.end <= n,
            "sample range {:?} out of bounds for {} samples",
            range,
            n
        );
        let row: usize = self.sample_shape().iter().product();
        let count = range.end - range.start;

        let inp = self.input.data[range.start * row..range.end * row].to_vec();
        let out = self.output.data[range.start..range.end].to_vec();

        let mut shape = vec![count];
        shape.extend_from_slice(self.sample_shape());
        (Tensor::new(shape, inp), Tensor::new(vec![count, 1], out))
    }
}
