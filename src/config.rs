//! Network configuration.
//!
//! A `NetConfig` describes the backbone declaratively: input extent,
//! convolutional stage depths and widths, dense hidden widths, hash code
//! width, and the regularization coefficients. The classification head is
//! always one logit wide and is not part of the config; `dense_units`
//! lists hidden widths only.

/// Declarative description of the network to build.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Input extent as `(height, width, channels)`.
    pub input: (usize, usize, usize),
    /// Number of conv+ReLU repetitions per stage.
    pub conv_layers: Vec<usize>,
    /// Output channel width per stage; same length as `conv_layers`.
    pub conv_channels: Vec<usize>,
    /// Widths of the dense hidden layers (hidden layers only; the
    /// classification head is fixed at width 1).
    pub dense_units: Vec<usize>,
    /// Width of the sigmoid hash layer.
    pub hash_codes: usize,
    /// L1 penalty coefficient.
    pub lambda_l1: f64,
    /// L2 penalty coefficient.
    pub lambda_l2: f64,
}

impl NetConfig {
    /// The classic 16-layer configuration: five stages of depths
    /// [2, 2, 3, 3, 3] over 224×224 RGB input, two 4096-wide hidden
    /// layers, 48 hash codes.
    pub fn vgg16() -> Self {
        Self {
            input: (224, 224, 3),
            conv_layers: vec![2, 2, 3, 3, 3],
            conv_channels: vec![64, 128, 256, 512, 512],
            dense_units: vec![4096, 4096],
            hash_codes: 48,
            lambda_l1: 0.0,
            lambda_l2: 5e-4,
        }
    }

    /// Checks the structural invariants.
    ///
    /// # Panics
    /// Panics if the stage-depth and channel-width lists differ in
    /// length, or any input extent is zero.
    pub fn validate(&self) {
        assert_eq!(
            self.conv_layers.len(),
            self.conv_channels.len(),
            "config error: {} conv stages but {} channel widths",
            self.conv_layers.len(),
            self.conv_channels.len()
        );
        let (h, w, c) = self.input;
        assert!(
            h > 0 && w > 0 && c > 0,
            "config error: input extent {:?} has a zero dimension",
            self.input
        );
    }

    /// Width of the flattened feature vector after the conv stages: each
    /// stage halves the spatial extents (rounding up, same padding).
    pub fn flat_dim(&self) -> usize {
        let (mut h, mut w, c) = self.input;
        for _ in &self.conv_layers {
            h = h.div_ceil(2);
            w = w.div_ceil(2);
        }
        let channels = self.conv_channels.last().copied().unwrap_or(c);
        h * w * channels
    }
}
