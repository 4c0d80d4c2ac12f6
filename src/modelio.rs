//! Robust saving/loading of model checkpoints.
//!
//! # `.bpat` Checkpoint Format
//!
//! This module provides minimal utilities for snapshotting every named
//! parameter of a model, plus its global step, in a custom binary format.
//!
//! # Format Overview
//!
//! A checkpoint file stores a header followed by one record per tensor:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────┐
//! │ Header       │ Tensor N, Tensor N+1 …           │
//! ├──────────────┼──────────────────────────────────┤
//! │ "hvgg"[4]    │ u16: name length                 │
//! │ u8: version  │ [u8; len] name (UTF-8)           │
//! │ u64: step    │ u64: ndim                        │
//! │ u8: count    │ [u64; ndim] shape                │
//! │              │ [f64; prod(shape)] data          │
//! └──────────────┴──────────────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian.
//!
//! # Design Principles
//! - Fully self-contained
//! - No compression or encryption
//! - Deterministic: tensors are written in declaration order
//! - Loaded tensors pass shape/data validation before use
//!
//! # Limitations
//! - Assumes `f64` element type
//! - Maximum 255 tensors per file (due to `u8` count limit)
//!
//! # Example
//!
//! ```rust
//! use hashvgg::tensors::Tensor;
//! use hashvgg::modelio::{save_checkpoint, load_checkpoint};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let filter = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
//!     let path = std::env::temp_dir().join("doc_ckpt.bpat");
//!     let path = path.to_str().unwrap();
//!
//!     save_checkpoint(path, 7, &[("demo/filter", &filter)])?;
//!
//!     let ckpt = load_checkpoint(path)?;
//!     assert_eq!(ckpt.global_step, 7);
//!     assert_eq!(ckpt.tensors[0].0, "demo/filter");
//!     Ok(())
//! }
//! ```

use crate::tensors::{Ten64, Tensor};
use briny::prelude::*;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

const CKPT_MAGIC: &[u8; 4] = b"hvgg";
const CKPT_VERSION: u8 = 1;

/// A loaded checkpoint: the global step plus every named tensor in file
/// order.
pub struct Checkpoint {
    pub global_step: u64,
    pub tensors: Vec<(String, Ten64)>,
}

/// Internal representation of a packed tensor.
struct PackedTensor {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl Validate for PackedTensor {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.shape.iter().product::<u64>() as usize;
        if self.data.len() != expected {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Saves named tensors and the global step to a checkpoint file.
///
/// # Arguments
/// - `path`: Output file path.
/// - `global_step`: Step counter stored in the header.
/// - `tensors`: `(name, tensor)` pairs, written in order.
///
/// # Errors
/// Returns an error if file I/O or a write fails.
///
/// # Panics
/// Panics if more than 255 tensors are given or a name exceeds the
/// `u16` length field.
pub fn save_checkpoint(
    path: &str,
    global_step: u64,
    tensors: &[(&str, &Ten64)],
) -> Result<(), Box<dyn Error>> {
    assert!(
        tensors.len() <= u8::MAX as usize,
        "checkpoint limited to 255 tensors, got {}",
        tensors.len()
    );

    let mut file = BufWriter::new(File::create(path)?);

    file.write_all(CKPT_MAGIC)?;
    file.write_all(&[CKPT_VERSION])?;
    file.write_all(&global_step.to_le_bytes())?;
    file.write_all(&[tensors.len() as u8])?;

    for (name, tensor) in tensors {
        assert_eq!(
            tensor.data.len(),
            tensor.shape.iter().product(),
            "tensor shape/data mismatch for {:?}",
            name
        );
        assert!(
            name.len() <= u16::MAX as usize,
            "parameter name too long: {:?}",
            name
        );

        file.write_all(&(name.len() as u16).to_le_bytes())?;
        file.write_all(name.as_bytes())?;

        let dims = tensor.shape.len() as u64;
        file.write_all(&dims.to_le_bytes())?;

        for &dim in &tensor.shape {
            file.write_all(&(dim as u64).to_le_bytes())?;
        }

        for &val in &tensor.data {
            file.write_all(&val.to_le_bytes())?;
        }
    }

    Ok(())
}

/// Loads a checkpoint file.
///
/// - Validates the magic header and format version.
/// - Each tensor's shape/data consistency is validated before it is
///   accepted.
///
/// # Errors
/// Fails if the file is missing, does not start with the expected magic,
/// carries an unsupported version, or holds a corrupted tensor record.
pub fn load_checkpoint(path: &str) -> Result<Checkpoint, Box<dyn Error>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut buf8 = [0u8; 8];

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != CKPT_MAGIC {
        return Err("invalid magic header".into());
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != CKPT_VERSION {
        return Err(format!("unsupported checkpoint version {}", version[0]).into());
    }

    file.read_exact(&mut buf8)?;
    let global_step = u64::from_le_bytes(buf8);

    let mut count = [0u8; 1];
    file.read_exact(&mut count)?;
    let count = count[0] as usize;

    let mut tensors = Vec::with_capacity(count);

    for _ in 0..count {
        let mut buf2 = [0u8; 2];
        file.read_exact(&mut buf2)?;
        let name_len = u16::from_le_bytes(buf2) as usize;

        let mut name_buf = vec![0u8; name_len];
        file.read_exact(&mut name_buf)?;
        let name =
            String::from_utf8(name_buf).map_err(|_| "invalid parameter name encoding")?;

        file.read_exact(&mut buf8)?;
        let ndim = u64::from_le_bytes(buf8) as usize;

        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            file.read_exact(&mut buf8)?;
            shape.push(u64::from_le_bytes(buf8));
        }

        let size: usize = shape.iter().product::<u64>() as usize;
        let mut data = Vec::with_capacity(size);
        for _ in 0..size {
            file.read_exact(&mut buf8)?;
            data.push(f64::from_le_bytes(buf8));
        }

        let raw_tensor = PackedTensor { shape, data };
        let trusted = TrustedData::new(raw_tensor)?;
        let inner = trusted.into_inner();
        let shape_usize: Vec<usize> = inner.shape.iter().map(|&x| x as usize).collect();
        tensors.push((name, Tensor::new(shape_usize, inner.data)));
    }

    Ok(Checkpoint {
        global_step,
        tensors,
    })
}
