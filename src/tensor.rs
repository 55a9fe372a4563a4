//! Batch tensors.
//!
//! A [`Tensor`] is a batch of equal-length feature vectors stored contiguously in
//! row-major layout: `data.len() == batch_size * features`.
//!
//! Layers process rows independently, so the rayon row iterators
//! ([`Tensor::par_rows`] / [`Tensor::par_rows_mut`]) are the unit of parallelism.

use rayon::prelude::*;
use rayon::slice::{Chunks, ChunksMut};

use crate::{Error, Float, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<Float>,
    batch_size: usize,
    features: usize,
}

impl Tensor {
    /// Zero-filled tensor with shape `(batch_size, features)`.
    ///
    /// Panics if `features == 0`.
    pub fn zeros(batch_size: usize, features: usize) -> Self {
        assert!(features > 0, "tensor features must be > 0");
        Self {
            data: vec![0.0; batch_size * features],
            batch_size,
            features,
        }
    }

    /// Build a tensor from a flat row-major buffer with `features` values per row.
    pub fn from_flat(data: Vec<Float>, features: usize) -> Result<Self> {
        if features == 0 {
            return Err(Error::InvalidShape("features must be > 0".to_owned()));
        }
        if !data.len().is_multiple_of(features) {
            return Err(Error::InvalidShape(format!(
                "buffer length {} is not divisible by features {}",
                data.len(),
                features
            )));
        }

        let batch_size = data.len() / features;
        Ok(Self {
            data,
            batch_size,
            features,
        })
    }

    /// Build a tensor from per-sample rows (copies into contiguous storage).
    pub fn from_rows<R: AsRef<[Float]>>(rows: &[R]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(Error::InvalidShape("rows must not be empty".to_owned()));
        };

        let features = first.as_ref().len();
        if features == 0 {
            return Err(Error::InvalidShape("features must be > 0".to_owned()));
        }

        let mut data = Vec::with_capacity(rows.len() * features);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != features {
                return Err(Error::InvalidShape(format!(
                    "row {i} has len {}, expected {features}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            data,
            batch_size: rows.len(),
            features,
        })
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn features(&self) -> usize {
        self.features
    }

    /// `(batch_size, features)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.batch_size, self.features)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Float] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Float] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Float> {
        self.data
    }

    /// Returns row `idx`.
    ///
    /// Panics if `idx >= batch_size`.
    #[inline]
    pub fn row(&self, idx: usize) -> &[Float] {
        let start = idx * self.features;
        &self.data[start..start + self.features]
    }

    #[inline]
    pub fn row_mut(&mut self, idx: usize) -> &mut [Float] {
        let start = idx * self.features;
        &mut self.data[start..start + self.features]
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, Float> {
        self.data.chunks(self.features)
    }

    pub fn par_rows(&self) -> Chunks<'_, Float> {
        self.data.par_chunks(self.features)
    }

    pub fn par_rows_mut(&mut self) -> ChunksMut<'_, Float> {
        self.data.par_chunks_mut(self.features)
    }

    /// Copies rows into nested vectors.
    pub fn to_rows(&self) -> Vec<Vec<Float>> {
        self.rows().map(<[Float]>::to_vec).collect()
    }
}

/// Panics unless `actual` has exactly `expected` rows and features.
#[track_caller]
pub(crate) fn assert_shape(what: &str, actual: &Tensor, expected: (usize, usize)) {
    assert_eq!(
        actual.shape(),
        expected,
        "{what} has shape {:?}, expected {:?}",
        actual.shape(),
        expected
    );
}
