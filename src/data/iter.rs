//! Fixed-batch-size iteration over an (n, ...) array and its labels.
//!
//! Every batch has exactly `batch_size` rows so it can feed a function
//! compiled for that input shape. When `n` is not a multiple of the batch
//! size, [`LastBatch`] decides what happens to the remainder.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::array::NdArray;
use crate::error::{HybridError, Result};

/// Handling of the final, partial batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastBatch {
    /// Fill the batch with rows from the start of the epoch order; `pad`
    /// counts the borrowed rows.
    #[default]
    Pad,
    /// Drop the remainder.
    Discard,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub data: NdArray,
    pub labels: Vec<usize>,
    /// Trailing rows that repeat earlier samples
    pub pad: usize,
}

impl Batch {
    /// Number of rows that are not padding
    pub fn valid(&self) -> usize {
        self.labels.len() - self.pad
    }
}

#[derive(Debug, Clone)]
pub struct BatchIter {
    data: NdArray,
    labels: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    last_batch: LastBatch,
    order: Vec<usize>,
    cursor: usize,
}

impl BatchIter {
    /// # Errors
    /// `InvalidParameter` for a zero batch size, an empty dataset, or a label
    /// count that differs from the number of rows.
    pub fn new(
        data: NdArray,
        labels: Vec<usize>,
        batch_size: usize,
        shuffle: bool,
        last_batch: LastBatch,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(HybridError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        let n = data.shape().first().copied().unwrap_or(0);
        if n == 0 {
            return Err(HybridError::InvalidParameter("empty dataset".to_string()));
        }
        if labels.len() != n {
            return Err(HybridError::InvalidParameter(format!(
                "{} labels for {n} samples",
                labels.len()
            )));
        }
        Ok(BatchIter {
            data,
            labels,
            batch_size,
            shuffle,
            last_batch,
            order: (0..n).collect(),
            cursor: 0,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_samples(&self) -> usize {
        self.labels.len()
    }

    /// Batches per epoch
    pub fn num_batches(&self) -> usize {
        let n = self.num_samples();
        match self.last_batch {
            LastBatch::Pad => n.div_ceil(self.batch_size),
            LastBatch::Discard => n / self.batch_size,
        }
    }

    /// Start a new epoch, reshuffling when enabled
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(rng);
        }
    }

    fn take(&mut self) -> Option<Result<Batch>> {
        let n = self.order.len();
        if self.cursor >= n {
            return None;
        }
        let end = self.cursor + self.batch_size;
        if end > n && self.last_batch == LastBatch::Discard {
            self.cursor = n;
            return None;
        }
        let indices: Vec<usize> = (self.cursor..end).map(|i| self.order[i % n]).collect();
        let pad = end.saturating_sub(n);
        trace!(cursor = self.cursor, pad, "batch");
        self.cursor = end;

        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Some(self.data.gather_rows(&indices).map(|data| Batch { data, labels, pad }))
    }
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.take()
    }
}
