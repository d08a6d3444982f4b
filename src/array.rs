use std::collections::BTreeSet;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::dtype::DType;
use crate::error::{HybridError, Result};
use crate::variant::ArrayType;

// ===== ARRAY STRUCTURE =====

/// Dense row-major array
///
/// Fields:
/// - `data`: flat values, already cast to `dtype`
/// - `shape`: dimensions, e.g. [batch, features]
/// - `dtype`: native element type the values were constructed as
/// - `kind`: representation of the backend that built it
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    data: Vec<f32>,
    shape: Vec<usize>,
    dtype: DType,
    kind: ArrayType,
}

fn check_len(shape: &[usize], len: usize) -> Result<()> {
    let elements: usize = shape.iter().product();
    if elements == len {
        Ok(())
    } else {
        Err(HybridError::ShapeDataMismatch {
            shape: shape.to_vec(),
            elements,
            len,
        })
    }
}

impl NdArray {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn kind(&self) -> ArrayType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Size of the storage if it were laid out in `dtype`
    pub fn nbytes(&self) -> usize {
        self.data.len() * self.dtype.size_of()
    }

    /// Same array derived from `self`, keeping dtype and kind.
    fn derive(&self, data: Vec<f32>, shape: Vec<usize>) -> NdArray {
        NdArray {
            data: data.into_iter().map(|v| self.dtype.cast(v)).collect(),
            shape,
            dtype: self.dtype,
            kind: self.kind,
        }
    }

    /// Rows `[start, start + count)` along the first axis
    pub(crate) fn rows(&self, start: usize, count: usize) -> Result<NdArray> {
        let n = self.shape.first().copied().unwrap_or(0);
        if start + count > n {
            return Err(HybridError::InvalidParameter(format!(
                "rows {start}..{} out of bounds for {n} rows",
                start + count
            )));
        }
        let stride = self.row_stride();
        let mut shape = self.shape.clone();
        shape[0] = count;
        Ok(NdArray {
            data: self.data[start * stride..(start + count) * stride].to_vec(),
            shape,
            dtype: self.dtype,
            kind: self.kind,
        })
    }

    /// Stack the given rows of the first axis, in order
    pub(crate) fn gather_rows(&self, indices: &[usize]) -> Result<NdArray> {
        let n = self.shape.first().copied().unwrap_or(0);
        let stride = self.row_stride();
        let mut data = Vec::with_capacity(indices.len() * stride);
        for &i in indices {
            if i >= n {
                return Err(HybridError::InvalidParameter(format!(
                    "row {i} out of bounds for {n} rows"
                )));
            }
            data.extend_from_slice(&self.data[i * stride..(i + 1) * stride]);
        }
        let mut shape = self.shape.clone();
        shape[0] = indices.len();
        Ok(NdArray {
            data,
            shape,
            dtype: self.dtype,
            kind: self.kind,
        })
    }

    fn row_stride(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

// ===== MOVEMENT =====
impl NdArray {
    /// Reinterpret with a new shape of the same element count
    pub fn reshape(&self, new_shape: &[usize]) -> Result<NdArray> {
        check_len(new_shape, self.data.len())?;
        Ok(NdArray {
            data: self.data.clone(),
            shape: new_shape.to_vec(),
            dtype: self.dtype,
            kind: self.kind,
        })
    }

    /// Collapse every axis after the first: [n, d1, d2, ...] -> [n, d1*d2*...]
    pub fn flatten_rows(&self) -> Result<NdArray> {
        let n = self.shape.first().copied().ok_or_else(|| {
            HybridError::InvalidParameter("cannot flatten a 0-d array".to_string())
        })?;
        self.reshape(&[n, self.row_stride()])
    }
}

// ===== DENSE OPS =====
impl NdArray {
    /// Raw matrix multiplication against a transposed right-hand side:
    /// (m,k) @ (n,k)^T -> (m,n)
    fn matmul_transposed_raw(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            let row = &a[i * k..(i + 1) * k];
            for j in 0..n {
                let col = &b[j * k..(j + 1) * k];
                out[i * n + j] = row.iter().zip(col).map(|(x, w)| x * w).sum();
            }
        }
        out
    }

    /// Fully-connected layer: y = x W^T + b
    ///
    /// `x` is flattened to (batch, in), `weight` is (out, in), `bias` is (out).
    pub fn fully_connected(x: &NdArray, weight: &NdArray, bias: &NdArray) -> Result<NdArray> {
        let x = x.flatten_rows()?;
        let (batch, in_dim) = (x.shape[0], x.shape[1]);
        let &[out_dim, w_in] = weight.shape.as_slice() else {
            return Err(HybridError::ShapeMismatch {
                name: "weight".to_string(),
                expected: vec![0, in_dim],
                actual: weight.shape.clone(),
            });
        };
        if w_in != in_dim {
            return Err(HybridError::ShapeMismatch {
                name: "weight".to_string(),
                expected: vec![out_dim, in_dim],
                actual: weight.shape.clone(),
            });
        }
        if bias.shape != [out_dim] {
            return Err(HybridError::ShapeMismatch {
                name: "bias".to_string(),
                expected: vec![out_dim],
                actual: bias.shape.clone(),
            });
        }

        let mut out = Self::matmul_transposed_raw(&x.data, &weight.data, batch, in_dim, out_dim);
        for row in out.chunks_mut(out_dim.max(1)) {
            for (v, b) in row.iter_mut().zip(&bias.data) {
                *v += b;
            }
        }
        Ok(x.derive(out, vec![batch, out_dim]))
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> NdArray {
        self.derive(self.data.iter().map(|&v| f(v)).collect(), self.shape.clone())
    }

    pub fn relu(&self) -> NdArray {
        self.map(|v| v.max(0.0))
    }

    pub fn sigmoid(&self) -> NdArray {
        self.map(|v| 1.0 / (1.0 + (-v).exp()))
    }

    pub fn tanh(&self) -> NdArray {
        self.map(f32::tanh)
    }

    /// log(1 + e^x)
    pub fn softrelu(&self) -> NdArray {
        self.map(|v| if v > 20.0 { v } else { v.exp().ln_1p() })
    }

    fn matrix_dims(&self) -> Result<(usize, usize)> {
        match *self.shape.as_slice() {
            [n, c] => Ok((n, c)),
            _ => Err(HybridError::InvalidParameter(format!(
                "expected a 2-d array, got shape {:?}",
                self.shape
            ))),
        }
    }

    /// Row-wise softmax of a (n, c) array, max-shifted for stability
    pub fn softmax_rows(&self) -> Result<NdArray> {
        let (_, c) = self.matrix_dims()?;
        let mut out = Vec::with_capacity(self.data.len());
        for row in self.data.chunks(c.max(1)) {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exps: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
            let sum: f32 = exps.iter().sum();
            out.extend(exps.into_iter().map(|e| e / sum));
        }
        Ok(self.derive(out, self.shape.clone()))
    }

    /// Index of the largest value in each row of a (n, c) array
    pub fn argmax_rows(&self) -> Result<Vec<usize>> {
        let (_, c) = self.matrix_dims()?;
        Ok(self
            .data
            .chunks(c.max(1))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    })
                    .0
            })
            .collect())
    }
}

// ===== FACTORY =====

/// Array constructor for one backend
///
/// Obtained from [`crate::registry::Registry::factory`]; rejects element types
/// the backend does not accept.
#[derive(Debug, Clone)]
pub struct ArrayFactory {
    backend: String,
    kind: ArrayType,
    allowed: BTreeSet<DType>,
}

impl ArrayFactory {
    pub(crate) fn new(backend: String, kind: ArrayType, allowed: BTreeSet<DType>) -> Self {
        ArrayFactory {
            backend,
            kind,
            allowed,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn kind(&self) -> ArrayType {
        self.kind
    }

    pub fn allowed_types(&self) -> &BTreeSet<DType> {
        &self.allowed
    }

    fn check_dtype(&self, dtype: DType) -> Result<()> {
        if self.allowed.contains(&dtype) {
            Ok(())
        } else {
            Err(HybridError::DTypeNotAllowed {
                backend: self.backend.clone(),
                dtype,
                allowed: self.allowed.iter().copied().collect(),
            })
        }
    }

    /// Create an array from data and shape
    ///
    /// # Errors
    /// `ShapeDataMismatch` if `data.len()` differs from the shape's element
    /// count, `DTypeNotAllowed` if this backend does not accept `dtype`.
    pub fn array(&self, data: Vec<f32>, shape: &[usize], dtype: DType) -> Result<NdArray> {
        self.check_dtype(dtype)?;
        check_len(shape, data.len())?;
        Ok(NdArray {
            data: data.into_iter().map(|v| dtype.cast(v)).collect(),
            shape: shape.to_vec(),
            dtype,
            kind: self.kind,
        })
    }

    pub fn full(&self, shape: &[usize], value: f32, dtype: DType) -> Result<NdArray> {
        let size = shape.iter().product();
        self.array(vec![value; size], shape, dtype)
    }

    pub fn zeros(&self, shape: &[usize], dtype: DType) -> Result<NdArray> {
        self.full(shape, 0.0, dtype)
    }

    /// Values sampled from N(0, std^2)
    pub fn randn<R: Rng + ?Sized>(
        &self,
        shape: &[usize],
        std: f32,
        dtype: DType,
        rng: &mut R,
    ) -> Result<NdArray> {
        let normal = Normal::new(0.0, std)
            .map_err(|e| HybridError::InvalidParameter(format!("gaussian std {std}: {e}")))?;
        let size = shape.iter().product();
        let data: Vec<f32> = (0..size).map(|_| normal.sample(rng)).collect();
        self.array(data, shape, dtype)
    }

    /// Xavier uniform initialization
    ///
    /// Samples uniformly from [-limit, limit] where
    /// limit = sqrt(6 / (fan_in + fan_out)), for a weight of shape (out, in).
    pub fn xavier_uniform<R: Rng + ?Sized>(
        &self,
        shape: &[usize],
        dtype: DType,
        rng: &mut R,
    ) -> Result<NdArray> {
        let &[fan_out, fan_in] = shape else {
            return Err(HybridError::InvalidParameter(format!(
                "xavier init needs a 2-d shape, got {shape:?}"
            )));
        };
        if fan_in + fan_out == 0 {
            return self.zeros(shape, dtype);
        }
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let data: Vec<f32> = (0..fan_in * fan_out)
            .map(|_| rng.random_range(-limit..=limit))
            .collect();
        self.array(data, shape, dtype)
    }
}
