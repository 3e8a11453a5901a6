use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Dense N-dimensional tensor.
///
/// Stores data in a flat contiguous `Vec<T>` with row-major (C-order) layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, T::ZERO)
    }

    pub fn ones(shape: Vec<usize>) -> Self {
        Self::full(shape, T::ONE)
    }

    /// Create a tensor filled with a constant value.
    pub fn full(shape: Vec<usize>, value: T) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![value; s.numel()],
            shape: s,
        }
    }

    /// Random tensor with uniform distribution in [0, 1).
    pub fn rand(shape: Vec<usize>, seed: Option<u64>) -> Self {
        let s = Shape::new(shape);
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let data: Vec<T> = (0..s.numel())
            .map(|_| T::from_f64(rng.gen::<f64>()))
            .collect();
        Tensor { data, shape: s }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Get element at a multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> TensorResult<T> {
        let offset = self.shape.offset(indices)?;
        Ok(self.data[offset])
    }

    /// Set element at a multi-dimensional index.
    pub fn set(&mut self, indices: &[usize], value: T) -> TensorResult<()> {
        let offset = self.shape.offset(indices)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Reshape (must preserve total number of elements).
    pub fn reshape(self, new_shape: Vec<usize>) -> TensorResult<Tensor<T>> {
        let s = Shape::new(new_shape);
        if s.numel() != self.data.len() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: self.shape.to_vec(),
            });
        }
        Ok(Tensor {
            data: self.data,
            shape: s,
        })
    }

    /// Apply a function element-wise, returning a new tensor.
    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Tensor<T> {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Number of positions where `self` and `other` differ.
    pub fn count_diff(&self, other: &Tensor<T>) -> TensorResult<usize> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.to_vec(),
                got: other.shape.to_vec(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .filter(|(a, b)| a != b)
            .count())
    }
}
