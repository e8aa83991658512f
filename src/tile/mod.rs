//! Tiles: the unit of computation. A [`TileTraits`] describes the immutable
//! shape and stride metadata of one N-dimensional box; a [`Tile`] binds such
//! a descriptor to a runtime handle.

use std::marker::PhantomData;

use derive_more::Deref;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    num::Scalar,
    runtime::{Handle, Runtime, RuntimeError},
};

pub use bias::bias;
pub use copy::{copy_intersection, scratch};
pub use elementwise::{clear, fill, fp16_to_fp32, gelu};
pub use sum_slice::sum_slice;

pub mod bias;
pub mod copy;
pub mod elementwise;
pub mod sum_slice;

#[derive(Debug, Error)]
pub enum TileError {
    #[error("tile ndim {0} mismatches {1}")]
    Ndim(usize, usize),
    #[error("axis {0} is out of range for ndim {1}")]
    Axis(usize, usize),
    #[error("shapes mismatch along axis {0}: {1} vs {2}")]
    ShapeMismatch(usize, usize, usize),
    #[error("element counts mismatch: {0} vs {1}")]
    Nelems(usize, usize),
    #[error("handle of {found} bytes cannot back a tile of {expect} bytes")]
    Handle { expect: usize, found: usize },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Shape and stride metadata of one tile. Strides are a pure function of the
/// shape with a unit innermost axis (`stride[0] == 1`, first axis fastest);
/// they are recomputed at construction and never stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileTraits {
    shape: Vec<usize>,
    stride: Vec<usize>,
    nelems: usize,
    matrix_shape: Vec<[usize; 2]>,
}

impl TileTraits {
    pub fn new(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        assert!(
            shape.iter().all(|&dim| dim > 0),
            "tile axes must be positive: {shape:?}"
        );
        let ndim = shape.len();
        let mut stride = vec![1; ndim];
        for i in 1..ndim {
            stride[i] = stride[i - 1] * shape[i - 1];
        }
        let nelems = shape.iter().product();
        // matrix_shape[k] collapses axes [0, k) into rows and [k, ndim) into
        // columns for 2-D-oriented kernels
        let mut matrix_shape = vec![[1, 1]; ndim + 1];
        for k in 0..=ndim {
            let rows = shape[..k].iter().product();
            matrix_shape[k] = [rows, nelems / rows];
        }
        Self {
            shape,
            stride,
            nelems,
            matrix_shape,
        }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    #[inline]
    pub fn nelems(&self) -> usize {
        self.nelems
    }

    #[inline]
    pub fn matrix_shape(&self) -> &[[usize; 2]] {
        &self.matrix_shape
    }

    /// Multi-index of the element with the given linear offset.
    pub fn linear_to_index(&self, linear: usize) -> Vec<usize> {
        assert!(linear < self.nelems, "linear {linear} out of {}", self.nelems);
        let mut linear = linear;
        let mut index = vec![0; self.ndim()];
        for (i, &dim) in self.shape.iter().enumerate() {
            index[i] = linear % dim;
            linear /= dim;
        }
        index
    }

    /// Linear offset of the element with the given multi-index.
    pub fn index_to_linear(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.ndim(), "index rank mismatch");
        index
            .iter()
            .zip(&self.shape)
            .zip(&self.stride)
            .map(|((&i, &dim), &stride)| {
                assert!(i < dim, "index {i} out of axis bound {dim}");
                i * stride
            })
            .sum()
    }
}

impl std::fmt::Display for TileTraits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "shape [{}], stride [{}]",
            self.shape.iter().format(", "),
            self.stride.iter().format(", ")
        )
    }
}

/// A tile descriptor bound to one buffer handle.
#[derive(Debug, Clone, Deref)]
pub struct Tile<T: Scalar> {
    #[deref]
    traits: TileTraits,
    handle: Handle,
    phantom: PhantomData<T>,
}

impl<T: Scalar> Tile<T> {
    /// Allocates a zero-initialized tile at `node`.
    pub fn new(
        rt: &Runtime,
        shape: impl Into<Vec<usize>>,
        node: usize,
    ) -> Result<Self, TileError> {
        let traits = TileTraits::new(shape);
        let handle = rt.register_zeroed(node, traits.nelems() * size_of::<T>())?;
        Self::from_parts(traits, handle)
    }

    /// Binds a descriptor to an existing handle. Several descriptors of equal
    /// element count may share one handle, e.g. transposed views.
    pub fn from_parts(traits: TileTraits, handle: Handle) -> Result<Self, TileError> {
        let expect = traits.nelems() * size_of::<T>();
        if handle.size() < expect {
            return Err(TileError::Handle {
                expect,
                found: handle.size(),
            });
        }
        Ok(Self {
            traits,
            handle,
            phantom: PhantomData,
        })
    }

    #[inline]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    #[inline]
    pub fn traits(&self) -> &TileTraits {
        &self.traits
    }

    /// Size of the tile's data in bytes.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.nelems() * size_of::<T>()
    }
}
