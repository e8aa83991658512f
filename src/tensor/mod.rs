//! Tensors: logical N-dimensional arrays realized as a grid of tiles. The
//! grid maps a tile's multi-index to its linear id and records which node
//! stores each tile's data; every tensor-level operation decomposes into
//! per-tile tasks submitted on the owning nodes.

use derive_more::Deref;
use thiserror::Error;

use crate::{
    num::Scalar,
    runtime::{Handle, Runtime, RuntimeError},
    tile::{Tile, TileError, TileTraits},
};

pub use bias::{bias, bias_async};
pub use copy::{copy, copy_async, copy_intersection, copy_intersection_async};
pub use elementwise::{
    clear, clear_async, fill, fill_async, fp16_to_fp32, fp16_to_fp32_async, gelu, gelu_async,
};
pub use sum_slice::{sum_slice, sum_slice_async};

pub mod bias;
pub mod copy;
pub mod elementwise;
pub mod sum_slice;

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("tensor ndim {0} mismatches {1}")]
    Ndim(usize, usize),
    #[error("shape axis {0} is zero")]
    Shape(usize),
    #[error("base tile axis {0} is zero")]
    Basetile(usize),
    #[error("axis {0} is out of range for ndim {1}")]
    Axis(usize, usize),
    #[error("shapes mismatch along axis {0}: {1} vs {2}")]
    ShapeMismatch(usize, usize, usize),
    #[error("base tile shapes mismatch along axis {0}: {1} vs {2}")]
    BasetileMismatch(usize, usize, usize),
    #[error("distribution of {0} entries does not cover {1} tiles")]
    Distribution(usize, usize),
    #[error("rank {0} is out of range for a group of {1}")]
    Rank(usize, usize),
    #[error("data of {0} elements does not match tensor of {1}")]
    Data(usize, usize),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Bijection between tile multi-indices and linear tile ids, plus the map
/// from tile id to the node storing that tile's data.
#[derive(Debug, Clone, Deref)]
pub struct Grid {
    #[deref]
    traits: TileTraits,
    distribution: Vec<usize>,
}

impl Grid {
    pub fn new(
        shape: Vec<usize>,
        distribution: Vec<usize>,
        nodes: usize,
    ) -> Result<Self, TensorError> {
        let traits = TileTraits::new(shape);
        if distribution.len() != traits.nelems() {
            return Err(TensorError::Distribution(
                distribution.len(),
                traits.nelems(),
            ));
        }
        if let Some(&rank) = distribution.iter().find(|&&rank| rank >= nodes) {
            return Err(TensorError::Rank(rank, nodes));
        }
        Ok(Self {
            traits,
            distribution,
        })
    }

    /// Node storing the given tile's data.
    #[inline]
    pub fn owner(&self, tile: usize) -> usize {
        self.distribution[tile]
    }

    #[inline]
    pub fn distribution(&self) -> &[usize] {
        &self.distribution
    }
}

/// Round-robin tile distribution over the process group.
pub fn cyclic_distribution(ntiles: usize, nodes: usize) -> Vec<usize> {
    (0..ntiles).map(|tile| tile % nodes).collect()
}

/// Global shape plus per-axis base tile shape. Boundary tiles are clipped to
/// the global remainder, so per-axis tile shapes always sum to the global
/// shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorTraits {
    shape: Vec<usize>,
    basetile_shape: Vec<usize>,
    grid_shape: Vec<usize>,
    leftover_shape: Vec<usize>,
}

impl TensorTraits {
    pub fn new(
        shape: impl Into<Vec<usize>>,
        basetile: impl Into<Vec<usize>>,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        let basetile_shape = basetile.into();
        if shape.len() != basetile_shape.len() {
            return Err(TensorError::Ndim(shape.len(), basetile_shape.len()));
        }
        if let Some(axis) = shape.iter().position(|&dim| dim == 0) {
            return Err(TensorError::Shape(axis));
        }
        if let Some(axis) = basetile_shape.iter().position(|&dim| dim == 0) {
            return Err(TensorError::Basetile(axis));
        }
        let grid_shape: Vec<usize> = shape
            .iter()
            .zip(&basetile_shape)
            .map(|(&dim, &tile)| dim.div_ceil(tile))
            .collect();
        let leftover_shape: Vec<usize> = shape
            .iter()
            .zip(&basetile_shape)
            .zip(&grid_shape)
            .map(|((&dim, &tile), &grid)| dim - (grid - 1) * tile)
            .collect();
        Ok(Self {
            shape,
            basetile_shape,
            grid_shape,
            leftover_shape,
        })
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
    pub fn basetile_shape(&self) -> &[usize] {
        &self.basetile_shape
    }

    #[inline]
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    /// Total element count of the tensor.
    #[inline]
    pub fn nelems(&self) -> usize {
        self.shape.iter().product()
    }

    /// Shape of the tile at the given grid index, clipped at the boundary.
    pub fn tile_shape(&self, index: &[usize]) -> Vec<usize> {
        index
            .iter()
            .zip(&self.grid_shape)
            .zip(&self.basetile_shape)
            .zip(&self.leftover_shape)
            .map(|(((&i, &grid), &tile), &leftover)| match i + 1 == grid {
                true => leftover,
                false => tile,
            })
            .collect()
    }

    /// Global offset of the tile at the given grid index.
    pub fn tile_start(&self, index: &[usize]) -> Vec<usize> {
        index
            .iter()
            .zip(&self.basetile_shape)
            .map(|(&i, &tile)| i * tile)
            .collect()
    }
}

/// A grid of tiles over one logical array, each tile bound to a handle owned
/// by its node.
#[derive(Debug, Clone, Deref)]
pub struct Tensor<T: Scalar> {
    #[deref]
    traits: TensorTraits,
    grid: Grid,
    tiles: Vec<Tile<T>>,
}

impl<T: Scalar> Tensor<T> {
    /// Allocates a zero-initialized tensor with the given tile distribution.
    pub fn new(
        rt: &Runtime,
        shape: impl Into<Vec<usize>>,
        basetile: impl Into<Vec<usize>>,
        distribution: Vec<usize>,
    ) -> Result<Self, TensorError> {
        let traits = TensorTraits::new(shape, basetile)?;
        let grid = Grid::new(traits.grid_shape().to_vec(), distribution, rt.nodes())?;
        let mut tiles = Vec::with_capacity(grid.nelems());
        for i in 0..grid.nelems() {
            let index = grid.linear_to_index(i);
            let tile = TileTraits::new(traits.tile_shape(&index));
            let handle = rt.register_zeroed(grid.owner(i), tile.nelems() * size_of::<T>())?;
            tiles.push(Tile::from_parts(tile, handle)?);
        }
        Ok(Self {
            traits,
            grid,
            tiles,
        })
    }

    #[inline]
    pub fn traits(&self) -> &TensorTraits {
        &self.traits
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn tile(&self, linear: usize) -> &Tile<T> {
        &self.tiles[linear]
    }

    #[inline]
    pub fn tile_handle(&self, linear: usize) -> Handle {
        self.tiles[linear].handle().clone()
    }

    /// Scatters a flat host array into a freshly allocated tensor. Bring-up
    /// helper; real redistribution goes through [`copy_intersection`].
    pub fn from_slice(
        rt: &Runtime,
        shape: impl Into<Vec<usize>>,
        basetile: impl Into<Vec<usize>>,
        distribution: Vec<usize>,
        data: &[T],
    ) -> Result<Self, TensorError> {
        let tensor = Self::new(rt, shape, basetile, distribution)?;
        if data.len() != tensor.nelems() {
            return Err(TensorError::Data(data.len(), tensor.nelems()));
        }
        let global = TileTraits::new(tensor.shape().to_vec());
        for i in 0..tensor.grid.nelems() {
            let index = tensor.grid.linear_to_index(i);
            let start = tensor.tile_start(&index);
            let tile = &tensor.tiles[i];
            let mut buffer = vec![T::zero(); tile.nelems()];
            for (e, value) in buffer.iter_mut().enumerate() {
                let local = tile.linear_to_index(e);
                let position: Vec<usize> =
                    local.iter().zip(&start).map(|(&l, &s)| l + s).collect();
                *value = data[global.index_to_linear(&position)];
            }
            rt.write(tile.handle(), tensor.grid.owner(i), &buffer)?;
        }
        Ok(tensor)
    }

    /// Gathers the tensor into a flat host array, reading each tile at its
    /// owner. Bring-up helper; call after a drain.
    pub fn to_vec(&self, rt: &Runtime) -> Result<Vec<T>, TensorError> {
        let global = TileTraits::new(self.shape().to_vec());
        let mut data = vec![T::zero(); self.nelems()];
        for i in 0..self.grid.nelems() {
            let index = self.grid.linear_to_index(i);
            let start = self.tile_start(&index);
            let tile = &self.tiles[i];
            let buffer: Vec<T> = rt.acquire(tile.handle(), self.grid.owner(i))?;
            for (e, value) in buffer.iter().enumerate() {
                let local = tile.linear_to_index(e);
                let position: Vec<usize> =
                    local.iter().zip(&start).map(|(&l, &s)| l + s).collect();
                data[global.index_to_linear(&position)] = *value;
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boundary_tiles() {
        let rt = Runtime::builder().nodes(2).build().await;
        let distribution = cyclic_distribution(9, 2);
        let tensor = Tensor::<f32>::new(&rt, [5, 7], [2, 3], distribution).unwrap();
        assert_eq!(tensor.grid_shape(), [3, 3]);

        // per-axis tile extents sum to the global shape
        for axis in 0..2 {
            let mut index = vec![0; 2];
            let total: usize = (0..tensor.grid_shape()[axis])
                .map(|i| {
                    index[axis] = i;
                    tensor.tile_shape(&index)[axis]
                })
                .sum();
            assert_eq!(total, tensor.shape()[axis]);
        }
        // the corner tile is clipped on both axes
        assert_eq!(tensor.tile_shape(&[2, 2]), [1, 1]);
        assert_eq!(tensor.tile(8).shape(), [1, 1]);
    }

    #[tokio::test]
    async fn test_construction_errors() {
        let rt = Runtime::builder().build().await;
        let result = Tensor::<f32>::new(&rt, [4, 4], [2], vec![0; 4]);
        assert!(matches!(result, Err(TensorError::Ndim(2, 1))));

        let result = Tensor::<f32>::new(&rt, [4, 4], [2, 2], vec![0; 3]);
        assert!(matches!(result, Err(TensorError::Distribution(3, 4))));

        let result = Tensor::<f32>::new(&rt, [4, 4], [2, 2], vec![1; 4]);
        assert!(matches!(result, Err(TensorError::Rank(1, 1))));
    }

    #[tokio::test]
    async fn test_scatter_gather() {
        let rt = Runtime::builder().nodes(3).build().await;
        let data: Vec<f64> = (0..5 * 7).map(|x| x as f64).collect();
        let distribution = cyclic_distribution(9, 3);
        let tensor = Tensor::from_slice(&rt, [5, 7], [2, 3], distribution, &data).unwrap();
        assert_eq!(tensor.to_vec(&rt).unwrap(), data);
    }
}
