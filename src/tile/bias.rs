use super::{Tile, TileError};
use crate::{
    num::{Float, One},
    ops,
    runtime::Runtime,
};

/// Adds a bias tile along one axis: the destination viewed as an `(m, k, n)`
/// box gains the source viewed as its `(m, n)` slice, where `m` collapses the
/// axes below `axis` and `n` the axes above it.
pub fn bias<T: Float>(
    rt: &Runtime,
    src: &Tile<T>,
    dst: &Tile<T>,
    axis: usize,
) -> Result<(), TileError> {
    if src.ndim() + 1 != dst.ndim() {
        return Err(TileError::Ndim(src.ndim(), dst.ndim()));
    }
    if axis >= dst.ndim() {
        return Err(TileError::Axis(axis, dst.ndim()));
    }
    for i in 0..axis {
        if src.shape()[i] != dst.shape()[i] {
            return Err(TileError::ShapeMismatch(i, src.shape()[i], dst.shape()[i]));
        }
    }
    for i in axis + 1..dst.ndim() {
        if src.shape()[i - 1] != dst.shape()[i] {
            return Err(TileError::ShapeMismatch(
                i,
                src.shape()[i - 1],
                dst.shape()[i],
            ));
        }
    }
    let m = dst.stride()[axis];
    let n = dst.matrix_shape()[axis + 1][1];
    let k = dst.shape()[axis];
    let node = dst.handle().owner();
    ops::add_slice::submit::<T>(
        rt,
        m,
        n,
        k,
        T::one(),
        src.handle().clone(),
        T::one(),
        dst.handle().clone(),
        node,
    )?;
    Ok(())
}
