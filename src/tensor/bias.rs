use super::{Tensor, TensorError};
use crate::{
    num::{Float, One},
    ops,
    runtime::Runtime,
};

/// Adds a broadcast bias along `axis`: `dst[.., j, ..] += src[..]` where the
/// source has one axis fewer than the destination. Broadcast maps every
/// destination tile along `axis` to the same source tile; each task runs on
/// the destination tile's owner, with the source tile transferred there
/// first and the destination flushed afterwards.
pub fn bias_async<T: Float>(
    rt: &Runtime,
    src: &Tensor<T>,
    dst: &Tensor<T>,
    axis: usize,
) -> Result<(), TensorError> {
    if src.ndim() + 1 != dst.ndim() {
        return Err(TensorError::Ndim(src.ndim(), dst.ndim()));
    }
    if axis >= dst.ndim() {
        return Err(TensorError::Axis(axis, dst.ndim()));
    }
    for i in 0..axis {
        if src.shape()[i] != dst.shape()[i] {
            return Err(TensorError::ShapeMismatch(i, src.shape()[i], dst.shape()[i]));
        }
        if src.basetile_shape()[i] != dst.basetile_shape()[i] {
            return Err(TensorError::BasetileMismatch(
                i,
                src.basetile_shape()[i],
                dst.basetile_shape()[i],
            ));
        }
    }
    for i in axis + 1..dst.ndim() {
        if src.shape()[i - 1] != dst.shape()[i] {
            return Err(TensorError::ShapeMismatch(
                i,
                src.shape()[i - 1],
                dst.shape()[i],
            ));
        }
        if src.basetile_shape()[i - 1] != dst.basetile_shape()[i] {
            return Err(TensorError::BasetileMismatch(
                i,
                src.basetile_shape()[i - 1],
                dst.basetile_shape()[i],
            ));
        }
    }
    for i in 0..src.grid().nelems() {
        let src_index = src.grid().linear_to_index(i);
        let src_handle = src.tile_handle(i);
        // fixed indices of the destination tiles this source tile feeds
        let mut dst_index = vec![0; dst.ndim()];
        for j in 0..axis {
            dst_index[j] = src_index[j];
        }
        for j in axis + 1..dst.ndim() {
            dst_index[j] = src_index[j - 1];
        }
        // the broadcast axis floats over the whole destination grid
        for j in 0..dst.grid_shape()[axis] {
            dst_index[axis] = j;
            let linear = dst.grid().index_to_linear(&dst_index);
            let dst_tile = dst.tile(linear);
            let node = dst.grid().owner(linear);
            rt.transfer(&src_handle, node)?;
            let m = dst_tile.stride()[axis];
            let n = dst_tile.matrix_shape()[axis + 1][1];
            let k = dst_tile.shape()[axis];
            ops::add_slice::submit::<T>(
                rt,
                m,
                n,
                k,
                T::one(),
                src_handle.clone(),
                T::one(),
                dst_tile.handle().clone(),
                node,
            )?;
            rt.flush(dst_tile.handle())?;
        }
    }
    Ok(())
}

pub async fn bias<T: Float>(
    rt: &Runtime,
    src: &Tensor<T>,
    dst: &Tensor<T>,
    axis: usize,
) -> Result<(), TensorError> {
    bias_async(rt, src, dst, axis)?;
    rt.wait_for_all().await;
    Ok(())
}
