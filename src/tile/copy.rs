use super::{Tile, TileError};
use crate::{
    num::Scalar,
    ops,
    runtime::{AccessMode, Handle, Runtime},
};

/// Allocates a scratch handle sized for the index counters of
/// `ndim`-dimensional copies. One scratch handle may back any number of
/// tasks; every task gets its own private instance.
pub fn scratch(rt: &Runtime, ndim: usize, node: usize) -> Result<Handle, TileError> {
    Ok(rt.register_zeroed(node, 2 * ndim.max(1) * size_of::<usize>())?)
}

/// Copies the overlap of two tiles viewed at the given global offsets. Tiles
/// that do not intersect leave the destination untouched. The destination
/// access is write-only when the overlap covers the whole destination tile
/// and read-write otherwise, so partial overwrites preserve surrounding
/// elements.
pub fn copy_intersection<T: Scalar>(
    rt: &Runtime,
    src: &Tile<T>,
    src_offset: &[usize],
    dst: &Tile<T>,
    dst_offset: &[usize],
    scratch: &Handle,
) -> Result<(), TileError> {
    let ndim = src.ndim();
    if dst.ndim() != ndim {
        return Err(TileError::Ndim(ndim, dst.ndim()));
    }
    if src_offset.len() != ndim {
        return Err(TileError::Ndim(src_offset.len(), ndim));
    }
    if dst_offset.len() != ndim {
        return Err(TileError::Ndim(dst_offset.len(), ndim));
    }
    let node = dst.handle().owner();
    // zero-dimensional tiles copy the single element directly
    if ndim == 0 {
        ops::copy::submit(
            rt,
            T::DATA_TYPE,
            src.handle().clone(),
            dst.handle().clone(),
            node,
        )?;
        return Ok(());
    }
    // matching offsets and shapes reduce to a whole-buffer copy
    if src_offset == dst_offset && src.shape() == dst.shape() {
        ops::copy::submit(
            rt,
            T::DATA_TYPE,
            src.handle().clone(),
            dst.handle().clone(),
            node,
        )?;
        return Ok(());
    }
    let mut src_start = vec![0; ndim];
    let mut dst_start = vec![0; ndim];
    let mut copy_shape = vec![0; ndim];
    let mut mode = AccessMode::Write;
    for i in 0..ndim {
        // disjoint along any axis: nothing to copy
        if src_offset[i] + src.shape()[i] <= dst_offset[i]
            || dst_offset[i] + dst.shape()[i] <= src_offset[i]
        {
            return Ok(());
        }
        if src_offset[i] < dst_offset[i] {
            dst_start[i] = 0;
            src_start[i] = dst_offset[i] - src_offset[i];
            copy_shape[i] = (src.shape()[i] - src_start[i]).min(dst.shape()[i]);
        } else {
            dst_start[i] = src_offset[i] - dst_offset[i];
            src_start[i] = 0;
            copy_shape[i] = (dst.shape()[i] - dst_start[i]).min(src.shape()[i]);
        }
        if copy_shape[i] != dst.shape()[i] {
            mode = AccessMode::ReadWrite;
        }
    }
    ops::subcopy::submit::<T>(
        rt,
        &src_start,
        src.stride(),
        &copy_shape,
        &dst_start,
        dst.stride(),
        src.handle().clone(),
        dst.handle().clone(),
        scratch.clone(),
        mode,
        node,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_random(rt: &Runtime, tile: &Tile<f64>) -> Vec<f64> {
        let data: Vec<f64> = (0..tile.nelems()).map(|_| fastrand::f64()).collect();
        rt.write(tile.handle(), tile.handle().owner(), &data).unwrap();
        data
    }

    #[tokio::test]
    async fn test_copy_intersection() {
        let rt = Runtime::builder().build().await;
        let src = Tile::<f64>::new(&rt, [4, 5], 0).unwrap();
        let dst = Tile::<f64>::new(&rt, [3, 4], 0).unwrap();
        let src_offset = [2, 1];
        let dst_offset = [3, 2];
        let src_data = fill_random(&rt, &src);
        let dst_data = fill_random(&rt, &dst);
        let scratch = scratch(&rt, 2, 0).unwrap();

        copy_intersection(&rt, &src, &src_offset, &dst, &dst_offset, &scratch).unwrap();
        rt.wait_for_all().await;

        let result: Vec<f64> = rt.acquire(dst.handle(), 0).unwrap();
        for b in 0..dst.shape()[1] {
            for a in 0..dst.shape()[0] {
                let global = [dst_offset[0] + a, dst_offset[1] + b];
                let d = a + dst.shape()[0] * b;
                let inside = (0..2).all(|i| {
                    global[i] >= src_offset[i] && global[i] < src_offset[i] + src.shape()[i]
                });
                match inside {
                    true => {
                        let s = (global[0] - src_offset[0])
                            + src.shape()[0] * (global[1] - src_offset[1]);
                        assert_eq!(result[d], src_data[s]);
                    }
                    false => assert_eq!(result[d], dst_data[d]),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_copy_disjoint() {
        let rt = Runtime::builder().build().await;
        let src = Tile::<f64>::new(&rt, [2, 2], 0).unwrap();
        let dst = Tile::<f64>::new(&rt, [2, 2], 0).unwrap();
        fill_random(&rt, &src);
        let dst_data = fill_random(&rt, &dst);
        let scratch = scratch(&rt, 2, 0).unwrap();

        copy_intersection(&rt, &src, &[0, 0], &dst, &[5, 5], &scratch).unwrap();
        rt.wait_for_all().await;

        let result: Vec<f64> = rt.acquire(dst.handle(), 0).unwrap();
        assert_eq!(result, dst_data);
    }

    #[tokio::test]
    async fn test_copy_scalar() {
        let rt = Runtime::builder().build().await;
        let src = Tile::<f64>::new(&rt, [], 0).unwrap();
        let dst = Tile::<f64>::new(&rt, [], 0).unwrap();
        rt.write(src.handle(), 0, &[42.0_f64]).unwrap();
        let scratch = scratch(&rt, 0, 0).unwrap();

        copy_intersection(&rt, &src, &[], &dst, &[], &scratch).unwrap();
        rt.wait_for_all().await;

        let result: Vec<f64> = rt.acquire(dst.handle(), 0).unwrap();
        assert_eq!(result, [42.0]);
    }
}
