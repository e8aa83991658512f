use super::{Tensor, TensorError};
use crate::{
    num::Scalar,
    runtime::{Handle, Runtime},
    tile,
};

/// Copies the overlap of two tensors viewed at the given global offsets.
/// Works across different tilings: every destination tile receives one task
/// per overlapping source tile, each on the destination tile's owner with
/// the source transferred there first. Source tiles are disjoint in global
/// space, so a full-cover write never races a partial one.
pub fn copy_intersection_async<T: Scalar>(
    rt: &Runtime,
    src: &Tensor<T>,
    src_offset: &[usize],
    dst: &Tensor<T>,
    dst_offset: &[usize],
    scratch: &Handle,
) -> Result<(), TensorError> {
    let ndim = src.ndim();
    if dst.ndim() != ndim {
        return Err(TensorError::Ndim(ndim, dst.ndim()));
    }
    if src_offset.len() != ndim {
        return Err(TensorError::Ndim(src_offset.len(), ndim));
    }
    if dst_offset.len() != ndim {
        return Err(TensorError::Ndim(dst_offset.len(), ndim));
    }
    'tiles: for i in 0..dst.grid().nelems() {
        let dst_index = dst.grid().linear_to_index(i);
        let dst_tile = dst.tile(i);
        let dst_start: Vec<usize> = dst
            .tile_start(&dst_index)
            .iter()
            .zip(dst_offset)
            .map(|(&s, &o)| s + o)
            .collect();
        let node = dst.grid().owner(i);
        // range of source tiles overlapping this destination tile, per axis
        let mut lo = vec![0; ndim];
        let mut hi = vec![0; ndim];
        for a in 0..ndim {
            let begin = dst_start[a].max(src_offset[a]);
            let end = (dst_start[a] + dst_tile.shape()[a]).min(src_offset[a] + src.shape()[a]);
            if begin >= end {
                continue 'tiles;
            }
            lo[a] = (begin - src_offset[a]) / src.basetile_shape()[a];
            hi[a] = (end - 1 - src_offset[a]) / src.basetile_shape()[a];
        }
        let mut src_index = lo.clone();
        'sources: loop {
            let linear = src.grid().index_to_linear(&src_index);
            let src_tile = src.tile(linear);
            let src_handle = src.tile_handle(linear);
            rt.transfer(&src_handle, node)?;
            let src_start: Vec<usize> = src
                .tile_start(&src_index)
                .iter()
                .zip(src_offset)
                .map(|(&s, &o)| s + o)
                .collect();
            tile::copy_intersection(rt, src_tile, &src_start, dst_tile, &dst_start, scratch)?;
            let mut a = 0;
            loop {
                if a == ndim {
                    break 'sources;
                }
                src_index[a] += 1;
                if src_index[a] <= hi[a] {
                    break;
                }
                src_index[a] = lo[a];
                a += 1;
            }
        }
        rt.flush(dst_tile.handle())?;
    }
    Ok(())
}

pub async fn copy_intersection<T: Scalar>(
    rt: &Runtime,
    src: &Tensor<T>,
    src_offset: &[usize],
    dst: &Tensor<T>,
    dst_offset: &[usize],
    scratch: &Handle,
) -> Result<(), TensorError> {
    copy_intersection_async(rt, src, src_offset, dst, dst_offset, scratch)?;
    rt.wait_for_all().await;
    Ok(())
}

/// Full copy between tensors of identical shape, any tilings.
pub fn copy_async<T: Scalar>(
    rt: &Runtime,
    src: &Tensor<T>,
    dst: &Tensor<T>,
    scratch: &Handle,
) -> Result<(), TensorError> {
    if src.ndim() != dst.ndim() {
        return Err(TensorError::Ndim(src.ndim(), dst.ndim()));
    }
    for i in 0..src.ndim() {
        if src.shape()[i] != dst.shape()[i] {
            return Err(TensorError::ShapeMismatch(i, src.shape()[i], dst.shape()[i]));
        }
    }
    let zeros = vec![0; src.ndim()];
    copy_intersection_async(rt, src, &zeros, dst, &zeros, scratch)
}

pub async fn copy<T: Scalar>(
    rt: &Runtime,
    src: &Tensor<T>,
    dst: &Tensor<T>,
    scratch: &Handle,
) -> Result<(), TensorError> {
    copy_async(rt, src, dst, scratch)?;
    rt.wait_for_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::cyclic_distribution;

    #[tokio::test]
    async fn test_copy_intersection_overlap() {
        let rt = Runtime::builder().nodes(2).workers(4).build().await;
        let src_data: Vec<f64> = (0..7 * 6).map(|_| fastrand::f64()).collect();
        let dst_data: Vec<f64> = (0..5 * 5).map(|_| fastrand::f64()).collect();
        let src = Tensor::from_slice(
            &rt,
            [7, 6],
            [3, 4],
            cyclic_distribution(6, 2),
            &src_data,
        )
        .unwrap();
        let dst = Tensor::from_slice(
            &rt,
            [5, 5],
            [2, 2],
            cyclic_distribution(9, 2),
            &dst_data,
        )
        .unwrap();
        let src_offset = [2, 1];
        let dst_offset = [4, 3];
        let scratch = tile::scratch(&rt, 2, 0).unwrap();

        copy_intersection(&rt, &src, &src_offset, &dst, &dst_offset, &scratch)
            .await
            .unwrap();

        let result = dst.to_vec(&rt).unwrap();
        for b in 0..5 {
            for a in 0..5 {
                let global = [dst_offset[0] + a, dst_offset[1] + b];
                let d = a + 5 * b;
                let inside = (0..2).all(|i| {
                    global[i] >= src_offset[i] && global[i] < src_offset[i] + src.shape()[i]
                });
                match inside {
                    true => {
                        let s = (global[0] - src_offset[0]) + 7 * (global[1] - src_offset[1]);
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
        let src_data: Vec<f64> = (0..4).map(|_| fastrand::f64()).collect();
        let dst_data: Vec<f64> = (0..4).map(|_| fastrand::f64()).collect();
        let src = Tensor::from_slice(&rt, [2, 2], [2, 2], vec![0], &src_data).unwrap();
        let dst = Tensor::from_slice(&rt, [2, 2], [2, 2], vec![0], &dst_data).unwrap();
        let scratch = tile::scratch(&rt, 2, 0).unwrap();

        copy_intersection(&rt, &src, &[0, 0], &dst, &[10, 10], &scratch)
            .await
            .unwrap();
        assert_eq!(dst.to_vec(&rt).unwrap(), dst_data);
    }

    #[tokio::test]
    async fn test_copy_redistribute() {
        // a full copy between different tilings is a redistribution
        let rt = Runtime::builder().nodes(3).workers(4).build().await;
        let data: Vec<f64> = (0..8 * 9).map(|_| fastrand::f64()).collect();
        let src = Tensor::from_slice(
            &rt,
            [8, 9],
            [3, 2],
            cyclic_distribution(15, 3),
            &data,
        )
        .unwrap();
        let dst = Tensor::<f64>::new(&rt, [8, 9], [4, 5], cyclic_distribution(4, 3)).unwrap();
        let scratch = tile::scratch(&rt, 2, 0).unwrap();

        copy(&rt, &src, &dst, &scratch).await.unwrap();
        assert_eq!(dst.to_vec(&rt).unwrap(), data);
    }
}
