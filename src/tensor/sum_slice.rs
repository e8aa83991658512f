use super::{Tensor, TensorError};
use crate::{
    num::{Float, One},
    ops,
    runtime::Runtime,
};

/// Reduces one axis of the source into the destination:
/// `dst = beta * dst + alpha * sum_axis(src)`. Source tiles along the
/// reduced axis all contribute to the same destination tile; with `redux`
/// the contributions carry the reduction access and merge in any order,
/// without it they form a serialized read-write chain in tile order.
pub fn sum_slice_async<T: Float>(
    rt: &Runtime,
    alpha: T,
    src: &Tensor<T>,
    beta: T,
    dst: &Tensor<T>,
    axis: usize,
    redux: bool,
) -> Result<(), TensorError> {
    if dst.ndim() + 1 != src.ndim() {
        return Err(TensorError::Ndim(dst.ndim(), src.ndim()));
    }
    if axis >= src.ndim() {
        return Err(TensorError::Axis(axis, src.ndim()));
    }
    for i in 0..axis {
        if dst.shape()[i] != src.shape()[i] {
            return Err(TensorError::ShapeMismatch(i, dst.shape()[i], src.shape()[i]));
        }
        if dst.basetile_shape()[i] != src.basetile_shape()[i] {
            return Err(TensorError::BasetileMismatch(
                i,
                dst.basetile_shape()[i],
                src.basetile_shape()[i],
            ));
        }
    }
    for i in axis + 1..src.ndim() {
        if dst.shape()[i - 1] != src.shape()[i] {
            return Err(TensorError::ShapeMismatch(
                i,
                dst.shape()[i - 1],
                src.shape()[i],
            ));
        }
        if dst.basetile_shape()[i - 1] != src.basetile_shape()[i] {
            return Err(TensorError::BasetileMismatch(
                i,
                dst.basetile_shape()[i - 1],
                src.basetile_shape()[i],
            ));
        }
    }
    for i in 0..dst.grid().nelems() {
        let dst_index = dst.grid().linear_to_index(i);
        let dst_tile = dst.tile(i);
        let node = dst.grid().owner(i);
        // source tile index with the reduced axis floating
        let mut src_index = vec![0; src.ndim()];
        for j in 0..axis {
            src_index[j] = dst_index[j];
        }
        for j in axis + 1..src.ndim() {
            src_index[j] = dst_index[j - 1];
        }
        if redux && beta != T::one() {
            // pre-scale once so every contribution can accumulate freely
            ops::scal::submit::<T>(rt, dst_tile.nelems(), beta, dst_tile.handle().clone(), node)?;
        }
        for j in 0..src.grid_shape()[axis] {
            src_index[axis] = j;
            let linear = src.grid().index_to_linear(&src_index);
            let src_tile = src.tile(linear);
            let src_handle = src.tile_handle(linear);
            rt.transfer(&src_handle, node)?;
            let m = src_tile.stride()[axis];
            let n = src_tile.matrix_shape()[axis + 1][1];
            let k = src_tile.shape()[axis];
            let beta = match (redux, j) {
                (true, _) => T::one(),
                (false, 0) => beta,
                (false, _) => T::one(),
            };
            ops::sum_slice::submit::<T>(
                rt,
                m,
                n,
                k,
                alpha,
                src_handle,
                beta,
                dst_tile.handle().clone(),
                redux,
                node,
            )?;
        }
        rt.flush(dst_tile.handle())?;
    }
    Ok(())
}

pub async fn sum_slice<T: Float>(
    rt: &Runtime,
    alpha: T,
    src: &Tensor<T>,
    beta: T,
    dst: &Tensor<T>,
    axis: usize,
    redux: bool,
) -> Result<(), TensorError> {
    sum_slice_async(rt, alpha, src, beta, dst, axis, redux)?;
    rt.wait_for_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::cyclic_distribution;

    /// Splitting the reduced axis into one, two, or five tiles must agree
    /// with the host reference whichever order the partial sums merge in.
    #[tokio::test]
    async fn test_sum_slice_split() {
        let rt = Runtime::builder().nodes(2).workers(4).build().await;
        let data: Vec<f64> = (0..3 * 10 * 4).map(|_| fastrand::f64()).collect();
        let mut expect = vec![0.0_f64; 3 * 4];
        for l in 0..4 {
            for j in 0..10 {
                for i in 0..3 {
                    expect[i + 3 * l] += data[i + 3 * (j + 10 * l)];
                }
            }
        }
        for redux in [false, true] {
            for k_tile in [10, 5, 2] {
                let ntiles = 2 * 10_usize.div_ceil(k_tile) * 2;
                let src = Tensor::from_slice(
                    &rt,
                    [3, 10, 4],
                    [2, k_tile, 3],
                    cyclic_distribution(ntiles, 2),
                    &data,
                )
                .unwrap();
                let dst =
                    Tensor::<f64>::new(&rt, [3, 4], [2, 3], cyclic_distribution(4, 2)).unwrap();
                sum_slice(&rt, 1.0, &src, 0.0, &dst, 1, redux).await.unwrap();

                let result = dst.to_vec(&rt).unwrap();
                for (r, e) in result.iter().zip(&expect) {
                    assert!((r - e).abs() < 1e-12, "{r} vs {e}");
                }
            }
        }
    }
}
