use super::{Tile, TileError};
use crate::{num::Float, ops, runtime::Runtime};

/// Reduces one axis of the source into the destination slice:
/// `dst = beta * dst + alpha * sum_axis(src)`. With `redux` the destination
/// joins the reduction path and independent partial sums merge in any order.
pub fn sum_slice<T: Float>(
    rt: &Runtime,
    alpha: T,
    src: &Tile<T>,
    beta: T,
    dst: &Tile<T>,
    axis: usize,
    redux: bool,
) -> Result<(), TileError> {
    if dst.ndim() + 1 != src.ndim() {
        return Err(TileError::Ndim(dst.ndim(), src.ndim()));
    }
    if axis >= src.ndim() {
        return Err(TileError::Axis(axis, src.ndim()));
    }
    for i in 0..axis {
        if dst.shape()[i] != src.shape()[i] {
            return Err(TileError::ShapeMismatch(i, dst.shape()[i], src.shape()[i]));
        }
    }
    for i in axis + 1..src.ndim() {
        if dst.shape()[i - 1] != src.shape()[i] {
            return Err(TileError::ShapeMismatch(
                i,
                dst.shape()[i - 1],
                src.shape()[i],
            ));
        }
    }
    let m = src.stride()[axis];
    let n = src.matrix_shape()[axis + 1][1];
    let k = src.shape()[axis];
    let node = dst.handle().owner();
    ops::sum_slice::submit::<T>(
        rt,
        m,
        n,
        k,
        alpha,
        src.handle().clone(),
        beta,
        dst.handle().clone(),
        redux,
        node,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileTraits;

    #[tokio::test]
    async fn test_sum_slice_axis() {
        let rt = Runtime::builder().build().await;
        let shape = [2, 3, 4];
        let src = Tile::<f64>::new(&rt, shape, 0).unwrap();
        let data: Vec<f64> = (0..src.nelems()).map(|_| fastrand::f64()).collect();
        rt.write(src.handle(), 0, &data).unwrap();

        for axis in 0..3 {
            let dst_shape: Vec<usize> = (0..3).filter(|&i| i != axis).map(|i| shape[i]).collect();
            let dst = Tile::<f64>::new(&rt, dst_shape.clone(), 0).unwrap();
            sum_slice(&rt, 1.0, &src, 0.0, &dst, axis, false).unwrap();
            rt.wait_for_all().await;

            let result: Vec<f64> = rt.acquire(dst.handle(), 0).unwrap();
            let traits = TileTraits::new(shape);
            let dst_traits = TileTraits::new(dst_shape);
            let mut expect = vec![0.0; dst_traits.nelems()];
            for linear in 0..traits.nelems() {
                let index = traits.linear_to_index(linear);
                let reduced: Vec<usize> = (0..3).filter(|&i| i != axis).map(|i| index[i]).collect();
                expect[dst_traits.index_to_linear(&reduced)] += data[linear];
            }
            for (r, e) in result.iter().zip(&expect) {
                assert!((r - e).abs() < 1e-12);
            }
        }
    }
}
