use half::f16;

use super::{Tensor, TensorError};
use crate::{
    num::{Float, Scalar},
    ops,
    runtime::Runtime,
};

pub fn clear_async<T: Scalar>(rt: &Runtime, dst: &Tensor<T>) -> Result<(), TensorError> {
    for i in 0..dst.grid().nelems() {
        let tile = dst.tile(i);
        let node = dst.grid().owner(i);
        ops::clear::submit(rt, T::DATA_TYPE, tile.handle().clone(), node)?;
        rt.flush(tile.handle())?;
    }
    Ok(())
}

pub async fn clear<T: Scalar>(rt: &Runtime, dst: &Tensor<T>) -> Result<(), TensorError> {
    clear_async(rt, dst)?;
    rt.wait_for_all().await;
    Ok(())
}

pub fn fill_async<T: Float>(rt: &Runtime, value: T, dst: &Tensor<T>) -> Result<(), TensorError> {
    for i in 0..dst.grid().nelems() {
        let tile = dst.tile(i);
        let node = dst.grid().owner(i);
        ops::fill::submit(rt, tile.nelems(), value, tile.handle().clone(), node)?;
        rt.flush(tile.handle())?;
    }
    Ok(())
}

pub async fn fill<T: Float>(rt: &Runtime, value: T, dst: &Tensor<T>) -> Result<(), TensorError> {
    fill_async(rt, value, dst)?;
    rt.wait_for_all().await;
    Ok(())
}

pub fn gelu_async<T: Float>(rt: &Runtime, dst: &Tensor<T>) -> Result<(), TensorError> {
    for i in 0..dst.grid().nelems() {
        let tile = dst.tile(i);
        let node = dst.grid().owner(i);
        ops::gelu::submit::<T>(rt, tile.nelems(), tile.handle().clone(), node)?;
        rt.flush(tile.handle())?;
    }
    Ok(())
}

pub async fn gelu<T: Float>(rt: &Runtime, dst: &Tensor<T>) -> Result<(), TensorError> {
    gelu_async(rt, dst)?;
    rt.wait_for_all().await;
    Ok(())
}

/// Converts a half precision tensor into a single precision one of identical
/// shape and tiling, tile by tile on the destination owners.
pub fn fp16_to_fp32_async(
    rt: &Runtime,
    src: &Tensor<f16>,
    dst: &Tensor<f32>,
) -> Result<(), TensorError> {
    if src.ndim() != dst.ndim() {
        return Err(TensorError::Ndim(src.ndim(), dst.ndim()));
    }
    for i in 0..src.ndim() {
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
    for i in 0..dst.grid().nelems() {
        let src_handle = src.tile_handle(i);
        let dst_tile = dst.tile(i);
        let node = dst.grid().owner(i);
        rt.transfer(&src_handle, node)?;
        ops::fp16_to_fp32::submit(
            rt,
            dst_tile.nelems(),
            src_handle,
            dst_tile.handle().clone(),
            node,
        )?;
        rt.flush(dst_tile.handle())?;
    }
    Ok(())
}

pub async fn fp16_to_fp32(
    rt: &Runtime,
    src: &Tensor<f16>,
    dst: &Tensor<f32>,
) -> Result<(), TensorError> {
    fp16_to_fp32_async(rt, src, dst)?;
    rt.wait_for_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::cyclic_distribution;

    #[tokio::test]
    async fn test_fill_clear() {
        let rt = Runtime::builder().nodes(2).build().await;
        let distribution = cyclic_distribution(6, 2);
        let tensor = Tensor::<f32>::new(&rt, [4, 6], [2, 2], distribution).unwrap();

        fill(&rt, 3.25, &tensor).await.unwrap();
        assert!(tensor.to_vec(&rt).unwrap().iter().all(|&x| x == 3.25));

        clear(&rt, &tensor).await.unwrap();
        assert!(tensor.to_vec(&rt).unwrap().iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_fp16_to_fp32() {
        let rt = Runtime::builder().nodes(2).build().await;
        let data: Vec<f16> = (0..12).map(|x| f16::from_f32(x as f32 * 0.5)).collect();
        let distribution = cyclic_distribution(4, 2);
        let src = Tensor::from_slice(&rt, [3, 4], [2, 2], distribution.clone(), &data).unwrap();
        let dst = Tensor::<f32>::new(&rt, [3, 4], [2, 2], distribution).unwrap();

        fp16_to_fp32(&rt, &src, &dst).await.unwrap();
        let result = dst.to_vec(&rt).unwrap();
        for (r, x) in result.iter().zip(&data) {
            assert_eq!(*r, x.to_f32());
        }
    }
}
