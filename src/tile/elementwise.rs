use half::f16;

use super::{Tile, TileError};
use crate::{
    num::{Float, Scalar},
    ops,
    runtime::Runtime,
};

pub fn clear<T: Scalar>(rt: &Runtime, dst: &Tile<T>) -> Result<(), TileError> {
    let node = dst.handle().owner();
    ops::clear::submit(rt, T::DATA_TYPE, dst.handle().clone(), node)?;
    Ok(())
}

pub fn fill<T: Float>(rt: &Runtime, value: T, dst: &Tile<T>) -> Result<(), TileError> {
    let node = dst.handle().owner();
    ops::fill::submit(rt, dst.nelems(), value, dst.handle().clone(), node)?;
    Ok(())
}

pub fn gelu<T: Float>(rt: &Runtime, dst: &Tile<T>) -> Result<(), TileError> {
    let node = dst.handle().owner();
    ops::gelu::submit::<T>(rt, dst.nelems(), dst.handle().clone(), node)?;
    Ok(())
}

pub fn fp16_to_fp32(rt: &Runtime, src: &Tile<f16>, dst: &Tile<f32>) -> Result<(), TileError> {
    if src.nelems() != dst.nelems() {
        return Err(TileError::Nelems(src.nelems(), dst.nelems()));
    }
    let node = dst.handle().owner();
    ops::fp16_to_fp32::submit(
        rt,
        src.nelems(),
        src.handle().clone(),
        dst.handle().clone(),
        node,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fill_gelu_clear() {
        let rt = Runtime::builder().build().await;
        let tile = Tile::<f32>::new(&rt, [2, 3, 4], 0).unwrap();

        fill(&rt, 1.5, &tile).unwrap();
        gelu(&rt, &tile).unwrap();
        rt.wait_for_all().await;
        let mut expect = vec![1.5_f32; 24];
        crate::kernel::gelu::cpu(&mut expect);
        let result: Vec<f32> = rt.acquire(tile.handle(), 0).unwrap();
        assert_eq!(result, expect);

        clear(&rt, &tile).unwrap();
        rt.wait_for_all().await;
        let result: Vec<f32> = rt.acquire(tile.handle(), 0).unwrap();
        assert!(result.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_fp16_to_fp32() {
        let rt = Runtime::builder().build().await;
        let src = Tile::<f16>::new(&rt, [3, 5], 0).unwrap();
        let dst = Tile::<f32>::new(&rt, [3, 5], 0).unwrap();
        let data: Vec<f16> = (0..15).map(|i| f16::from_f32(i as f32 * 0.25)).collect();
        rt.write(src.handle(), 0, &data).unwrap();

        fp16_to_fp32(&rt, &src, &dst).unwrap();
        rt.wait_for_all().await;

        let result: Vec<f32> = rt.acquire(dst.handle(), 0).unwrap();
        for (r, x) in result.iter().zip(&data) {
            assert_eq!(*r, x.to_f32());
        }
    }
}
