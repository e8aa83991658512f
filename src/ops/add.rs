use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{
    kernel,
    num::{DataType, Float},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_add";

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Args {
    nelems: u64,
    alpha: f64,
    beta: f64,
}

unsafe impl Zeroable for Args {}
unsafe impl Pod for Args {}

fn wrapper<T: Float>(buffers: &mut [BufferView<'_>], args: &[u8]) {
    let args: &Args = bytemuck::from_bytes(args);
    let nelems = args.nelems as usize;
    let [src, dst] = buffers else {
        unreachable!("add binds two buffers")
    };
    kernel::add::cpu(
        T::from_f64(args.alpha),
        &src.as_slice::<T>()[..nelems],
        T::from_f64(args.beta),
        &mut dst.as_mut_slice::<T>()[..nelems],
    );
}

pub(crate) fn codelet() -> Codelet {
    Codelet::new(NAME, [AccessMode::Read, AccessMode::ReadWrite])
        .with_cpu(DataType::F16, wrapper::<f16>)
        .with_cpu(DataType::F32, wrapper::<f32>)
        .with_cpu(DataType::F64, wrapper::<f64>)
        .with_accel(DataType::F16, wrapper::<f16>)
        .with_accel(DataType::F32, wrapper::<f32>)
        .with_accel(DataType::F64, wrapper::<f64>)
}

/// `dst = alpha * src + beta * dst`. The destination mode follows `beta`:
/// zero discards the old value, one makes the update commutative, anything
/// else needs the exclusive read-write.
pub fn submit<T: Float>(
    rt: &Runtime,
    nelems: usize,
    alpha: T,
    src: Handle,
    beta: T,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        nelems: nelems as u64,
        alpha: alpha.to_f64(),
        beta: beta.to_f64(),
    };
    let mode = match args.beta {
        0.0 => AccessMode::Write,
        1.0 => AccessMode::Commute,
        _ => AccessMode::ReadWrite,
    };
    let accesses = vec![(src, AccessMode::Read), (dst, mode)];
    rt.submit(NAME, T::DATA_TYPE, bytemuck::bytes_of(&args), accesses, node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add() {
        let rt = Runtime::builder().build().await;
        let nelems = 128;
        let a: Vec<f64> = (0..nelems).map(|_| fastrand::f64()).collect();
        let b: Vec<f64> = (0..nelems).map(|_| fastrand::f64()).collect();
        let ha = rt.register(0, bytemuck::cast_slice(&a)).unwrap();
        let hb = rt.register(0, bytemuck::cast_slice(&b)).unwrap();

        submit::<f64>(&rt, nelems, 2.0, ha.clone(), -1.0, hb.clone(), 0).unwrap();
        rt.wait_for_all().await;

        let result: Vec<f64> = rt.acquire(&hb, 0).unwrap();
        for ((x, y), r) in a.iter().zip(&b).zip(&result) {
            assert_eq!(*r, 2.0 * x - y);
        }
    }

    #[tokio::test]
    async fn test_dependency_order() {
        // the write-after-read hazard on `a` must keep program order: the
        // second fill cannot overtake the add that reads `a`
        let rt = Runtime::builder().workers(4).build().await;
        let nelems = 4096;
        let ha = rt.register_zeroed(0, nelems * 8).unwrap();
        let hb = rt.register_zeroed(0, nelems * 8).unwrap();

        crate::ops::fill::submit::<f64>(&rt, nelems, 2.0, ha.clone(), 0).unwrap();
        crate::ops::fill::submit::<f64>(&rt, nelems, 3.0, hb.clone(), 0).unwrap();
        submit::<f64>(&rt, nelems, 1.0, ha.clone(), 1.0, hb.clone(), 0).unwrap();
        crate::ops::fill::submit::<f64>(&rt, nelems, 7.0, ha.clone(), 0).unwrap();
        rt.wait_for_all().await;

        let a: Vec<f64> = rt.acquire(&ha, 0).unwrap();
        let b: Vec<f64> = rt.acquire(&hb, 0).unwrap();
        assert!(a.iter().all(|&x| x == 7.0));
        assert!(b.iter().all(|&x| x == 5.0));
    }
}
