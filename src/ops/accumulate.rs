use half::f16;

use crate::{
    kernel,
    num::{DataType, Float, One},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_accumulate";

/// `dst += src` over the whole buffer; the associative combine behind the
/// reduction access mode.
fn wrapper<T: Float>(buffers: &mut [BufferView<'_>], _args: &[u8]) {
    let [dst, src] = buffers else {
        unreachable!("accumulate binds two buffers")
    };
    let nelems = dst.bytes().len() / size_of::<T>();
    kernel::add::cpu(
        T::one(),
        &src.as_slice::<T>()[..nelems],
        T::one(),
        &mut dst.as_mut_slice::<T>()[..nelems],
    );
}

pub(crate) fn codelet() -> Codelet {
    Codelet::new(NAME, [AccessMode::ReadWrite, AccessMode::Read])
        .with_cpu(DataType::F16, wrapper::<f16>)
        .with_cpu(DataType::F32, wrapper::<f32>)
        .with_cpu(DataType::F64, wrapper::<f64>)
        .with_accel(DataType::F16, wrapper::<f16>)
        .with_accel(DataType::F32, wrapper::<f32>)
        .with_accel(DataType::F64, wrapper::<f64>)
}

/// Accumulates `src` into `dst`. With `redux` the destination joins the
/// reduction path and independent contributions may run in any order;
/// without it the destination keeps the exclusive read-write.
pub fn submit<T: Float>(
    rt: &Runtime,
    src: Handle,
    dst: Handle,
    redux: bool,
    node: usize,
) -> Result<(), RuntimeError> {
    let mode = match redux {
        true => AccessMode::Redux,
        false => AccessMode::ReadWrite,
    };
    let accesses = vec![(dst, mode), (src, AccessMode::Read)];
    rt.submit(NAME, T::DATA_TYPE, &[], accesses, node)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splitting a reduction into independently submitted parts must give
    /// the same result through the redux path no matter the order, within
    /// floating point associativity tolerance.
    #[tokio::test]
    async fn test_redux_split() {
        let rt = Runtime::builder().workers(4).build().await;
        let nelems = 1000;
        for parts in [1_usize, 2, 5] {
            let dst = rt.register_zeroed(0, nelems * 4).unwrap();
            let mut expect = vec![0.0_f32; nelems];
            let sources: Vec<Handle> = (0..parts)
                .map(|_| {
                    let data: Vec<f32> = (0..nelems).map(|_| fastrand::f32()).collect();
                    for (e, x) in expect.iter_mut().zip(&data) {
                        *e += *x;
                    }
                    rt.register(0, bytemuck::cast_slice(&data)).unwrap()
                })
                .collect();
            for src in &sources {
                submit::<f32>(&rt, src.clone(), dst.clone(), true, 0).unwrap();
            }
            rt.wait_for_all().await;

            let result: Vec<f32> = rt.acquire(&dst, 0).unwrap();
            for (r, e) in result.iter().zip(&expect) {
                assert!((r - e).abs() <= 1e-4 * e.abs().max(1.0), "{r} vs {e}");
            }
        }
    }
}
