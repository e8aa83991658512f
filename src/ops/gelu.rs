use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{
    kernel,
    num::{DataType, Float},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_gelu";

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Args {
    nelems: u64,
}

unsafe impl Zeroable for Args {}
unsafe impl Pod for Args {}

fn wrapper<T: Float>(buffers: &mut [BufferView<'_>], args: &[u8]) {
    let args: &Args = bytemuck::from_bytes(args);
    let [dst] = buffers else {
        unreachable!("gelu binds one buffer")
    };
    kernel::gelu::cpu(&mut dst.as_mut_slice::<T>()[..args.nelems as usize]);
}

pub(crate) fn codelet() -> Codelet {
    Codelet::new(NAME, [AccessMode::ReadWrite])
        .with_cpu(DataType::F16, wrapper::<f16>)
        .with_cpu(DataType::F32, wrapper::<f32>)
        .with_cpu(DataType::F64, wrapper::<f64>)
        .with_accel(DataType::F16, wrapper::<f16>)
        .with_accel(DataType::F32, wrapper::<f32>)
        .with_accel(DataType::F64, wrapper::<f64>)
}

pub fn submit<T: Float>(
    rt: &Runtime,
    nelems: usize,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        nelems: nelems as u64,
    };
    let accesses = vec![(dst, AccessMode::ReadWrite)];
    rt.submit(NAME, T::DATA_TYPE, bytemuck::bytes_of(&args), accesses, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Where;

    async fn validate(rt: &Runtime, mask: Where, nelems: usize) {
        let mut data: Vec<f32> = (0..nelems).map(|_| fastrand::f32() * 4.0 - 2.0).collect();
        let handle = rt.register(0, bytemuck::cast_slice(&data)).unwrap();

        let codelet = rt.codelet(NAME).unwrap();
        codelet.restrict_where(mask);
        submit::<f32>(rt, nelems, handle.clone(), 0).unwrap();
        rt.wait_for_all().await;
        codelet.restore_where();

        kernel::gelu::cpu(&mut data);
        let result: Vec<f32> = rt.acquire(&handle, 0).unwrap();
        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn test_gelu_cpu() {
        let rt = Runtime::builder().build().await;
        // one element, a large flat buffer, and a {2, 3, 4} tile
        for nelems in [1, 10000, 24] {
            validate(&rt, Where::CPU, nelems).await;
        }
    }

    #[tokio::test]
    async fn test_gelu_accel() {
        let rt = Runtime::builder().devices(2).build().await;
        for nelems in [1, 10000, 24] {
            validate(&rt, Where::ACCEL, nelems).await;
        }
    }
}
