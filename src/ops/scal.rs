use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{
    kernel,
    num::{DataType, Float},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_scal";

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Args {
    nelems: u64,
    alpha: f64,
}

unsafe impl Zeroable for Args {}
unsafe impl Pod for Args {}

fn wrapper<T: Float>(buffers: &mut [BufferView<'_>], args: &[u8]) {
    let args: &Args = bytemuck::from_bytes(args);
    let [dst] = buffers else {
        unreachable!("scal binds one buffer")
    };
    let dst = &mut dst.as_mut_slice::<T>()[..args.nelems as usize];
    kernel::scal::cpu(T::from_f64(args.alpha), dst);
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
    alpha: T,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        nelems: nelems as u64,
        alpha: alpha.to_f64(),
    };
    // scaling by zero discards the old contents entirely
    let mode = match alpha.to_f64() == 0.0 {
        true => AccessMode::Write,
        false => AccessMode::ReadWrite,
    };
    let accesses = vec![(dst, mode)];
    rt.submit(NAME, T::DATA_TYPE, bytemuck::bytes_of(&args), accesses, node)
}
