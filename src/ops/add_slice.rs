use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{
    kernel,
    num::{DataType, Float},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError, args_hash},
};

pub const NAME: &str = "tessera_add_slice";

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Args {
    m: u64,
    n: u64,
    k: u64,
    alpha: f64,
    beta: f64,
}

unsafe impl Zeroable for Args {}
unsafe impl Pod for Args {}

fn wrapper<T: Float>(buffers: &mut [BufferView<'_>], args: &[u8]) {
    let args: &Args = bytemuck::from_bytes(args);
    let (m, n, k) = (args.m as usize, args.n as usize, args.k as usize);
    let [src, dst] = buffers else {
        unreachable!("add_slice binds two buffers")
    };
    kernel::add_slice::cpu(
        m,
        n,
        k,
        T::from_f64(args.alpha),
        &src.as_slice::<T>()[..m * n],
        T::from_f64(args.beta),
        &mut dst.as_mut_slice::<T>()[..m * k * n],
    );
}

// the scheduling hint covers the reshape only, not the scaling factors
fn footprint(args: &[u8]) -> u32 {
    let args: &Args = bytemuck::from_bytes(args);
    args_hash(bytemuck::cast_slice(&[args.m, args.n, args.k]))
}

pub(crate) fn codelet() -> Codelet {
    Codelet::new(NAME, [AccessMode::Read, AccessMode::ReadWrite])
        .with_cpu(DataType::F16, wrapper::<f16>)
        .with_cpu(DataType::F32, wrapper::<f32>)
        .with_cpu(DataType::F64, wrapper::<f64>)
        .with_accel(DataType::F16, wrapper::<f16>)
        .with_accel(DataType::F32, wrapper::<f32>)
        .with_accel(DataType::F64, wrapper::<f64>)
        .with_footprint(footprint)
}

/// Broadcast add of an `(m, n)` slice into an `(m, k, n)` destination view.
pub fn submit<T: Float>(
    rt: &Runtime,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    src: Handle,
    beta: T,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        m: m as u64,
        n: n as u64,
        k: k as u64,
        alpha: alpha.to_f64(),
        beta: beta.to_f64(),
    };
    let mode = match args.beta {
        0.0 => AccessMode::Write,
        _ => AccessMode::ReadWrite,
    };
    let accesses = vec![(src, AccessMode::Read), (dst, mode)];
    rt.submit(NAME, T::DATA_TYPE, bytemuck::bytes_of(&args), accesses, node)
}
