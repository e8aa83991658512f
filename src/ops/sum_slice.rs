use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{
    kernel,
    num::{DataType, Float},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError, args_hash},
};

pub const NAME: &str = "tessera_sum_slice";

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
        unreachable!("sum_slice binds two buffers")
    };
    kernel::sum_slice::cpu(
        m,
        n,
        k,
        T::from_f64(args.alpha),
        &src.as_slice::<T>()[..m * k * n],
        T::from_f64(args.beta),
        &mut dst.as_mut_slice::<T>()[..m * n],
    );
}

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

/// Reduces the middle axis of an `(m, k, n)` source view into an `(m, n)`
/// destination. With `redux` the destination joins the reduction path so
/// independent partial sums merge in any order.
pub fn submit<T: Float>(
    rt: &Runtime,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    src: Handle,
    beta: T,
    dst: Handle,
    redux: bool,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        m: m as u64,
        n: n as u64,
        k: k as u64,
        alpha: alpha.to_f64(),
        beta: beta.to_f64(),
    };
    let mode = match (redux, args.beta) {
        (true, _) => AccessMode::Redux,
        (false, 0.0) => AccessMode::Write,
        (false, _) => AccessMode::ReadWrite,
    };
    let accesses = vec![(src, AccessMode::Read), (dst, mode)];
    rt.submit(NAME, T::DATA_TYPE, bytemuck::bytes_of(&args), accesses, node)
}
