use bytemuck::{Pod, Zeroable};

use crate::{
    kernel,
    num::DataType,
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_fp16_to_fp32";

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Args {
    nelems: u64,
}

unsafe impl Zeroable for Args {}
unsafe impl Pod for Args {}

fn wrapper(buffers: &mut [BufferView<'_>], args: &[u8]) {
    let args: &Args = bytemuck::from_bytes(args);
    let nelems = args.nelems as usize;
    let [src, dst] = buffers else {
        unreachable!("fp16_to_fp32 binds two buffers")
    };
    kernel::fp16_to_fp32::cpu(
        &src.as_slice::<half::f16>()[..nelems],
        &mut dst.as_mut_slice::<f32>()[..nelems],
    );
}

// keyed by the source type
pub(crate) fn codelet() -> Codelet {
    Codelet::new(NAME, [AccessMode::Read, AccessMode::Write])
        .with_cpu(DataType::F16, wrapper)
        .with_accel(DataType::F16, wrapper)
}

pub fn submit(
    rt: &Runtime,
    nelems: usize,
    src: Handle,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let args = Args {
        nelems: nelems as u64,
    };
    let accesses = vec![(src, AccessMode::Read), (dst, AccessMode::Write)];
    rt.submit(NAME, DataType::F16, bytemuck::bytes_of(&args), accesses, node)
}
