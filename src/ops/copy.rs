use crate::{
    num::DataType,
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_copy";

/// Whole-buffer copy. Also serves zero-dimensional tiles, which copy a
/// single element and bypass the odometer entirely.
fn wrapper(buffers: &mut [BufferView<'_>], _args: &[u8]) {
    let [src, dst] = buffers else {
        unreachable!("copy binds two buffers")
    };
    let src = src.bytes();
    dst.bytes_mut()[..src.len()].copy_from_slice(src);
}

pub(crate) fn codelet() -> Codelet {
    let mut codelet = Codelet::new(NAME, [AccessMode::Read, AccessMode::Write]);
    for dtype in [DataType::F16, DataType::F32, DataType::F64, DataType::I64] {
        codelet = codelet.with_cpu(dtype, wrapper).with_accel(dtype, wrapper);
    }
    codelet
}

pub fn submit(
    rt: &Runtime,
    dtype: DataType,
    src: Handle,
    dst: Handle,
    node: usize,
) -> Result<(), RuntimeError> {
    let accesses = vec![(src, AccessMode::Read), (dst, AccessMode::Write)];
    rt.submit(NAME, dtype, &[], accesses, node)
}
