use crate::{
    kernel,
    num::DataType,
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

pub const NAME: &str = "tessera_clear";

fn wrapper(buffers: &mut [BufferView<'_>], _args: &[u8]) {
    let [dst] = buffers else {
        unreachable!("clear binds one buffer")
    };
    kernel::clear::cpu(dst.bytes_mut());
}

pub(crate) fn codelet() -> Codelet {
    let mut codelet = Codelet::new(NAME, [AccessMode::Write]);
    for dtype in [DataType::F16, DataType::F32, DataType::F64, DataType::I64] {
        codelet = codelet.with_cpu(dtype, wrapper).with_accel(dtype, wrapper);
    }
    codelet
}

pub fn submit(rt: &Runtime, dtype: DataType, dst: Handle, node: usize) -> Result<(), RuntimeError> {
    rt.submit(NAME, dtype, &[], vec![(dst, AccessMode::Write)], node)
}
