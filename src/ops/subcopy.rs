use half::f16;

use crate::{
    kernel,
    num::{DataType, Scalar},
    runtime::{AccessMode, BufferView, Codelet, Handle, Runtime, RuntimeError},
};

// one codelet per destination mode, since the mode contract is part of the
// codelet itself for this operation
pub const NAME_W: &str = "tessera_subcopy_w";
pub const NAME_RW: &str = "tessera_subcopy_rw";
pub const NAME_RW_COMMUTE: &str = "tessera_subcopy_rw_commute";

fn wrapper<T: Scalar>(buffers: &mut [BufferView<'_>], args: &[u8]) {
    // packed as [ndim, src_start, src_stride, copy_shape, dst_start, dst_stride]
    let words: &[usize] = bytemuck::cast_slice(args);
    let ndim = words[0];
    let src_start = &words[1..1 + ndim];
    let src_stride = &words[1 + ndim..1 + 2 * ndim];
    let copy_shape = &words[1 + 2 * ndim..1 + 3 * ndim];
    let dst_start = &words[1 + 3 * ndim..1 + 4 * ndim];
    let dst_stride = &words[1 + 4 * ndim..1 + 5 * ndim];
    let [src, dst, scratch] = buffers else {
        unreachable!("subcopy binds three buffers")
    };
    let src = src.as_slice::<T>();
    let tmp_index = &mut bytemuck::cast_slice_mut::<u8, usize>(scratch.bytes_mut())[..2 * ndim];
    kernel::subcopy::cpu(
        ndim,
        src_start,
        src_stride,
        copy_shape,
        src,
        dst_start,
        dst_stride,
        dst.as_mut_slice::<T>(),
        tmp_index,
    );
}

fn codelet(name: &'static str, mode: AccessMode) -> Codelet {
    let mut codelet = Codelet::new(name, [AccessMode::Read, mode, AccessMode::Scratch]);
    for dtype in [DataType::F16, DataType::F32, DataType::F64, DataType::I64] {
        codelet = codelet
            .with_cpu(dtype, dispatch(dtype))
            .with_accel(dtype, dispatch(dtype));
    }
    codelet
}

fn dispatch(dtype: DataType) -> crate::runtime::KernelFn {
    match dtype {
        DataType::F16 => wrapper::<f16>,
        DataType::F32 => wrapper::<f32>,
        DataType::F64 => wrapper::<f64>,
        DataType::I64 => wrapper::<i64>,
    }
}

pub(crate) fn codelets() -> [Codelet; 3] {
    [
        codelet(NAME_W, AccessMode::Write),
        codelet(NAME_RW, AccessMode::ReadWrite),
        codelet(NAME_RW_COMMUTE, AccessMode::Commute),
    ]
}

/// Copies a hyper-rectangle between two strided buffers. The scratch handle
/// sizes the per-task index counters; its contents are never shared.
#[allow(clippy::too_many_arguments)]
pub fn submit<T: Scalar>(
    rt: &Runtime,
    src_start: &[usize],
    src_stride: &[usize],
    copy_shape: &[usize],
    dst_start: &[usize],
    dst_stride: &[usize],
    src: Handle,
    dst: Handle,
    scratch: Handle,
    mode: AccessMode,
    node: usize,
) -> Result<(), RuntimeError> {
    let name = match mode {
        AccessMode::Write => NAME_W,
        AccessMode::ReadWrite => NAME_RW,
        AccessMode::Commute => NAME_RW_COMMUTE,
        _ => {
            return Err(RuntimeError::Mode {
                name: NAME_W.into(),
                slot: 1,
                found: mode,
            });
        }
    };
    let ndim = copy_shape.len();
    let mut words: Vec<u64> = Vec::with_capacity(1 + 5 * ndim);
    words.push(ndim as u64);
    for part in [src_start, src_stride, copy_shape, dst_start, dst_stride] {
        words.extend(part.iter().map(|&x| x as u64));
    }
    let accesses = vec![
        (src, AccessMode::Read),
        (dst, mode),
        (scratch, AccessMode::Scratch),
    ];
    rt.submit(name, T::DATA_TYPE, bytemuck::cast_slice(&words), accesses, node)
}
