//! Handle-level operation wrappers: one module per operation, each defining
//! its codelet (access-mode contract plus per-type dispatch tables) and a
//! `submit` function that packs scalar arguments by value and enqueues one
//! task. The accelerator tables reuse the host kernels; the device queue
//! stages buffers through its arena around each task, so both backends
//! produce bitwise-identical results.

use crate::runtime::Registry;

pub mod accumulate;
pub mod add;
pub mod add_slice;
pub mod clear;
pub mod copy;
pub mod fill;
pub mod fp16_to_fp32;
pub mod gelu;
pub mod scal;
pub mod subcopy;
pub mod sum_slice;

/// Registers every built-in codelet into a fresh registry.
pub(crate) fn register_all(registry: &mut Registry) {
    registry.insert(accumulate::codelet());
    registry.insert(add::codelet());
    registry.insert(add_slice::codelet());
    registry.insert(clear::codelet());
    registry.insert(copy::codelet());
    registry.insert(fill::codelet());
    registry.insert(fp16_to_fp32::codelet());
    registry.insert(gelu::codelet());
    registry.insert(scal::codelet());
    for codelet in subcopy::codelets() {
        registry.insert(codelet);
    }
    registry.insert(sum_slice::codelet());
}
