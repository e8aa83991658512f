//! Pure compute kernels: plain functions over raw slices, shape/stride
//! metadata, and unpacked scalar parameters. Kernels never allocate, never
//! synchronize, and have no failure path; they operate on pre-validated
//! inputs and are selected by element type tag at submission time.

pub mod add;
pub mod add_slice;
pub mod clear;
pub mod fill;
pub mod fp16_to_fp32;
pub mod gelu;
pub mod scal;
pub mod subcopy;
pub mod sum_slice;
