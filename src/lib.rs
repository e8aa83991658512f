//! `tessera` is a task-based dataflow engine for tensor computation. Large
//! arrays are decomposed into a grid of fixed-size tiles, each backed by a
//! managed buffer handle, and every tile-level operation is submitted as an
//! asynchronous task whose execution order is derived from declared buffer
//! access modes rather than call order.
//!
//! ## Key Components
//! 1. **Data Model**:
//!    - [`tile::TileTraits`] describes one tile's shape and strides.
//!    - [`tensor::Grid`] maps tile multi-indices to linear ids and owners.
//!    - [`tensor::Tensor`] realizes a logical array as a grid of tiles.
//!
//! 2. **Task Runtime**:
//!    - [`runtime::Handle`] tracks per-node buffer copies and ownership.
//!    - [`runtime::Codelet`] dispatches operations per backend and type tag.
//!    - The scheduler infers dependency edges from access-mode conflicts;
//!      pure reads, commutative writes, and reductions never over-serialize.
//!
//! 3. **Placement**:
//!    - Owner-computes: each task runs on the node owning its destination.
//!    - Data moves between nodes only on demand and is cached until flushed.
//!
//! 4. **Kernels**:
//!    - [`kernel`] holds pure host functions over raw slices; the accelerator
//!      backend stages buffers through a device arena around each task.
//!
//! ## Design Principles
//! - **Asynchrony**: submission never blocks; draining is explicit.
//! - **Safety**: usage errors surface synchronously at the offending call.
//! - **Extensibility**: custom codelets register beside the built-in ones.

pub mod kernel;
pub mod num;
pub mod ops;
pub mod runtime;
pub mod tensor;
pub mod tile;
