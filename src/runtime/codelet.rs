use std::sync::atomic::{AtomicU32, Ordering};

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::num::{DataType, Scalar};

/// Declared intent of a task on one of its buffers. Dependency edges between
/// tasks are inferred from these alone; there is no manual locking and no way
/// to change a mode after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum AccessMode {
    /// Concurrent read. Never serializes against other reads.
    Read,
    /// Exclusive write. Prior contents are not guaranteed to the task.
    Write,
    /// Exclusive read-write.
    ReadWrite,
    /// Read-write whose writers may be reordered among themselves, but still
    /// serialize against plain reads and exclusive accesses.
    Commute,
    /// Associative accumulation. Contributing tasks never serialize against
    /// each other.
    Redux,
    /// Per-task temporary storage. Never tracked for dependencies.
    Scratch,
}

impl AccessMode {
    pub const fn writes(self) -> bool {
        matches!(
            self,
            AccessMode::Write | AccessMode::ReadWrite | AccessMode::Commute | AccessMode::Redux
        )
    }

    pub const fn reads(self) -> bool {
        matches!(
            self,
            AccessMode::Read | AccessMode::ReadWrite | AccessMode::Commute | AccessMode::Redux
        )
    }

    /// Whether a mode supplied at submission satisfies this declared slot.
    /// A write-family slot accepts any write-family mode, so a codelet's
    /// destination can be tightened to `Write` or relaxed to `Commute` or
    /// `Redux` per call site; `Read` and `Scratch` slots are exact.
    pub const fn accepts(self, mode: Self) -> bool {
        match self {
            AccessMode::Read => matches!(mode, AccessMode::Read),
            AccessMode::Scratch => matches!(mode, AccessMode::Scratch),
            _ => mode.writes(),
        }
    }

    /// Scheduling class; `None` for scratch accesses, which never produce
    /// edges.
    pub(crate) const fn class(self) -> Option<AccessClass> {
        match self {
            AccessMode::Read => Some(AccessClass::Read),
            AccessMode::Commute => Some(AccessClass::Commute),
            AccessMode::Redux => Some(AccessClass::Redux),
            AccessMode::Write | AccessMode::ReadWrite => Some(AccessClass::Exclusive),
            AccessMode::Scratch => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessClass {
    Read,
    Exclusive,
    Commute,
    Redux,
}

impl AccessClass {
    /// Accesses of a concurrent class may share a scheduling generation.
    pub(crate) const fn concurrent(self) -> bool {
        !matches!(self, AccessClass::Exclusive)
    }
}

/// Bit mask of execution backends a codelet is allowed to run on. The mask is
/// process-wide configuration, toggled by explicit `restrict_where` and
/// `restore_where` calls, never per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Where(pub(crate) u32);

impl Where {
    pub const CPU: Self = Self(1);
    pub const ACCEL: Self = Self(1 << 1);
    pub const ANY: Self = Self(u32::MAX);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Where {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Raw view of one buffer as handed to a kernel wrapper. Read slots hand out
/// shared views; writing through one is a defect, not a runtime condition.
pub enum BufferView<'a> {
    Borrowed(&'a [u8]),
    BorrowedMut(&'a mut [u8]),
}

impl BufferView<'_> {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        match self {
            BufferView::Borrowed(data) => data,
            BufferView::BorrowedMut(data) => data,
        }
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            BufferView::BorrowedMut(data) => data,
            BufferView::Borrowed(_) => unreachable!("write access through a read-only view"),
        }
    }

    #[inline]
    pub fn as_slice<T: Scalar>(&self) -> &[T] {
        bytemuck::cast_slice(self.bytes())
    }

    #[inline]
    pub fn as_mut_slice<T: Scalar>(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(self.bytes_mut())
    }
}

/// A kernel wrapper: unpacks scalar arguments and calls into a pure kernel.
/// Must not allocate, synchronize, or fail.
pub type KernelFn = fn(&mut [BufferView<'_>], &[u8]);

/// Maps packed arguments to a scheduling hint.
pub type FootprintFn = fn(&[u8]) -> u32;

/// A named operation descriptor: one function table per backend keyed by
/// element type, a declared access-mode contract, and an optional footprint.
pub struct Codelet {
    name: &'static str,
    modes: Vec<AccessMode>,
    cpu: HashMap<DataType, KernelFn>,
    accel: HashMap<DataType, KernelFn>,
    footprint: Option<FootprintFn>,
    where_mask: AtomicU32,
}

impl std::fmt::Debug for Codelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codelet")
            .field("name", &self.name)
            .field("modes", &self.modes)
            .finish_non_exhaustive()
    }
}

impl Codelet {
    pub fn new(name: &'static str, modes: impl Into<Vec<AccessMode>>) -> Self {
        Self {
            name,
            modes: modes.into(),
            cpu: HashMap::default(),
            accel: HashMap::default(),
            footprint: None,
            where_mask: AtomicU32::new(Where::ANY.0),
        }
    }

    pub fn with_cpu(mut self, dtype: DataType, f: KernelFn) -> Self {
        self.cpu.insert(dtype, f);
        self
    }

    pub fn with_accel(mut self, dtype: DataType, f: KernelFn) -> Self {
        self.accel.insert(dtype, f);
        self
    }

    pub fn with_footprint(mut self, f: FootprintFn) -> Self {
        self.footprint = Some(f);
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn modes(&self) -> &[AccessMode] {
        &self.modes
    }

    #[inline]
    pub fn cpu_fn(&self, dtype: DataType) -> Option<KernelFn> {
        self.cpu.get(&dtype).copied()
    }

    #[inline]
    pub fn accel_fn(&self, dtype: DataType) -> Option<KernelFn> {
        self.accel.get(&dtype).copied()
    }

    #[inline]
    pub fn footprint(&self, args: &[u8]) -> Option<u32> {
        self.footprint.map(|f| f(args))
    }

    /// Restricts execution to the given backends until `restore_where`.
    pub fn restrict_where(&self, mask: Where) {
        self.where_mask.store(mask.0, Ordering::Release);
    }

    /// Lifts any restriction installed by `restrict_where`.
    pub fn restore_where(&self) {
        self.where_mask.store(Where::ANY.0, Ordering::Release);
    }

    #[inline]
    pub fn where_mask(&self) -> Where {
        Where(self.where_mask.load(Ordering::Acquire))
    }
}

/// Default footprint: a hash of the packed argument bytes.
pub fn args_hash(args: &[u8]) -> u32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    args.hash(&mut hasher);
    hasher.finish() as u32
}
