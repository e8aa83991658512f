use std::sync::{
    Arc, Mutex, MutexGuard, RwLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use derive_more::{Deref, DerefMut, Display};
use rustc_hash::FxHashMap as HashMap;

use super::{codelet::AccessMode, error::RuntimeError};

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref, DerefMut)]
pub struct HandleId(uid::Id<HandleId>);

/// Backing storage of one copy. Kept in 8-byte words so that typed views of
/// any supported element type are properly aligned.
pub(crate) type Buffer = Arc<RwLock<Vec<u64>>>;

fn buffer(size: usize, bytes: Option<&[u8]>) -> Buffer {
    let mut words = vec![0_u64; size.div_ceil(8)];
    if let Some(bytes) = bytes {
        bytemuck::cast_slice_mut(&mut words)[..size].copy_from_slice(bytes);
    }
    Arc::new(RwLock::new(words))
}

#[derive(Debug, Clone)]
struct CopySlot {
    data: Buffer,
    valid: bool,
}

/// Where a handle's value currently lives: one logical owner node plus any
/// number of cached copies. A cached copy stays nominally valid after the
/// owner is rewritten until the handle is flushed, which is exactly the
/// stale-cache window the flush call exists to close.
#[derive(Debug)]
pub(crate) struct Residency {
    owner: usize,
    copies: HashMap<usize, CopySlot>,
}

impl Residency {
    /// Marks the copy at `node` as the authoritative value after a write.
    pub fn commit_write(&mut self, node: usize) {
        if let Some(slot) = self.copies.get_mut(&node) {
            slot.valid = true;
        }
        self.owner = node;
    }

    /// Invalidates every cached copy except the owner's.
    pub fn flush(&mut self) {
        let owner = self.owner;
        for (&node, slot) in self.copies.iter_mut() {
            if node != owner {
                slot.valid = false;
            }
        }
    }
}

#[derive(Debug)]
struct HandleState {
    id: HandleId,
    size: usize,
    residency: Mutex<Residency>,
    pending: AtomicUsize,
    released: AtomicBool,
}

/// A reference to one contiguous, runtime-managed memory region. Cloning is
/// cheap and shares the underlying state; the handle stays alive while any
/// pending task references it.
#[derive(Debug, Clone)]
pub struct Handle(Arc<HandleState>);

impl Handle {
    pub(crate) fn register(node: usize, size: usize, bytes: Option<&[u8]>) -> Self {
        let id = HandleId(uid::Id::new());
        let copies = [(
            node,
            CopySlot {
                data: buffer(size, bytes),
                valid: true,
            },
        )]
        .into_iter()
        .collect();
        let residency = Mutex::new(Residency {
            owner: node,
            copies,
        });
        Self(Arc::new(HandleState {
            id,
            size,
            residency,
            pending: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }))
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.0.id
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.0.size
    }

    /// The node currently owning the authoritative value.
    pub fn owner(&self) -> usize {
        self.residency().owner
    }

    /// Number of submitted tasks that have not yet retired.
    #[inline]
    pub fn pending(&self) -> usize {
        self.0.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.0.released.load(Ordering::Acquire)
    }

    /// Invalidates all copies. Only legal once no task holds the handle;
    /// submitting against a released handle is a usage error.
    pub fn release(&self) -> Result<(), RuntimeError> {
        let pending = self.pending();
        if pending > 0 {
            return Err(RuntimeError::Busy(self.id(), pending));
        }
        if self.0.released.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::Released(self.id()));
        }
        self.residency().copies.clear();
        Ok(())
    }

    pub(crate) fn track(&self) {
        self.0.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn untrack(&self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn residency(&self) -> MutexGuard<'_, Residency> {
        self.0.residency.lock().expect("failed to lock")
    }

    /// Buffer backing this handle at `node`, fetching a copy of the owner's
    /// value on demand when a read access finds no valid local copy. The
    /// source bytes are cloned outside the residency lock so that an
    /// executing writer never deadlocks against a concurrent fetch.
    pub(crate) fn resolve(&self, node: usize, mode: AccessMode) -> Result<Buffer, RuntimeError> {
        {
            let mut residency = self.residency();
            match residency.copies.get(&node) {
                Some(slot) if slot.valid || !mode.reads() => return Ok(slot.data.clone()),
                Some(_) => {}
                None if !mode.reads() => {
                    let slot = CopySlot {
                        data: buffer(self.size(), None),
                        valid: false,
                    };
                    let data = slot.data.clone();
                    residency.copies.insert(node, slot);
                    return Ok(data);
                }
                None => {}
            }
        }
        let source = {
            let residency = self.residency();
            let owner = residency.owner;
            residency
                .copies
                .get(&owner)
                .filter(|slot| slot.valid)
                .map(|slot| slot.data.clone())
                .ok_or(RuntimeError::Transfer(self.id()))?
        };
        let words = source.read().expect("failed to lock").clone();
        let mut residency = self.residency();
        log::debug!("fetch {} to node {node} from node {}", self.id(), residency.owner);
        match residency.copies.get_mut(&node) {
            // a concurrent fetch may have landed first; keep it
            Some(slot) if slot.valid => Ok(slot.data.clone()),
            Some(slot) => {
                *slot.data.write().expect("failed to lock") = words;
                slot.valid = true;
                Ok(slot.data.clone())
            }
            None => {
                let slot = CopySlot {
                    data: Arc::new(RwLock::new(words)),
                    valid: true,
                };
                let data = slot.data.clone();
                residency.copies.insert(node, slot);
                Ok(data)
            }
        }
    }
}
