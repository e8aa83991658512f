//! The task runtime: buffer handles with per-node residency, codelets with
//! per-backend dispatch tables, and a scheduler that infers dependency edges
//! from declared access modes alone.
//!
//! Submission never blocks; the only blocking points are [`Runtime::wait_for_all`]
//! and the logical ordering of [`Runtime::transfer`] against later work on the
//! same handle. Tasks run to completion once started; there is no cancellation.

use std::sync::Arc;

use itertools::Itertools;

use crate::num::{DataType, Scalar};

pub use codelet::{AccessMode, BufferView, Codelet, FootprintFn, KernelFn, Where, args_hash};
pub use error::RuntimeError;
pub use handle::{Handle, HandleId};
pub use registry::Registry;

use scheduler::{Action, Backend, Event, Task, TaskId};

pub mod codelet;
pub mod error;
pub mod handle;
pub mod registry;
pub(crate) mod scheduler;

/// The process-wide execution context: a codelet registry, a scheduler event
/// loop, a fixed CPU worker pool, one queue per accelerator device, and a
/// group of logical nodes among which buffer copies move.
#[derive(Debug, Clone)]
pub struct Runtime {
    registry: Arc<Registry>,
    events: flume::Sender<Event>,
    nodes: usize,
    rank: usize,
    devices: usize,
}

#[derive(Debug)]
pub struct RuntimeBuilder {
    pub workers: usize,
    pub devices: usize,
    pub nodes: usize,
    pub rank: usize,
    registry: Registry,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|workers| workers.get())
            .unwrap_or(4);
        let mut registry = Registry::new();
        crate::ops::register_all(&mut registry);
        Self {
            workers,
            devices: 0,
            nodes: 1,
            rank: 0,
            registry,
        }
    }

    /// Size of the CPU worker pool.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Number of accelerator devices, each with its own sequential queue.
    pub fn devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }

    /// Number of logical nodes in the process group.
    pub fn nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes.max(1);
        self
    }

    /// Rank reported by [`Runtime::local_rank`].
    pub fn rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Registers an extra codelet beside the built-in operations.
    pub fn codelet(mut self, codelet: Codelet) -> Self {
        self.registry.insert(codelet);
        self
    }

    pub async fn build(self) -> Runtime {
        let (events, receiver) = flume::unbounded();
        let devices = (0..self.devices)
            .map(|index| {
                let (sender, receiver) = flume::unbounded();
                tokio::spawn(scheduler::serve_device(index, receiver, events.clone()));
                sender
            })
            .collect();
        let scheduler = scheduler::Scheduler::new(events.clone(), self.workers, devices);
        tokio::spawn(scheduler::serve(scheduler, receiver));
        let nodes = self.nodes.max(1);
        Runtime {
            registry: Arc::new(self.registry),
            events,
            nodes,
            rank: self.rank.min(nodes - 1),
            devices: self.devices,
        }
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn codelet(&self, name: &str) -> Result<Arc<Codelet>, RuntimeError> {
        self.registry
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownCodelet(name.into()))
    }

    /// Number of logical nodes in the process group.
    #[inline]
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Number of accelerator devices.
    #[inline]
    pub fn devices(&self) -> usize {
        self.devices
    }

    /// Rank of the calling process within the group.
    #[inline]
    pub fn local_rank(&self) -> usize {
        self.rank
    }

    /// Registers a raw buffer as a handle whose initial valid copy lives at
    /// `node`. This is the bring-up entry point: it bypasses the tensor and
    /// tile layers entirely.
    pub fn register(&self, node: usize, bytes: &[u8]) -> Result<Handle, RuntimeError> {
        if node >= self.nodes {
            return Err(RuntimeError::Node(node, self.nodes));
        }
        Ok(Handle::register(node, bytes.len(), Some(bytes)))
    }

    /// Registers a zero-initialized handle of `size` bytes at `node`.
    pub fn register_zeroed(&self, node: usize, size: usize) -> Result<Handle, RuntimeError> {
        if node >= self.nodes {
            return Err(RuntimeError::Node(node, self.nodes));
        }
        Ok(Handle::register(node, size, None))
    }

    /// Submits one task: a codelet bound to handles with access modes, plus
    /// packed scalar arguments. All validation happens here, synchronously;
    /// the call returns as soon as the task is enqueued and never blocks.
    pub fn submit(
        &self,
        name: &str,
        dtype: DataType,
        args: &[u8],
        accesses: Vec<(Handle, AccessMode)>,
        node: usize,
    ) -> Result<(), RuntimeError> {
        let codelet = self.codelet(name)?;
        if node >= self.nodes {
            return Err(RuntimeError::Node(node, self.nodes));
        }
        let modes = codelet.modes();
        if modes.len() != accesses.len() {
            return Err(RuntimeError::BufferCount {
                name: name.into(),
                expect: modes.len(),
                found: accesses.len(),
            });
        }
        for (slot, ((handle, mode), declared)) in accesses.iter().zip(modes).enumerate() {
            if !declared.accepts(*mode) {
                return Err(RuntimeError::Mode {
                    name: name.into(),
                    slot,
                    found: *mode,
                });
            }
            if handle.is_released() {
                return Err(RuntimeError::Released(handle.id()));
            }
        }
        // a handle may be bound twice only when both accesses are plain reads
        for ((x, xm), (y, ym)) in accesses.iter().tuple_combinations() {
            let reads = matches!(xm, AccessMode::Read) && matches!(ym, AccessMode::Read);
            if x.id() == y.id() && !reads {
                return Err(RuntimeError::Aliased(x.id()));
            }
        }
        let mask = codelet.where_mask();
        let accel = self.devices > 0
            && mask.contains(Where::ACCEL)
            && codelet.accel_fn(dtype).is_some();
        let cpu = mask.contains(Where::CPU) && codelet.cpu_fn(dtype).is_some();
        let footprint = codelet.footprint(args);
        let (backend, kernel) = if accel {
            let index = footprint.unwrap_or(0) as usize % self.devices;
            let kernel = codelet.accel_fn(dtype).expect("accel implementation");
            (Backend::Accel(index), kernel)
        } else if cpu {
            let kernel = codelet.cpu_fn(dtype).expect("cpu implementation");
            (Backend::Cpu, kernel)
        } else {
            return Err(RuntimeError::Unsupported {
                name: name.into(),
                dtype,
            });
        };
        assert!(args.len() % 8 == 0, "packed arguments must be 8-byte words");
        let args = bytemuck::pod_collect_to_vec::<u8, u64>(args).into_boxed_slice();
        for (handle, _) in &accesses {
            handle.track();
        }
        let task = Task {
            id: TaskId::new(),
            name: codelet.name(),
            backend,
            action: Action::Kernel { kernel, args },
            accesses,
            node,
            footprint,
        };
        self.send(task)
    }

    /// Copies the handle's current value to `dst` unless a valid copy is
    /// already resident there. The copy is ordered after previously submitted
    /// writers and before anything submitted later against the same handle,
    /// while running asynchronously relative to unrelated work.
    pub fn transfer(&self, handle: &Handle, dst: usize) -> Result<(), RuntimeError> {
        if dst >= self.nodes {
            return Err(RuntimeError::Node(dst, self.nodes));
        }
        if handle.is_released() {
            return Err(RuntimeError::Released(handle.id()));
        }
        handle.track();
        let task = Task {
            id: TaskId::new(),
            name: "tessera_transfer",
            backend: Backend::Cpu,
            action: Action::Transfer,
            accesses: vec![(handle.clone(), AccessMode::Read)],
            node: dst,
            footprint: None,
        };
        self.send(task)
    }

    /// Invalidates stale cached copies on other nodes after a write, so the
    /// next read anywhere re-fetches the latest value from the owner.
    pub fn flush(&self, handle: &Handle) -> Result<(), RuntimeError> {
        if handle.is_released() {
            return Err(RuntimeError::Released(handle.id()));
        }
        handle.track();
        let task = Task {
            id: TaskId::new(),
            name: "tessera_flush",
            backend: Backend::Cpu,
            action: Action::Flush,
            accesses: vec![(handle.clone(), AccessMode::Read)],
            node: handle.owner(),
            footprint: None,
        };
        self.send(task)
    }

    /// Waits for the whole task graph to drain, transfers and flushes
    /// included.
    pub async fn wait_for_all(&self) {
        let (sender, receiver) = flume::bounded(1);
        if self.events.send(Event::Drain(sender)).is_err() {
            return;
        }
        _ = receiver.recv_async().await;
    }

    /// Reads the handle's value as seen from `node`, fetching a copy from the
    /// owner when none is cached there. Intended for bring-up and tests after
    /// a drain; it does not wait for pending tasks.
    pub fn acquire<T: Scalar>(&self, handle: &Handle, node: usize) -> Result<Vec<T>, RuntimeError> {
        if node >= self.nodes {
            return Err(RuntimeError::Node(node, self.nodes));
        }
        if handle.is_released() {
            return Err(RuntimeError::Released(handle.id()));
        }
        let buffer = handle.resolve(node, AccessMode::Read)?;
        let guard = buffer.read().expect("failed to lock");
        let bytes = &bytemuck::cast_slice::<u64, u8>(&guard[..])[..handle.size()];
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    /// Overwrites the handle's value at `node`, which becomes the owner.
    /// Bring-up counterpart of [`Runtime::acquire`]; the handle must have no
    /// pending tasks.
    pub fn write<T: Scalar>(
        &self,
        handle: &Handle,
        node: usize,
        data: &[T],
    ) -> Result<(), RuntimeError> {
        if node >= self.nodes {
            return Err(RuntimeError::Node(node, self.nodes));
        }
        if handle.is_released() {
            return Err(RuntimeError::Released(handle.id()));
        }
        let pending = handle.pending();
        if pending > 0 {
            return Err(RuntimeError::Busy(handle.id(), pending));
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != handle.size() {
            return Err(RuntimeError::Size {
                expect: handle.size(),
                found: bytes.len(),
            });
        }
        let buffer = handle.resolve(node, AccessMode::Write)?;
        {
            let mut guard = buffer.write().expect("failed to lock");
            bytemuck::cast_slice_mut::<u64, u8>(&mut guard[..])[..handle.size()]
                .copy_from_slice(bytes);
        }
        handle.residency().commit_write(node);
        Ok(())
    }

    fn send(&self, task: Task) -> Result<(), RuntimeError> {
        match self.events.send(Event::Submit(task)) {
            Ok(()) => Ok(()),
            Err(flume::SendError(event)) => {
                if let Event::Submit(task) = event {
                    for (handle, _) in &task.accesses {
                        handle.untrack();
                    }
                }
                Err(RuntimeError::QueueClosed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[tokio::test]
    async fn test_transfer_flush() {
        let rt = Runtime::builder().nodes(3).workers(2).build().await;
        let data = vec![0.0_f32; 64];
        let handle = rt.register(0, bytemuck::cast_slice(&data)).unwrap();

        // write on node 0, then read the transferred value on node 1
        ops::fill::submit::<f32>(&rt, 64, 2.5, handle.clone(), 0).unwrap();
        rt.transfer(&handle, 1).unwrap();
        rt.wait_for_all().await;
        let read: Vec<f32> = rt.acquire(&handle, 1).unwrap();
        assert!(read.iter().all(|&x| x == 2.5));

        // node 2 caches a copy, then the owner is rewritten
        rt.transfer(&handle, 2).unwrap();
        rt.wait_for_all().await;
        ops::fill::submit::<f32>(&rt, 64, -1.0, handle.clone(), 0).unwrap();
        rt.wait_for_all().await;

        // the stale cache is served until a flush invalidates it
        let stale: Vec<f32> = rt.acquire(&handle, 2).unwrap();
        assert!(stale.iter().all(|&x| x == 2.5));
        rt.flush(&handle).unwrap();
        rt.wait_for_all().await;
        let fresh: Vec<f32> = rt.acquire(&handle, 2).unwrap();
        assert!(fresh.iter().all(|&x| x == -1.0));
    }

    #[tokio::test]
    async fn test_release() {
        let rt = Runtime::builder().build().await;
        let handle = rt.register_zeroed(0, 256).unwrap();
        ops::clear::submit(&rt, crate::num::DataType::F32, handle.clone(), 0).unwrap();
        rt.wait_for_all().await;
        handle.release().unwrap();

        let err = ops::clear::submit(&rt, crate::num::DataType::F32, handle.clone(), 0);
        assert!(matches!(err, Err(RuntimeError::Released(_))));
        assert!(matches!(handle.release(), Err(RuntimeError::Released(_))));
    }

    #[tokio::test]
    async fn test_submit_checks() {
        let rt = Runtime::builder().nodes(2).build().await;
        let handle = rt.register_zeroed(0, 64).unwrap();

        let err = rt.submit(
            "tessera_missing",
            crate::num::DataType::F32,
            &[],
            vec![(handle.clone(), AccessMode::Write)],
            0,
        );
        assert!(matches!(err, Err(RuntimeError::UnknownCodelet(_))));

        let err = ops::fill::submit::<f32>(&rt, 16, 0.0, handle.clone(), 5);
        assert!(matches!(err, Err(RuntimeError::Node(5, 2))));

        // an i64 fill has no registered implementation
        let err = rt.submit(
            ops::fill::NAME,
            crate::num::DataType::I64,
            &[0; 16],
            vec![(handle.clone(), AccessMode::Write)],
            0,
        );
        assert!(matches!(err, Err(RuntimeError::Unsupported { .. })));
    }
}
