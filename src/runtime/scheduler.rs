use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

use derive_more::{Deref, DerefMut, Display};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use tokio::sync::Semaphore;

use super::{
    codelet::{AccessClass, AccessMode, BufferView, KernelFn},
    handle::{Buffer, Handle, HandleId},
};

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref, DerefMut)]
pub(crate) struct TaskId(uid::Id<TaskId>);

impl TaskId {
    pub fn new() -> Self {
        Self(uid::Id::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    Cpu,
    Accel(usize),
}

#[derive(Debug)]
pub(crate) enum Action {
    /// Run a kernel wrapper against the resolved buffers.
    Kernel { kernel: KernelFn, args: Box<[u64]> },
    /// Materialize a valid copy of each accessed handle at the task's node.
    Transfer,
    /// Invalidate every cached copy of each accessed handle except the
    /// owner's.
    Flush,
}

/// An ephemeral submission record. Lives from submission until retirement.
#[derive(Debug)]
pub(crate) struct Task {
    pub id: TaskId,
    pub name: &'static str,
    pub backend: Backend,
    pub action: Action,
    pub accesses: Vec<(Handle, AccessMode)>,
    pub node: usize,
    pub footprint: Option<u32>,
}

pub(crate) enum Event {
    Submit(Task),
    Retire(TaskId),
    Drain(flume::Sender<()>),
}

struct TaskNode {
    unmet: usize,
    task: Option<Task>,
    successors: Vec<TaskId>,
    handles: Vec<HandleId>,
}

/// Per-handle scheduling state: the current generation of mutually compatible
/// accesses and the generation before it. A new compatible access joins the
/// current generation and depends on the previous one; an incompatible access
/// seals the current generation and depends on all of it.
struct HandleSeq {
    class: AccessClass,
    current: Vec<TaskId>,
    prev: Vec<TaskId>,
}

pub(crate) struct Scheduler {
    live: HashMap<TaskId, TaskNode>,
    sequences: HashMap<HandleId, HandleSeq>,
    drains: Vec<flume::Sender<()>>,
    events: flume::Sender<Event>,
    permits: Arc<Semaphore>,
    devices: Vec<flume::Sender<Task>>,
}

impl Scheduler {
    pub fn new(
        events: flume::Sender<Event>,
        workers: usize,
        devices: Vec<flume::Sender<Task>>,
    ) -> Self {
        Self {
            live: HashMap::default(),
            sequences: HashMap::default(),
            drains: Vec::new(),
            events,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            devices,
        }
    }

    fn admit(&mut self, task: Task) {
        let id = task.id;
        let mut deps: HashSet<TaskId> = HashSet::default();
        let mut handles = Vec::with_capacity(task.accesses.len());
        for (handle, mode) in &task.accesses {
            let Some(class) = mode.class() else { continue };
            handles.push(handle.id());
            match self.sequences.get_mut(&handle.id()) {
                None => {
                    let seq = HandleSeq {
                        class,
                        current: vec![id],
                        prev: Vec::new(),
                    };
                    self.sequences.insert(handle.id(), seq);
                }
                Some(seq) if seq.current.is_empty() => {
                    deps.extend(seq.prev.iter().copied());
                    seq.class = class;
                    seq.current.push(id);
                }
                Some(seq) if seq.class == class && class.concurrent() => {
                    deps.extend(seq.prev.iter().copied());
                    if !seq.current.contains(&id) {
                        seq.current.push(id);
                    }
                }
                Some(seq) => {
                    let sealed = std::mem::take(&mut seq.current);
                    deps.extend(sealed.iter().copied());
                    seq.prev = sealed;
                    seq.class = class;
                    seq.current.push(id);
                }
            }
        }
        deps.remove(&id);
        let deps: Vec<TaskId> = deps
            .into_iter()
            .filter(|dep| self.live.contains_key(dep))
            .collect();
        for dep in &deps {
            let node = self.live.get_mut(dep).expect("dependency not live");
            node.successors.push(id);
        }
        let unmet = deps.len();
        log::debug!("task {id} ({}) admitted, {unmet} unmet", task.name);
        let node = TaskNode {
            unmet,
            task: Some(task),
            successors: Vec::new(),
            handles,
        };
        self.live.insert(id, node);
        if unmet == 0 {
            self.dispatch(id);
        }
    }

    fn retire(&mut self, id: TaskId) {
        let Some(node) = self.live.remove(&id) else {
            log::error!("retired task {id} is not live");
            return;
        };
        // a fully retired generation implies its predecessor retired too, so
        // pruning never loses an edge
        for handle in node.handles {
            if let Some(seq) = self.sequences.get_mut(&handle) {
                seq.current.retain(|task| *task != id);
                seq.prev.retain(|task| *task != id);
                if seq.current.is_empty() && seq.prev.is_empty() {
                    self.sequences.remove(&handle);
                }
            }
        }
        for succ in node.successors {
            if let Some(node) = self.live.get_mut(&succ) {
                node.unmet -= 1;
                if node.unmet == 0 {
                    self.dispatch(succ);
                }
            }
        }
        log::debug!("task {id} retired");
        if self.live.is_empty() {
            for drain in self.drains.drain(..) {
                _ = drain.send(());
            }
        }
    }

    fn dispatch(&mut self, id: TaskId) {
        let Some(node) = self.live.get_mut(&id) else {
            return;
        };
        let Some(task) = node.task.take() else {
            return;
        };
        match task.backend {
            Backend::Accel(index) => {
                log::debug!("task {id} ({}) dispatched to device {index}", task.name);
                _ = self.devices[index].send(task);
            }
            Backend::Cpu => {
                log::debug!("task {id} ({}) dispatched to the worker pool", task.name);
                let events = self.events.clone();
                let permits = self.permits.clone();
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.expect("semaphore closed");
                    let task = tokio::task::spawn_blocking(move || {
                        execute(&task, None);
                        task
                    })
                    .await
                    .expect("worker panicked");
                    for (handle, _) in &task.accesses {
                        handle.untrack();
                    }
                    _ = events.send_async(Event::Retire(task.id)).await;
                });
            }
        }
    }
}

pub(crate) async fn serve(mut scheduler: Scheduler, receiver: flume::Receiver<Event>) {
    while let Ok(event) = receiver.recv_async().await {
        match event {
            Event::Submit(task) => scheduler.admit(task),
            Event::Retire(id) => scheduler.retire(id),
            Event::Drain(sender) => match scheduler.live.is_empty() {
                true => _ = sender.send(()),
                false => scheduler.drains.push(sender),
            },
        }
    }
}

/// One sequential queue per accelerator device.
pub(crate) async fn serve_device(
    index: usize,
    receiver: flume::Receiver<Task>,
    events: flume::Sender<Event>,
) {
    while let Ok(task) = receiver.recv_async().await {
        let task = tokio::task::spawn_blocking(move || {
            execute(&task, Some(index));
            task
        })
        .await
        .expect("device worker panicked");
        for (handle, _) in &task.accesses {
            handle.untrack();
        }
        _ = events.send_async(Event::Retire(task.id)).await;
    }
}

enum Slot {
    Shared(Buffer, usize),
    Scratch(Vec<u64>, usize),
}

enum Guard<'a> {
    Read(RwLockReadGuard<'a, Vec<u64>>, usize),
    Write(RwLockWriteGuard<'a, Vec<u64>>, usize),
    Local(&'a mut Vec<u64>, usize),
}

impl Guard<'_> {
    fn size(&self) -> usize {
        match self {
            Guard::Read(_, size) | Guard::Write(_, size) | Guard::Local(_, size) => *size,
        }
    }

    fn view(&mut self) -> BufferView<'_> {
        match self {
            Guard::Read(guard, size) => {
                BufferView::Borrowed(&bytemuck::cast_slice::<u64, u8>(&guard[..])[..*size])
            }
            Guard::Write(guard, size) => {
                BufferView::BorrowedMut(&mut bytemuck::cast_slice_mut::<u64, u8>(&mut guard[..])[..*size])
            }
            Guard::Local(data, size) => {
                BufferView::BorrowedMut(&mut bytemuck::cast_slice_mut::<u64, u8>(&mut data[..])[..*size])
            }
        }
    }
}

fn execute(task: &Task, device: Option<usize>) {
    match &task.action {
        Action::Flush => {
            for (handle, _) in &task.accesses {
                handle.residency().flush();
            }
        }
        Action::Transfer => {
            for (handle, mode) in &task.accesses {
                if let Err(err) = handle.resolve(task.node, *mode) {
                    log::error!("transfer of {} to node {}: {err}", handle.id(), task.node);
                }
            }
        }
        Action::Kernel { kernel, args } => execute_kernel(task, *kernel, args, device),
    }
}

fn execute_kernel(task: &Task, kernel: KernelFn, args: &[u64], device: Option<usize>) {
    let mut slots = Vec::with_capacity(task.accesses.len());
    for (index, (handle, mode)) in task.accesses.iter().enumerate() {
        let slot = match mode {
            AccessMode::Scratch => {
                Slot::Scratch(vec![0_u64; handle.size().div_ceil(8)], handle.size())
            }
            _ => match handle.resolve(task.node, *mode) {
                Ok(buffer) => Slot::Shared(buffer, handle.size()),
                Err(err) => {
                    log::error!("task {} cannot resolve {}: {err}", task.id, handle.id());
                    return;
                }
            },
        };
        slots.push((index, *mode, slot));
    }
    // locks are taken in address order so that tasks without ordering edges
    // (commute, redux) cannot cycle on shared buffers
    slots.sort_by_key(|(_, _, slot)| match slot {
        Slot::Shared(buffer, _) => Arc::as_ptr(buffer) as usize,
        Slot::Scratch(..) => usize::MAX,
    });
    let mut guards: Vec<(usize, AccessMode, Guard)> = slots
        .iter_mut()
        .map(|(index, mode, slot)| {
            let guard = match slot {
                Slot::Shared(buffer, size) => match mode.writes() {
                    true => Guard::Write(buffer.write().expect("failed to lock"), *size),
                    false => Guard::Read(buffer.read().expect("failed to lock"), *size),
                },
                Slot::Scratch(data, size) => Guard::Local(data, *size),
            };
            (*index, *mode, guard)
        })
        .collect();
    guards.sort_by_key(|(index, _, _)| *index);

    let args = bytemuck::cast_slice::<u64, u8>(args);
    match device {
        None => {
            let mut views: Vec<BufferView> =
                guards.iter_mut().map(|(_, _, guard)| guard.view()).collect();
            kernel(&mut views, args);
        }
        Some(index) => {
            // stage host copies into the device arena, execute there, then
            // copy written buffers back to host memory
            log::debug!("task {} staged through device {index}", task.id);
            let mut staged: Vec<Vec<u64>> = guards
                .iter_mut()
                .map(|(_, _, guard)| {
                    let size = guard.size();
                    let mut words = vec![0_u64; size.div_ceil(8)];
                    bytemuck::cast_slice_mut(&mut words)[..size]
                        .copy_from_slice(guard.view().bytes());
                    words
                })
                .collect();
            let mut views: Vec<BufferView> = staged
                .iter_mut()
                .zip(guards.iter())
                .map(|(words, (_, mode, guard))| {
                    let bytes = &mut bytemuck::cast_slice_mut(&mut words[..])[..guard.size()];
                    match mode.writes() || matches!(mode, AccessMode::Scratch) {
                        true => BufferView::BorrowedMut(bytes),
                        false => BufferView::Borrowed(bytes),
                    }
                })
                .collect();
            kernel(&mut views, args);
            drop(views);
            for ((_, mode, guard), words) in guards.iter_mut().zip(staged.iter()) {
                if mode.writes() {
                    let size = guard.size();
                    guard
                        .view()
                        .bytes_mut()
                        .copy_from_slice(&bytemuck::cast_slice(&words[..])[..size]);
                }
            }
        }
    }
    drop(guards);
    for (handle, mode) in &task.accesses {
        if mode.writes() {
            handle.residency().commit_write(task.node);
        }
    }
}
