//! Parallel execution of a plugin's indexed task.
//!
//! [`ThreadPoolDelegator::execute`] first offers the work to the host's
//! thread pool and falls back to a private pool when the host is absent or
//! refuses. Whatever the strategy, every index in `0..task_count` runs exactly
//! once and the call returns only after all of them finished.
//!
//! The task may be invoked from several threads at once; making it safe to
//! do so is the caller's responsibility (hence the `Sync` bound).

use crate::thread_check::audio_scope;
use arc_swap::ArcSwapOption;
use crossbeam::sync::WaitGroup;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Task counts at or below this run inline when the host does not take them.
pub const INLINE_THRESHOLD: u32 = 2;

/// The host side of thread-pool delegation.
pub trait HostThreadPool: Send + Sync {
    /// Ask the host to call [`ThreadPoolDelegator::exec`] for every index in
    /// `0..task_count` and return once all calls completed. `false` means the
    /// host did not run the tasks.
    fn request_exec(&self, task_count: u32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Zero tasks, nothing ran.
    Empty,
    /// Serially on the calling thread.
    Inline,
    Host,
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteReport {
    pub strategy: Strategy,
    /// Task invocations that panicked. Other indices still ran.
    pub panicked: u32,
}

type Task<'a> = &'a (dyn Fn(u32) + Sync);

fn run_guarded(task: Task<'_>, index: u32, panicked: &AtomicU32) {
    if catch_unwind(AssertUnwindSafe(|| task(index))).is_err() {
        panicked.fetch_add(1, Ordering::Relaxed);
    }
}

fn run_inline(task_count: u32, task: Task<'_>) -> ExecuteReport {
    let panicked = AtomicU32::new(0);
    for index in 0..task_count {
        run_guarded(task, index, &panicked);
    }
    ExecuteReport {
        strategy: Strategy::Inline,
        panicked: panicked.into_inner(),
    }
}

struct Published<'a> {
    task: Task<'a>,
    panicked: AtomicU32,
}

/// The task currently offered to the host, reachable from `exec` callbacks.
///
/// Lives outside any plugin lock so host callbacks issued while the plugin
/// is processing never block.
#[derive(Default)]
struct TaskSlot {
    current: AtomicPtr<()>,
    in_flight: AtomicUsize,
}

impl TaskSlot {
    fn publish<'s>(&'s self, published: &Published<'_>) -> Publication<'s> {
        self.current.store(
            published as *const Published<'_> as *mut (),
            Ordering::SeqCst,
        );
        Publication(self)
    }

    fn exec(&self, index: u32) -> bool {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let current = self.current.load(Ordering::SeqCst);
        let ran = if current.is_null() {
            false
        } else {
            // SAFETY: a non-null pointer is only observable between publish and
            // retract, and retract waits for in-flight calls before the
            // published value goes out of scope.
            let published = unsafe { &*(current as *const Published<'_>) };
            run_guarded(published.task, index, &published.panicked);
            true
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ran
    }

    fn retract(&self) {
        self.current.store(ptr::null_mut(), Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
        }
    }
}

struct Publication<'s>(&'s TaskSlot);

impl Drop for Publication<'_> {
    fn drop(&mut self) {
        self.0.retract();
    }
}

struct Batch<'a> {
    task: Task<'a>,
    next: AtomicU32,
    count: u32,
    panicked: AtomicU32,
}

impl Batch<'_> {
    fn drain(&self) {
        loop {
            let index = self.next.fetch_add(1, Ordering::Relaxed);
            if index >= self.count {
                break;
            }
            run_guarded(self.task, index, &self.panicked);
        }
    }
}

struct BatchPtr(*const Batch<'static>);

// SAFETY: the batch is only dereferenced while the submitting thread waits on
// the job's wait group, so it outlives every access.
unsafe impl Send for BatchPtr {}

struct Job {
    batch: BatchPtr,
    done: WaitGroup,
}

struct Workers {
    sender: Sender<Job>,
    handles: Vec<JoinHandle<()>>,
}

/// Private worker pool used when the host does not run the tasks.
///
/// Workers are spawned on first use and joined on drop. The calling thread
/// always takes part in draining, so `max_workers` counts it.
pub struct FallbackPool {
    max_workers: usize,
    workers: OnceLock<Workers>,
}

impl FallbackPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            workers: OnceLock::new(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Threads spawned so far.
    pub fn spawned(&self) -> usize {
        self.workers.get().map_or(0, |w| w.handles.len())
    }

    fn workers(&self) -> &Workers {
        self.workers.get_or_init(|| {
            let helpers = self.max_workers - 1;
            let (sender, receiver) = crossbeam_channel::bounded(helpers.max(1));
            let mut handles = Vec::with_capacity(helpers);
            for n in 0..helpers {
                let receiver: Receiver<Job> = receiver.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("plugbridge-worker-{}", n))
                    .spawn(move || worker_loop(receiver));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => warn!("Failed to spawn thread pool worker: {}", e),
                }
            }
            debug!(workers = handles.len(), "Fallback thread pool started");
            Workers { sender, handles }
        })
    }

    /// Drain `0..task_count` across up to `max_workers` threads.
    fn run(&self, task_count: u32, task: Task<'_>) -> ExecuteReport {
        let helpers = (task_count as usize).min(self.max_workers) - 1;
        if helpers == 0 {
            return run_inline(task_count, task);
        }

        let batch = Batch {
            task,
            next: AtomicU32::new(0),
            count: task_count,
            panicked: AtomicU32::new(0),
        };
        let done = WaitGroup::new();
        let workers = self.workers();
        let helpers = helpers.min(workers.handles.len());
        for _ in 0..helpers {
            let job = Job {
                batch: BatchPtr(&batch as *const Batch<'_> as *const Batch<'static>),
                done: done.clone(),
            };
            // A full queue means the workers are busy with another batch; the
            // caller drains the rest itself.
            if workers.sender.try_send(job).is_err() {
                break;
            }
        }

        batch.drain();
        done.wait();

        ExecuteReport {
            strategy: Strategy::Pool,
            panicked: batch.panicked.into_inner(),
        }
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    for job in receiver.iter() {
        let _scope = audio_scope();
        // SAFETY: see `BatchPtr`.
        let batch = unsafe { &*job.batch.0 };
        batch.drain();
        drop(job.done);
    }
}

impl Drop for FallbackPool {
    fn drop(&mut self) {
        if let Some(Workers { sender, handles }) = self.workers.take() {
            drop(sender);
            for handle in handles {
                if handle.join().is_err() {
                    warn!("Thread pool worker panicked during shutdown");
                }
            }
        }
    }
}

impl std::fmt::Debug for FallbackPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackPool")
            .field("max_workers", &self.max_workers)
            .field("spawned", &self.spawned())
            .finish()
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-instance executor choosing between the host pool and the fallback pool.
pub struct ThreadPoolDelegator {
    host: ArcSwapOption<Box<dyn HostThreadPool>>,
    pool: Arc<FallbackPool>,
    slot: TaskSlot,
    busy: AtomicBool,
}

impl ThreadPoolDelegator {
    pub fn new(pool: Arc<FallbackPool>) -> Self {
        Self {
            host: ArcSwapOption::empty(),
            pool,
            slot: TaskSlot::default(),
            busy: AtomicBool::new(false),
        }
    }

    /// A delegator with its own fallback pool.
    pub fn standalone(max_workers: usize) -> Self {
        Self::new(Arc::new(FallbackPool::new(max_workers)))
    }

    pub fn attach_host(&self, host: impl HostThreadPool + 'static) {
        self.host
            .store(Some(Arc::new(Box::new(host) as Box<dyn HostThreadPool>)));
    }

    pub fn detach_host(&self) {
        self.host.store(None);
    }

    pub fn has_host(&self) -> bool {
        self.host.load().is_some()
    }

    pub fn pool(&self) -> &Arc<FallbackPool> {
        &self.pool
    }

    /// Run `task(i)` for every `i` in `0..task_count`, returning after all finished.
    ///
    /// Re-entrant calls, from inside a task or from a second thread while a
    /// run is in progress, execute inline.
    pub fn execute<F>(&self, task_count: u32, task: &F) -> ExecuteReport
    where
        F: Fn(u32) + Sync,
    {
        if task_count == 0 {
            return ExecuteReport {
                strategy: Strategy::Empty,
                panicked: 0,
            };
        }
        if self.busy.swap(true, Ordering::Acquire) {
            return run_inline(task_count, task);
        }
        let _busy = BusyGuard(&self.busy);
        self.dispatch(task_count, task)
    }

    fn dispatch(&self, task_count: u32, task: Task<'_>) -> ExecuteReport {
        if let Some(host) = &*self.host.load() {
            let published = Published {
                task,
                panicked: AtomicU32::new(0),
            };
            let accepted = {
                let _publication = self.slot.publish(&published);
                host.request_exec(task_count)
            };
            if accepted {
                return ExecuteReport {
                    strategy: Strategy::Host,
                    panicked: published.panicked.into_inner(),
                };
            }
            debug!(task_count, "Host thread pool refused tasks, running locally");
        }

        if task_count <= INLINE_THRESHOLD {
            return run_inline(task_count, task);
        }
        self.pool.run(task_count, task)
    }

    /// Host callback: run the published task for `index`.
    ///
    /// Returns `false` when nothing is published.
    pub fn exec(&self, index: u32) -> bool {
        let ran = self.slot.exec(index);
        if !ran {
            debug!(index, "Thread pool exec without a published task");
        }
        ran
    }
}

impl std::fmt::Debug for ThreadPoolDelegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolDelegator")
            .field("has_host", &self.has_host())
            .field("pool", &self.pool)
            .finish()
    }
}
