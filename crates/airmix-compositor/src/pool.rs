//! Size-keyed pools of reusable [`GpuFrame`]s.
//!
//! Every frame of a given [`FrameKey`] is always in exactly one place: free in
//! its sub-pool, on loan to a caller, or held by a pipeline stage. Frames are
//! created lazily the first time a size is asked for and are never destroyed
//! while the compositor runs.
//!
//! Device work (allocating a texture) only happens on the worker thread.
//! Callers on other threads go through the task queue, and so does handing a
//! frame back, so allocation decisions are always made in submission order.

use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use airmix_core::{AirmixError, AirmixResult, OwnerTag};
use airmix_gpu::GraphicsDevice;

use crate::frame::{FrameKey, GpuFrame, PooledFrame};
use crate::stats::Stats;
use crate::worker::TaskQueue;

struct SubPool {
    free_tx: Sender<GpuFrame>,
    free_rx: Receiver<GpuFrame>,
    /// Frames ever allocated for this key.
    resident: AtomicUsize,
}

impl SubPool {
    fn new() -> Self {
        let (free_tx, free_rx) = crossbeam_channel::unbounded();
        Self {
            free_tx,
            free_rx,
            resident: AtomicUsize::new(0),
        }
    }
}

pub struct FramePool {
    owner: OwnerTag,
    pools: DashMap<FrameKey, Arc<SubPool>>,
    tasks: TaskQueue,
    worker: OnceLock<ThreadId>,
    stats: Arc<Stats>,
}

impl FramePool {
    pub(crate) fn new(owner: OwnerTag, tasks: TaskQueue, stats: Arc<Stats>) -> Arc<Self> {
        Arc::new(Self {
            owner,
            pools: DashMap::new(),
            tasks,
            worker: OnceLock::new(),
            stats,
        })
    }

    /// Record the calling thread as the device-owning worker.
    pub(crate) fn bind_worker(&self) {
        let _ = self.worker.set(std::thread::current().id());
    }

    pub fn is_worker_thread(&self) -> bool {
        self.worker.get() == Some(&std::thread::current().id())
    }

    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    fn sub_pool(&self, key: FrameKey) -> Arc<SubPool> {
        // Clone the Arc out so no map shard stays locked while we block.
        self.pools
            .entry(key)
            .or_insert_with(|| Arc::new(SubPool::new()))
            .clone()
    }

    /// Frames allocated for `key` so far, wherever they currently are.
    pub fn resident(&self, key: FrameKey) -> usize {
        self.pools
            .get(&key)
            .map(|p| p.resident.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Frames of `key` sitting free in the pool.
    pub fn available(&self, key: FrameKey) -> usize {
        self.pools.get(&key).map(|p| p.free_rx.len()).unwrap_or(0)
    }

    /// Take a free frame or allocate one. Worker thread only.
    fn take_or_allocate(
        &self,
        device: &mut dyn GraphicsDevice,
        key: FrameKey,
    ) -> AirmixResult<GpuFrame> {
        let pool = self.sub_pool(key);
        if let Ok(frame) = pool.free_rx.try_recv() {
            return Ok(frame);
        }
        let mut frame = GpuFrame::allocate(device, key, self.owner)?;
        frame.unlock();
        let resident = pool.resident.fetch_add(1, Ordering::AcqRel) + 1;
        self.stats.frames_allocated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("frame pool {} grew to {} frames", key, resident);
        Ok(frame)
    }

    /// Acquire a frame from the worker thread, allocating inline if needed.
    pub(crate) fn acquire_local(
        self: &Arc<Self>,
        device: &mut dyn GraphicsDevice,
        key: FrameKey,
    ) -> AirmixResult<PooledFrame> {
        debug_assert!(self.is_worker_thread());
        let frame = self.take_or_allocate(device, key)?;
        Ok(PooledFrame::new(frame, Arc::clone(self)))
    }

    /// Acquire a frame from any thread other than the worker.
    ///
    /// A free frame is handed out directly; otherwise the worker is asked to
    /// find or allocate one and this call blocks until it answers.
    pub fn acquire(self: &Arc<Self>, key: FrameKey) -> AirmixResult<PooledFrame> {
        if self.is_worker_thread() {
            return Err(AirmixError::InvalidArgument(
                "the compositor worker must acquire frames with its device".into(),
            ));
        }
        let pool = self.sub_pool(key);
        if let Ok(frame) = pool.free_rx.try_recv() {
            return Ok(PooledFrame::new(frame, Arc::clone(self)));
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let this = Arc::clone(self);
        self.tasks.push(move |ctx| {
            let frame = this.take_or_allocate(ctx.device(), key)?;
            if let Err(unclaimed) = reply_tx.send(frame) {
                this.restore(unclaimed.into_inner());
            }
            Ok(())
        })?;

        // The reply sender is dropped unanswered if the worker dies first.
        let frame = reply_rx.recv().map_err(|_| AirmixError::WorkerStopped)?;
        Ok(PooledFrame::new(frame, Arc::clone(self)))
    }

    /// Return a frame to its sub-pool, via the worker unless already on it.
    pub(crate) fn release(self: &Arc<Self>, mut frame: GpuFrame) {
        frame.audio_mut().clear();
        if self.is_worker_thread() {
            self.restore(frame);
            return;
        }
        let this = Arc::clone(self);
        let queued = self.tasks.push(move |_ctx| {
            this.restore(frame);
            Ok(())
        });
        if queued.is_err() {
            tracing::debug!("compositor worker gone, frame not recycled");
        }
    }

    fn restore(&self, mut frame: GpuFrame) {
        if frame.is_locked() {
            tracing::error!(
                "frame {} returned to the pool while locked; unlocking",
                frame.key()
            );
            frame.unlock();
        }
        let pool = self.sub_pool(frame.key());
        // The pool holds its own receiver, so this send cannot fail.
        let _ = pool.free_tx.send(frame);
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("owner", &self.owner)
            .field("keys", &self.pools.len())
            .finish()
    }
}
