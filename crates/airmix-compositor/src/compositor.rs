use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use airmix_core::{AirmixError, AirmixResult, CompositorConfig, FormatDesc, OwnerTag, SystemFrame};
use airmix_gpu::{open_device, GraphicsDevice};

use crate::frame::{FrameKey, InputFrame, PooledFrame};
use crate::output::OutputQueue;
use crate::pool::FramePool;
use crate::stats::{CompositorStats, Stats};
use crate::worker::{self, TaskQueue, WorkerSetup};

/// Public entry point of the compositor.
///
/// All methods take `&self`; a compositor can be shared between a ticking
/// producer, consumers draining outputs, and threads preparing frames with
/// [`create_frame`](Self::create_frame).
///
/// ```no_run
/// use airmix_compositor::{Compositor, FormatDesc, SystemFrame};
///
/// let compositor = Compositor::new(FormatDesc::custom(1280, 720, 50))?;
/// compositor.push(vec![SystemFrame::new(1280, 720).into()])?;
/// while let Some(frame) = compositor.try_pop() {
///     println!("{}x{}", frame.image.width, frame.image.height);
/// }
/// # Ok::<(), airmix_compositor::AirmixError>(())
/// ```
pub struct Compositor {
    format: FormatDesc,
    tag: OwnerTag,
    tasks: TaskQueue,
    pool: Arc<FramePool>,
    output: OutputQueue,
    stats: Arc<Stats>,
    empty_frame: Arc<SystemFrame>,
    worker: Mutex<Option<JoinHandle<AirmixResult<()>>>>,
    shut_down: AtomicBool,
}

impl Compositor {
    /// Start a compositor with the default configuration.
    pub fn new(format: FormatDesc) -> AirmixResult<Self> {
        Self::with_config(format, CompositorConfig::default())
    }

    /// Start a compositor on the device backend named by `config`.
    pub fn with_config(format: FormatDesc, config: CompositorConfig) -> AirmixResult<Self> {
        let backend = config.backend;
        Self::with_device(format, config, move || open_device(backend))
    }

    /// Start a compositor whose device is opened by `factory`.
    ///
    /// The factory runs on the worker thread, which owns the device for the
    /// compositor's whole life. If it fails, so does this call.
    pub fn with_device<F>(format: FormatDesc, config: CompositorConfig, factory: F) -> AirmixResult<Self>
    where
        F: FnOnce() -> AirmixResult<Box<dyn GraphicsDevice>> + Send + 'static,
    {
        if format.width == 0 || format.height == 0 {
            return Err(AirmixError::InvalidArgument(format!(
                "output format {}x{} has no pixels",
                format.width, format.height
            )));
        }

        let tag = OwnerTag::new();
        let stats = Arc::new(Stats::default());
        let (tasks, task_rx) = TaskQueue::bounded(config.task_queue_capacity);
        let pool = FramePool::new(tag, tasks.clone(), Arc::clone(&stats));
        let output = OutputQueue::new(config.output_bound(), Arc::clone(&stats));

        let handle = worker::spawn(WorkerSetup {
            format: format.clone(),
            factory: Box::new(factory),
            pool: Arc::clone(&pool),
            output: output.clone(),
            stats: Arc::clone(&stats),
            tasks: task_rx,
        })?;

        tracing::info!(
            "compositor {} ready: {} {}x{}, task queue {}, output {}",
            tag,
            format.format,
            format.width,
            format.height,
            config.task_queue_capacity.max(1),
            config
                .output_bound()
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
        );

        Ok(Self {
            empty_frame: Arc::new(SystemFrame::for_format(&format)),
            format,
            tag,
            tasks,
            pool,
            output,
            stats,
            worker: Mutex::new(Some(handle)),
            shut_down: AtomicBool::new(false),
        })
    }

    fn ensure_running(&self) -> AirmixResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(AirmixError::ShutDown);
        }
        Ok(())
    }

    /// Submit one tick's input frames, bottom layer first.
    ///
    /// An empty tick makes the shared empty frame available at once, ahead
    /// of any ticks still in the pipeline. Otherwise a composite is queued;
    /// this blocks only while the worker's task queue is full.
    pub fn push(&self, frames: Vec<InputFrame>) -> AirmixResult<()> {
        self.ensure_running()?;
        if frames.is_empty() {
            self.stats.empty_ticks.fetch_add(1, Ordering::Relaxed);
            self.output.push(Arc::clone(&self.empty_frame));
            return Ok(());
        }
        self.tasks.push(move |ctx| ctx.composite(frames))
    }

    /// The next finished frame, if one is ready. Never blocks.
    pub fn try_pop(&self) -> Option<Arc<SystemFrame>> {
        self.output.try_pop()
    }

    /// A pooled frame on this compositor's device, ready to be filled and
    /// pushed without a copy. Callable from any thread.
    pub fn create_frame(&self, width: u32, height: u32) -> AirmixResult<PooledFrame> {
        self.ensure_running()?;
        self.pool.acquire(FrameKey::new(width, height))
    }

    /// Block until everything queued before this call has run on the worker.
    pub fn flush(&self) -> AirmixResult<()> {
        self.ensure_running()?;
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.tasks.push(move |_ctx| {
            let _ = done_tx.send(());
            Ok(())
        })?;
        done_rx.recv().map_err(|_| AirmixError::WorkerStopped)
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats.snapshot()
    }

    /// Frames ever allocated for `width`x`height`.
    pub fn pool_resident(&self, width: u32, height: u32) -> usize {
        self.pool.resident(FrameKey::new(width, height))
    }

    /// Frames of `width`x`height` free in the pool right now.
    pub fn pool_available(&self, width: u32, height: u32) -> usize {
        self.pool.available(FrameKey::new(width, height))
    }

    /// Tasks waiting for the worker.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    /// Finished frames waiting to be popped.
    pub fn ready_outputs(&self) -> usize {
        self.output.len()
    }

    pub fn format_desc(&self) -> &FormatDesc {
        &self.format
    }

    /// Identifies frames created by this compositor.
    pub fn tag(&self) -> OwnerTag {
        self.tag
    }

    /// Let the worker finish the tasks already queued, then stop it.
    ///
    /// Later calls to `push`, `create_frame` and `flush` fail with
    /// [`AirmixError::ShutDown`]. Returns the error that stopped the worker,
    /// if one did. Calling it again is a no-op.
    pub fn shutdown(&self) -> AirmixResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.tasks.shutdown();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        let result = handle
            .join()
            .map_err(|_| AirmixError::Other("compositor worker panicked".into()))
            .and_then(|r| r);
        tracing::info!("compositor {} shut down", self.tag);
        result
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("compositor {} stopped with error: {}", self.tag, e);
        }
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("tag", &self.tag)
            .field("format", &self.format.format)
            .field("width", &self.format.width)
            .field("height", &self.format.height)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}
