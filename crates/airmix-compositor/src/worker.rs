//! The device-owning worker thread and the task queue that feeds it.
//!
//! The graphics device is opened on the worker and never leaves it. Every
//! piece of device work, composites, pool growth and frame recycling, is a
//! closure on one bounded FIFO, executed strictly in submission order.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use airmix_core::{AirmixError, AirmixResult, FormatDesc};
use airmix_gpu::GraphicsDevice;

use crate::frame::InputFrame;
use crate::output::OutputQueue;
use crate::pipeline::Pipeline;
use crate::pool::FramePool;
use crate::stats::Stats;

pub(crate) type Job = Box<dyn FnOnce(&mut WorkerContext) -> AirmixResult<()> + Send>;

/// Opens the graphics device. Runs on the worker thread.
pub(crate) type DeviceFactory = Box<dyn FnOnce() -> AirmixResult<Box<dyn GraphicsDevice>> + Send>;

pub(crate) enum Task {
    Run(Job),
    Shutdown,
}

/// Sending half of the worker's task queue.
///
/// `push` blocks while the queue is full, which is what throttles a caller
/// that submits ticks faster than the worker composites them.
#[derive(Clone)]
pub(crate) struct TaskQueue {
    tx: Sender<Task>,
}

impl TaskQueue {
    pub(crate) fn bounded(capacity: usize) -> (Self, Receiver<Task>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    pub(crate) fn push<F>(&self, job: F) -> AirmixResult<()>
    where
        F: FnOnce(&mut WorkerContext) -> AirmixResult<()> + Send + 'static,
    {
        self.tx
            .send(Task::Run(Box::new(job)))
            .map_err(|_| AirmixError::WorkerStopped)
    }

    /// Ask the worker to exit after the tasks already queued.
    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Task::Shutdown);
    }

    pub(crate) fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Everything only the worker thread may touch.
pub(crate) struct WorkerContext {
    device: Box<dyn GraphicsDevice>,
    pipeline: Pipeline,
}

impl WorkerContext {
    pub(crate) fn device(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    pub(crate) fn composite(&mut self, frames: Vec<InputFrame>) -> AirmixResult<()> {
        self.pipeline.composite(self.device.as_mut(), frames)
    }
}

pub(crate) struct WorkerSetup {
    pub format: FormatDesc,
    pub factory: DeviceFactory,
    pub pool: Arc<FramePool>,
    pub output: OutputQueue,
    pub stats: Arc<Stats>,
    pub tasks: Receiver<Task>,
}

/// Start the worker and wait until its device and pipeline are ready.
pub(crate) fn spawn(setup: WorkerSetup) -> AirmixResult<JoinHandle<AirmixResult<()>>> {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<AirmixResult<()>>(1);

    let handle = std::thread::Builder::new()
        .name("airmix-worker".into())
        .spawn(move || {
            let WorkerSetup {
                format,
                factory,
                pool,
                output,
                stats,
                tasks,
            } = setup;
            pool.bind_worker();

            let ctx = match init(&format, factory, pool, output, stats) {
                Ok(ctx) => ctx,
                Err(e) => {
                    let message = e.to_string();
                    let _ = ready_tx.send(Err(e));
                    return Err(AirmixError::device(message));
                }
            };
            let _ = ready_tx.send(Ok(()));
            run(ctx, tasks)
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            let _ = handle.join();
            Err(AirmixError::WorkerStopped)
        }
    }
}

fn init(
    format: &FormatDesc,
    factory: DeviceFactory,
    pool: Arc<FramePool>,
    output: OutputQueue,
    stats: Arc<Stats>,
) -> AirmixResult<WorkerContext> {
    let mut device = factory()?;
    let pipeline = Pipeline::new(device.as_mut(), format.clone(), pool, output, stats)?;
    tracing::info!(
        "compositor worker started on '{}' at {}x{} {:.2} fps",
        device.name(),
        format.width,
        format.height,
        format.fps()
    );
    Ok(WorkerContext { device, pipeline })
}

fn run(mut ctx: WorkerContext, tasks: Receiver<Task>) -> AirmixResult<()> {
    while let Ok(task) = tasks.recv() {
        match task {
            Task::Run(job) => {
                if let Err(e) = job(&mut ctx) {
                    tracing::error!("compositor worker terminated: {}", e);
                    return Err(e);
                }
            }
            Task::Shutdown => break,
        }
    }
    tracing::info!("compositor worker stopped");
    Ok(())
}
