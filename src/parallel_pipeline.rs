// THEORY:
// The `parallel_pipeline` trades latency for throughput. Where `MosaicPipeline` owns a
// single destination and processes one frame at a time on the caller's thread, this
// module keeps a pool of tokio workers and lets many frames be in flight at once.
//
// Key architectural principles:
// 1.  **Frame-Level Parallelism**: Each frame is handed to one worker as a whole. A
//     dispatcher task distributes frames round-robin; the transform itself runs on
//     `spawn_blocking` so the async workers never stall the runtime.
// 2.  **Owned Hand-Off**: Frames move into a task and the output frame moves back
//     through a `oneshot` channel. Nothing is shared between workers except the
//     buffer pool.
// 3.  **Buffer Recycling**: Output frames come from a small pool keyed by geometry.
//     Callers that are done with an output can return it with `return_frame_buffer`
//     so the next frame does not allocate.
// 4.  **No Temporal State**: The mosaic of a frame depends on that frame alone, so
//     results need no reordering; `process_batch` simply awaits them in input order.
//
// Must be constructed from within a tokio runtime.

use crate::core_modules::error::{MosaicError, Result};
use crate::core_modules::frame::{Frame, FrameLayout};
use crate::pipeline::{PipelineConfig, render_frame};
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const FRAME_POOL_SIZE: usize = 8;
const MAX_WORKER_POOL_SIZE: usize = 8;

type FramePool = Arc<Mutex<VecDeque<Frame>>>;

pub struct FrameTask {
    pub frame_id: u64,
    pub frame: Frame,
    pub enabled: bool,
    pub result_sender: oneshot::Sender<Result<Frame>>,
}

pub struct WorkerPool {
    task_sender: Option<mpsc::UnboundedSender<FrameTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(config: PipelineConfig, size: usize, frame_pool: FramePool) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();
        let mut workers = Vec::with_capacity(size + 1);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..size)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        // Dispatcher
        workers.push(tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                // A closed worker drops the task, which the caller sees as WorkerUnavailable.
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        }));

        for (worker_id, mut worker_receiver) in worker_receivers.into_iter().enumerate() {
            let worker_config = config.clone();
            let frame_pool = frame_pool.clone();

            workers.push(tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let result =
                        Self::process_frame_worker(&worker_config, &frame_pool, task.frame, task.enabled)
                            .await;
                    debug!(worker = worker_id, frame = task.frame_id, ok = result.is_ok(), "frame processed");
                    let _ = task.result_sender.send(result);
                }
            }));
        }

        Self {
            task_sender: Some(task_sender),
            workers,
        }
    }

    async fn process_frame_worker(
        config: &PipelineConfig,
        frame_pool: &FramePool,
        frame: Frame,
        enabled: bool,
    ) -> Result<Frame> {
        let mut destination = take_frame_buffer(frame_pool, frame.layout())?;
        let config = config.clone();

        tokio::task::spawn_blocking(move || -> Result<Frame> {
            render_frame(&config, enabled, &frame, &mut destination)?;
            Ok(destination)
        })
        .await
        .map_err(|_| MosaicError::WorkerUnavailable)?
    }

    pub async fn process_frame(&self, frame_id: u64, frame: Frame, enabled: bool) -> Result<Frame> {
        let task_sender = self.task_sender.as_ref().ok_or(MosaicError::WorkerUnavailable)?;
        let (result_sender, result_receiver) = oneshot::channel();

        task_sender
            .send(FrameTask {
                frame_id,
                frame,
                enabled,
                result_sender,
            })
            .map_err(|_| MosaicError::WorkerUnavailable)?;

        result_receiver.await.map_err(|_| MosaicError::WorkerUnavailable)?
    }

    /// Closes the task queue and waits for the dispatcher and every worker to drain.
    pub async fn shutdown(mut self) {
        self.task_sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

/// Takes a pooled buffer with the right geometry, or allocates one.
fn take_frame_buffer(frame_pool: &FramePool, layout: FrameLayout) -> Result<Frame> {
    let recycled = {
        let mut pool = frame_pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = pool.iter().position(|frame| frame.layout().same_geometry(&layout));
        index.and_then(|index| pool.remove(index))
    };

    match recycled {
        Some(frame) => Ok(frame),
        None => Ok(Frame::new(layout.to_packed()?)),
    }
}

pub struct ParallelPipeline {
    config: PipelineConfig,
    worker_pool: WorkerPool,
    frame_buffer_pool: FramePool,
    frame_counter: AtomicU64,
}

impl ParallelPipeline {
    /// One worker per logical CPU, capped at a small pool.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_workers(config, num_cpus::get().min(MAX_WORKER_POOL_SIZE))
    }

    pub fn with_workers(config: PipelineConfig, workers: usize) -> Result<Self> {
        config.validate()?;

        let frame_buffer_pool = Arc::new(Mutex::new(VecDeque::with_capacity(FRAME_POOL_SIZE)));
        let worker_pool = WorkerPool::new(config.clone(), workers, frame_buffer_pool.clone());
        info!(
            workers = workers.max(1),
            tile_width = config.tile_width,
            tile_height = config.tile_height,
            "started mosaic worker pool"
        );

        Ok(Self {
            config,
            worker_pool,
            frame_buffer_pool,
            frame_counter: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub async fn process_frame(&self, frame: Frame, enabled: bool) -> Result<Frame> {
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        self.worker_pool.process_frame(frame_id, frame, enabled).await
    }

    /// Processes every frame concurrently. Results are in input order.
    pub async fn process_batch(&self, frames: Vec<Frame>, enabled: bool) -> Vec<Result<Frame>> {
        join_all(frames.into_iter().map(|frame| self.process_frame(frame, enabled))).await
    }

    /// Hands an output frame back for reuse.
    pub fn return_frame_buffer(&self, frame: Frame) {
        let mut pool = self
            .frame_buffer_pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if pool.len() < FRAME_POOL_SIZE {
            pool.push_back(frame);
        }
    }

    pub fn pooled_buffers(&self) -> usize {
        self.frame_buffer_pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
        info!(frames = self.frame_counter.load(Ordering::Relaxed), "stopped mosaic worker pool");
    }
}
