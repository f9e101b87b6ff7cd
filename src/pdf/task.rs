//! Render operations and cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::request::RequestId;
use super::types::{PageHandle, Viewport};

/// Cancellation flag shared between the coordinator and the worker running
/// the render.
///
/// Cancellation is cooperative: the engine checks the token at its own
/// checkpoints and reports [`RenderError::Cancelled`](super::RenderError)
/// when it notices.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; every clone observes the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Cancelled,
}

/// One rasterization of a page onto the canvas
#[derive(Debug)]
pub struct RenderTask {
    pub id: RequestId,
    pub page: PageHandle,
    pub viewport: Viewport,
    pub token: CancellationToken,
    pub state: TaskState,
}

impl RenderTask {
    #[must_use]
    pub fn new(id: RequestId, page: PageHandle, viewport: Viewport) -> Self {
        Self {
            id,
            page,
            viewport,
            token: CancellationToken::new(),
            state: TaskState::Running,
        }
    }

    fn cancel(&mut self) {
        self.token.cancel();
        self.state = TaskState::Cancelled;
    }
}

/// Slot holding the single render operation a coordinator may have running.
#[derive(Debug, Default)]
pub struct InFlight {
    task: Option<RenderTask>,
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<&RenderTask> {
        self.task.as_ref()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.task.is_some()
    }

    /// Test-and-set: occupies the slot unless another task already holds it.
    pub fn try_begin(&mut self, task: RenderTask) -> Result<(), RenderTask> {
        if self.task.is_some() {
            return Err(task);
        }
        self.task = Some(task);
        Ok(())
    }

    /// Requests cancellation of the running task. The slot stays occupied
    /// until the task's completion arrives.
    pub fn cancel_current(&mut self) -> bool {
        match self.task.as_mut() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Test-and-clear: releases the slot only for the task with `id`.
    /// A task that was not cancelled comes back `Completed`.
    pub fn finish(&mut self, id: RequestId) -> Option<RenderTask> {
        if !self.task.as_ref().is_some_and(|task| task.id == id) {
            return None;
        }
        let mut task = self.task.take()?;
        if task.state == TaskState::Running {
            task.state = TaskState::Completed;
        }
        Some(task)
    }
}
