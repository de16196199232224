//! Execution contexts that own a view.
//!
//! # Responsibility
//! - Tell callers whether they already run on the view's context.
//! - Marshal work onto that context when they do not.
//!
//! # Invariants
//! - Posted tasks run in posting order, one at a time, on the owning thread.
//! - `post` never runs the task inline.

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};

/// Unit of work marshaled onto a view context.
pub type ViewTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The context no longer accepts tasks.
    Closed,
    /// The call must be made from the owning thread.
    WrongThread,
    /// The owner thread could not be started.
    Spawn(String),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "view context is closed"),
            Self::WrongThread => write!(f, "call made outside the view context's thread"),
            Self::Spawn(message) => write!(f, "failed to start view thread: {message}"),
        }
    }
}

impl Error for ContextError {}

/// Thread affinity of a view.
pub trait ViewContext: Send + Sync {
    /// True when the caller already runs on this context.
    fn is_current(&self) -> bool;
    /// Queues `task` for asynchronous execution on this context.
    fn post(&self, task: ViewTask) -> Result<(), ContextError>;
}

/// Context backed by a dedicated thread draining a task channel.
pub struct ThreadContext {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<ViewTask>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadContext {
    pub fn spawn(name: impl Into<String>) -> Result<Self, ContextError> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<ViewTask>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .map_err(|err| ContextError::Spawn(err.to_string()))?;

        debug!("event=view_context_spawn module=presenter status=ok thread={name}");
        Ok(Self {
            thread_id: handle.thread().id(),
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until every task posted before this call has run.
    ///
    /// # Errors
    /// - `WrongThread` when called from the context's own thread.
    /// - `Closed` after `shutdown`.
    pub fn flush(&self) -> Result<(), ContextError> {
        if self.is_current() {
            return Err(ContextError::WrongThread);
        }
        let (done_tx, done_rx) = mpsc::channel::<()>();
        self.post(Box::new(move || {
            let _ = done_tx.send(());
        }))?;
        done_rx.recv().map_err(|_| ContextError::Closed)
    }

    /// Stops accepting tasks, drains the queue and joins the thread.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(
                "event=view_context_shutdown module=presenter status=error thread={} error=task_panicked",
                self.name
            );
        }
    }
}

impl ViewContext for ThreadContext {
    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn post(&self, task: ViewTask) -> Result<(), ContextError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(ContextError::Closed);
        };
        sender.send(task).map_err(|_| ContextError::Closed)
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Context owned by the thread that created it; queued tasks run when that
/// thread calls `run_pending`.
pub struct QueueContext {
    owner: ThreadId,
    queue: Mutex<VecDeque<ViewTask>>,
}

impl QueueContext {
    pub fn for_current_thread() -> Self {
        Self {
            owner: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    ///
    /// # Errors
    /// `WrongThread` when called outside the owning thread.
    pub fn run_pending(&self) -> Result<usize, ContextError> {
        if !self.is_current() {
            return Err(ContextError::WrongThread);
        }
        let mut ran = 0;
        loop {
            // Release the lock before running so tasks can post again.
            let next = self.queue.lock().pop_front();
            let Some(task) = next else {
                return Ok(ran);
            };
            task();
            ran += 1;
        }
    }
}

impl ViewContext for QueueContext {
    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn post(&self, task: ViewTask) -> Result<(), ContextError> {
        self.queue.lock().push_back(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextError, QueueContext, ThreadContext, ViewContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn thread_context_runs_tasks_in_order_off_the_caller_thread() {
        let context = Arc::new(ThreadContext::spawn("view-test").unwrap());
        assert!(!context.is_current());

        let seen = Arc::new(Mutex::new(Vec::new()));
        for index in 0..5 {
            let seen = Arc::clone(&seen);
            let probe = Arc::clone(&context);
            context
                .post(Box::new(move || {
                    assert!(probe.is_current());
                    seen.lock().unwrap().push(index);
                }))
                .unwrap();
        }
        context.flush().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn thread_context_rejects_posts_after_shutdown() {
        let context = ThreadContext::spawn("view-closed").unwrap();
        context.shutdown();
        assert_eq!(context.post(Box::new(|| {})), Err(ContextError::Closed));
    }

    #[test]
    fn queue_context_defers_until_pumped() {
        let context = QueueContext::for_current_thread();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        context
            .post(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(context.pending(), 1);
        assert_eq!(context.run_pending().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_context_is_pumped_only_by_its_owner() {
        let context = Arc::new(QueueContext::for_current_thread());
        let remote = Arc::clone(&context);
        let result = std::thread::spawn(move || (remote.is_current(), remote.run_pending()))
            .join()
            .unwrap();
        assert_eq!(result, (false, Err(ContextError::WrongThread)));
    }
}
