//! Main-context collaborator: where `ThreadMode::Main` handlers run.

use std::collections::VecDeque;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

/// A queued handler invocation.
pub type Task = Box<dyn FnOnce() + Send>;

/// The designated "main" execution context.
///
/// The broker asks it two things: whether the calling context is the main
/// one, and to enqueue a zero-argument callback to run there. What "main"
/// means (a UI thread, a game loop, a dedicated executor) is up to the
/// implementation.
pub trait MainContext: Send + Sync {
    /// Is the calling context the main context?
    fn is_main(&self) -> bool;

    /// Enqueue a callback to run on the main context, fire-and-forget
    /// relative to the caller.
    fn enqueue(&self, task: Task);
}

/// Default [`MainContext`]: pins "main" to the thread it was created on and
/// queues tasks until that thread drains them.
///
/// ## Example
///
/// ```
/// use topicbus::{MainContext, ThreadPinnedContext};
///
/// let ctx = ThreadPinnedContext::new();
/// assert!(ctx.is_main());
///
/// ctx.enqueue(Box::new(|| println!("ran on main")));
/// assert_eq!(ctx.run_pending(), 1);
/// ```
pub struct ThreadPinnedContext {
    main: ThreadId,
    queue: Mutex<VecDeque<Task>>,
}

impl Default for ThreadPinnedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPinnedContext {
    /// Pin the current thread as the main context.
    pub fn new() -> Self {
        Self {
            main: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Run every queued task, returning how many ran.
    ///
    /// Tasks are popped one at a time so a running task may enqueue more;
    /// tasks enqueued during the drain run in the same call.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.queue.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl MainContext for ThreadPinnedContext {
    fn is_main(&self) -> bool {
        thread::current().id() == self.main
    }

    fn enqueue(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}
