//! Contracts the runtime expects from the RTOS and the paired host

use alloc::boxed::Box;
use core::fmt;

use apprt_core::{AppId, ContextId, RtResult};
use apprt_loader::LoadedApp;

use crate::context::AppContext;

/// Body of a context task
pub type ContextTask = Box<dyn FnOnce() + Send>;

/// Handle of a spawned context task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u32);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Creates and destroys context tasks
pub trait TaskSpawner: Send + Sync {
    /// Start `task` for `context` on a stack of `stack_size` bytes
    fn spawn(&self, context: ContextId, stack_size: usize, task: ContextTask)
        -> RtResult<TaskHandle>;

    /// Delete the task unconditionally
    fn delete(&self, handle: TaskHandle);

    /// Let other tasks of equal priority run
    fn yield_now(&self) {}

    /// Block the calling task until `cancelled` holds; a task ends here
    /// after its runloop exits and waits to be deleted
    fn park(&self, cancelled: &dyn Fn() -> bool);
}

/// Link to the paired phone
pub trait HostLink: Send + Sync {
    /// Ask the host to transfer the binary of `app`; completion arrives as
    /// `RuntimeMessage::DownloadComplete`
    fn request_app(&self, app: AppId);

    /// Tell the requester the transfer failed
    fn download_failed(&self, app: AppId);
}

/// Runs the code of a loaded image on the calling context task
pub trait AppExecutor: Send + Sync {
    fn enter(&self, app: &LoadedApp, context: &mut AppContext);
}
