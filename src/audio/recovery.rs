//! Stream recovery plumbing
//!
//! - [`RestartGuard`]: try-acquire flag allowing one restart sequence at a
//!   time per engine. A request that finds it held is dropped, not queued.
//! - [`RecoveryExecutor`]: fire-and-forget dispatch of blocking recovery
//!   work onto a tokio blocking pool, so fault notifiers never start or stop
//!   streams on their own thread.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;

/// RAII token for an in-flight restart; releases the flag on drop.
pub struct RestartGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RestartGuard<'a> {
    /// Acquire `flag` if it is free. Never blocks.
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RestartGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs recovery tasks on a tokio blocking pool without tracking completion.
#[derive(Clone)]
pub struct RecoveryExecutor {
    handle: Handle,
}

impl RecoveryExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Queue `task` and return immediately.
    pub fn dispatch<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Detached: dropping the JoinHandle does not cancel the task.
        drop(self.handle.spawn_blocking(task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = RestartGuard::try_acquire(&flag);
        assert!(first.is_some());
        assert!(RestartGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(RestartGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = RestartGuard::try_acquire(&flag).unwrap();
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dispatch_runs_off_caller_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("failed to build test runtime");
        let executor = RecoveryExecutor::new(runtime.handle().clone());

        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        executor.dispatch(move || {
            let _ = tx.send(std::thread::current().id());
        });

        let worker = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("recovery task never ran");
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(RecoveryExecutor::try_current().is_none());
    }
}
