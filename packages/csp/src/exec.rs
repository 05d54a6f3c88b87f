//! Executors that the async substrate submits its work to.

use crate::io::Io;
use std::{
    io,
    fmt::{self, Formatter, Debug},
    num::NonZeroUsize,
    sync::Arc,
    thread::available_parallelism,
    time::Duration,
};
use tokio::runtime::{self, Handle, Runtime};


const DEFAULT_WORKER_THREADS: usize = 4;
const DEFAULT_THREAD_NAME: &str = "csp-worker";


/// Something that can run units of work, now or after a delay
///
/// This is the only thing the async substrate needs from a worker pool. Work submitted must not
/// run inline on the submitting thread.
pub trait Executor: Send + Sync + 'static {
    /// Run `work` as soon as possible.
    fn submit(&self, work: Io<()>);

    /// Run `work` once `delay` has elapsed.
    fn schedule(&self, work: Io<()>, delay: Duration);
}

/// Shared handle to an [`Executor`]
#[derive(Clone)]
pub struct Exec(Arc<dyn Executor>);

impl Exec {
    /// Wrap an executor.
    pub fn new<E: Executor>(executor: E) -> Self {
        Exec(Arc::new(executor))
    }

    /// Submit a closure to run as soon as possible.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.submit(Io::new(f));
    }

    /// Submit a closure to run once `delay` has elapsed.
    pub fn schedule<F>(&self, f: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.schedule(Io::new(f), delay);
    }
}

impl Debug for Exec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Exec(..)")
    }
}


/// [`Executor`] that spawns work onto a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioExecutor(Handle);

impl TokioExecutor {
    /// Spawn onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        TokioExecutor(handle)
    }

    /// Spawn onto the runtime the calling code is running in.
    ///
    /// Panics if not called from within a tokio runtime.
    pub fn current() -> Self {
        TokioExecutor(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, work: Io<()>) {
        self.0.spawn(async move { work.perform() });
    }

    fn schedule(&self, work: Io<()>, delay: Duration) {
        self.0.spawn(async move {
            tokio::time::sleep(delay).await;
            work.perform()
        });
    }
}


/// Configuration for a [`WorkerPool`]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PoolConfig {
    /// Number of worker threads. Must be non-zero.
    pub worker_threads: usize,
    /// Name given to worker threads.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            worker_threads: available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(DEFAULT_WORKER_THREADS),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl PoolConfig {
    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the name given to worker threads.
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

/// Multi-threaded worker pool owning its own tokio runtime
///
/// Dropping the pool shuts down the runtime, abandoning any work that has not yet run.
pub struct WorkerPool {
    exec: Exec,
    runtime: Runtime,
}

impl WorkerPool {
    /// Start a pool with the given configuration.
    pub fn new(config: PoolConfig) -> io::Result<Self> {
        if config.worker_threads == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker pool needs at least one worker thread",
            ));
        }
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()?;
        let exec = Exec::new(TokioExecutor::new(runtime.handle().clone()));
        debug!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            "started worker pool"
        );
        Ok(WorkerPool { exec, runtime })
    }

    /// Handle for submitting work to this pool.
    pub fn exec(&self) -> &Exec {
        &self.exec
    }

    /// Shut down, waiting up to `timeout` for running work to yield.
    pub fn shutdown(self, timeout: Duration) {
        let WorkerPool { exec, runtime } = self;
        drop(exec);
        runtime.shutdown_timeout(timeout);
        debug!("shut down worker pool");
    }
}

impl Debug for WorkerPool {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("WorkerPool").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::mpsc,
        time::Instant,
    };

    #[test]
    fn zero_workers_rejected() {
        let e = WorkerPool::new(PoolConfig::default().with_worker_threads(0)).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn submit_runs_off_thread() {
        let pool = WorkerPool::new(
            PoolConfig::default().with_worker_threads(2).with_thread_name("exec-test")
        ).unwrap();
        let (send, recv) = mpsc::channel();
        pool.exec().submit(move || {
            let name = std::thread::current().name().map(str::to_owned);
            send.send(name).unwrap();
        });
        let name = recv.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("exec-test"));
    }

    #[test]
    fn schedule_waits_for_delay() {
        let pool = WorkerPool::new(PoolConfig::default().with_worker_threads(1)).unwrap();
        let (send, recv) = mpsc::channel();
        let start = Instant::now();
        pool.exec().schedule(move || send.send(Instant::now()).unwrap(), Duration::from_millis(100));
        let ran_at = recv.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(ran_at.duration_since(start) >= Duration::from_millis(100));
        pool.shutdown(Duration::from_secs(1));
    }
}
