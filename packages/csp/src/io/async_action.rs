// suspendable actions: deferred actions which produce a promise rather than a value.

use super::{
    action::Io,
    promise::Promise,
};
use crate::exec::Exec;
use std::{
    fmt::{self, Formatter, Debug},
    ops::ControlFlow,
    sync::Arc,
    time::Duration,
};


/// A deferred action which, when run, yields a [`Promise`] for a value that may not exist yet
///
/// Composition with [`bind`](Self::bind) never blocks a thread: running a bound action runs the
/// first action, then attaches a callback to its promise which runs the second action once the
/// first's value arrives, forwarding the second's eventual value into a fresh result promise.
pub struct Async<T>(Box<dyn FnOnce(&Exec) -> Promise<T> + Send + 'static>);

impl<T: Clone + Send + 'static> Async<T> {
    /// Wrap a closure that starts some work on an executor and returns a promise for its result.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Exec) -> Promise<T> + Send + 'static,
    {
        Async(Box::new(f))
    }

    /// Start the action on `exec`.
    pub fn run(self, exec: &Exec) -> Promise<T> {
        (self.0)(exec)
    }

    /// Deferred action that starts this action on `exec` when performed.
    pub fn into_io(self, exec: Exec) -> Io<Promise<T>> {
        Io::new(move || self.run(&exec))
    }

    /// Action that completes immediately with `value`.
    pub fn unit(value: T) -> Self {
        Async::new(move |exec| Promise::completed(exec, value))
    }

    /// Action that performs `io` synchronously and completes with its output.
    pub fn wrap(io: Io<T>) -> Self {
        Async::new(move |exec| Promise::completed(exec, io.perform()))
    }

    /// Action that calls `f` synchronously and completes with its output.
    pub fn lift<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Async::wrap(Io::new(f))
    }

    /// Action that runs `self`, feeds its eventual value to `f`, and runs the resulting action.
    pub fn bind<U, F>(self, f: F) -> Async<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Async<U> + Send + 'static,
    {
        Async::new(move |exec| {
            let result = Promise::new(exec);
            let left = self.run(exec);
            let exec = exec.clone();
            let forward = result.clone();
            left.on_complete(move |value| {
                f(value).run(&exec).on_complete(move |value| {
                    let delivered = forward.try_deliver(value);
                    debug_assert!(delivered, "bound action completed twice (internal bug)");
                });
            });
            result
        })
    }

    /// Action that runs `self`, discards its value, then runs `next`.
    pub fn then<U>(self, next: Async<U>) -> Async<U>
    where
        U: Clone + Send + 'static,
    {
        self.bind(move |_| next)
    }

    /// Action that runs `self` and transforms its value with `f`.
    pub fn map<U, F>(self, f: F) -> Async<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.bind(move |value| Async::unit(f(value)))
    }

    /// Action that runs `step` on `seed`, and then repeatedly on the state it continues with, until
    /// it breaks, completing with the value it breaks with.
    ///
    /// Each round resumes through a fresh executor callback, so arbitrarily long loops use
    /// constant stack, and no chain of forwarding promises builds up across rounds.
    pub fn iterate<S, F>(seed: S, step: F) -> Self
    where
        S: Clone + Send + 'static,
        F: Fn(S) -> Async<ControlFlow<T, S>> + Send + Sync + 'static,
    {
        Async::new(move |exec| {
            let result = Promise::new(exec);
            drive(exec.clone(), Arc::new(step), seed, result.clone());
            result
        })
    }
}

impl Async<()> {
    /// Action that starts `action` on the executor independently and completes immediately,
    /// without waiting for `action` to finish.
    pub fn fork<T>(action: Async<T>) -> Self
    where
        T: Clone + Send + 'static,
    {
        Async::new(move |exec| {
            let exec_2 = exec.clone();
            exec.submit(move || drop(action.run(&exec_2)));
            Promise::completed(exec, ())
        })
    }

    /// Action that completes once `delay` has elapsed on the executor's timer.
    pub fn delay(delay: Duration) -> Self {
        Async::new(move |exec| {
            let result = Promise::new(exec);
            let elapsed = result.clone();
            exec.schedule(
                move || {
                    let delivered = elapsed.try_deliver(());
                    debug_assert!(delivered, "delay completed twice (internal bug)");
                },
                delay,
            );
            result
        })
    }
}

impl<T> Debug for Async<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Async(..)")
    }
}

// run one round of an iterate loop, and schedule the next round upon its completion.
fn drive<T, S, F>(exec: Exec, step: Arc<F>, state: S, result: Promise<T>)
where
    T: Clone + Send + 'static,
    S: Clone + Send + 'static,
    F: Fn(S) -> Async<ControlFlow<T, S>> + Send + Sync + 'static,
{
    let round = step(state).run(&exec);
    round.on_complete(move |flow| match flow {
        ControlFlow::Continue(state) => drive(exec, step, state, result),
        ControlFlow::Break(value) => {
            let delivered = result.try_deliver(value);
            debug_assert!(delivered, "iterate completed twice (internal bug)");
        }
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{PoolConfig, WorkerPool};
    use std::{
        sync::mpsc,
        time::Instant,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pool() -> WorkerPool {
        WorkerPool::new(PoolConfig::default().with_worker_threads(4)).unwrap()
    }

    #[test]
    fn bind_chain() {
        let pool = pool();
        let action = Async::unit(40)
            .bind(|x| Async::lift(move || x + 1))
            .map(|x| x + 1);
        assert_eq!(action.run(pool.exec()).block_timeout(TIMEOUT), Ok(42));
    }

    #[test]
    fn nothing_runs_until_run() {
        let pool = pool();
        let (send, recv) = mpsc::channel();
        let action = Async::lift(move || send.send(()).unwrap());
        assert!(recv.recv_timeout(Duration::from_millis(50)).is_err());
        action.run(pool.exec()).block_timeout(TIMEOUT).unwrap();
        assert!(recv.try_recv().is_ok());
    }

    #[test]
    fn bind_waits_for_pending_promise() {
        let pool = pool();
        let gate = Promise::<u32>::new(pool.exec());
        let action = Async::new({
            let gate = gate.clone();
            move |_| gate
        }).map(|x| x * 2);
        let result = action.run(pool.exec());
        assert!(result.block_timeout(Duration::from_millis(50)).is_err());
        gate.deliver(21).unwrap();
        assert_eq!(result.block_timeout(TIMEOUT), Ok(42));
    }

    #[test]
    fn fork_does_not_wait() {
        let pool = pool();
        let (send, recv) = mpsc::channel();
        let forked = Async::delay(Duration::from_millis(100))
            .then(Async::lift(move || send.send("forked").unwrap()));
        let result = Async::fork(forked).then(Async::unit("spawner")).run(pool.exec());
        assert_eq!(result.block_timeout(TIMEOUT), Ok("spawner"));
        assert!(recv.try_recv().is_err());
        assert_eq!(recv.recv_timeout(TIMEOUT).unwrap(), "forked");
    }

    #[test]
    fn delay_elapses() {
        let pool = pool();
        let start = Instant::now();
        Async::delay(Duration::from_millis(100)).run(pool.exec()).block_timeout(TIMEOUT).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn iterate_until_break() {
        let pool = pool();
        let action = Async::iterate((0u64, 0u64), |(i, sum)| {
            Async::unit(if i == 10_000 {
                ControlFlow::Break(sum)
            } else {
                ControlFlow::Continue((i + 1, sum + i))
            })
        });
        assert_eq!(action.run(pool.exec()).block_timeout(TIMEOUT), Ok(49_995_000));
    }
}
