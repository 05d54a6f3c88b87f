// the async substrate.
//
// there are three layers, leaf to root:
//
//      Io<T>      a deferred synchronous unit of work. the executor runs these.
//        |
//      Promise<T> a single-assignment value. completing it submits its callbacks to the
//        |        executor, never running them inline.
//        |
//      Async<T>   a deferred unit of work that yields a promise when run. binding two of them
//                 attaches the second to the first's promise, which is how a chain suspends
//                 without blocking a worker thread.
//
// polling lets threads outside of the executor block on a promise, and future lets async code
// await one.

pub(crate) mod action;
pub(crate) mod promise;
pub(crate) mod async_action;
pub(crate) mod future;

mod polling;

pub use self::{
    action::Io,
    promise::Promise,
    async_action::Async,
};
