//! CSP-style channels and select over a promise-based async substrate.
//!
//! Channels are either unbuffered, so that every send is a rendezvous with a receive, or buffered
//! with a fixed capacity. A [`select`] commits to exactly one of several sends and receives,
//! possibly on channels of different types. Every blocking point is expressed as an [`Async`]
//! action which suspends by attaching a continuation to a [`Promise`], so waiting never occupies
//! a thread of the [`Exec`] it runs on.

#[macro_use]
extern crate tracing;

pub extern crate pqueue;

mod exec;
mod io;
mod channel;
mod util;

pub mod error;

pub use crate::{
    exec::{Executor, Exec, TokioExecutor, PoolConfig, WorkerPool},
    io::{Io, Promise, Async},
    channel::{
        ChannelId,
        api::*,
        select::*,
    },
};

/// Future types
pub mod future {
    pub use crate::io::future::PromiseFut;
}
