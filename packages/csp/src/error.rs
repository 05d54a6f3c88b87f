//! Error types

use std::fmt::{self, Formatter, Display};
use thiserror::Error;


/// Error for misusing an API in a way that can never succeed
///
/// These are never retried by this crate: they indicate a bug in the calling code, and are
/// reported synchronously by the call that commits the violation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum UsageError {
    /// A [`Promise`](crate::Promise) was delivered through the direct path after it had already
    /// been completed
    #[error("promise already delivered")]
    AlreadyDelivered,
    /// A [`SelectOutcome`](crate::SelectOutcome) accessor for one side was called on an outcome
    /// of the other side
    #[error("cannot get {accessor} of a {actual} select outcome")]
    WrongOutcome {
        /// Name of the accessor that was called
        accessor: &'static str,
        /// What actually happened in the select
        actual: OutcomeKind,
    },
}

/// Which side of a rendezvous a select committed to
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OutcomeKind {
    /// A send option won
    Sent,
    /// A receive option won
    Received,
}

impl Display for OutcomeKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            OutcomeKind::Sent => "sent",
            OutcomeKind::Received => "received",
        })
    }
}

/// Error for attempting to wait on a promise with no or limited blocking, and the promise not
/// completing immediately or by the specified deadline
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("operation would block")]
pub struct WouldBlockError;
