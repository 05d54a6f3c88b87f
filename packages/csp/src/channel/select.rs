// the select engine and its builders.

use super::{
    api::{SendPort, ReceivePort},
    core::Channel,
    token::{Token, Party},
};
use crate::{
    error::{UsageError, OutcomeKind},
    exec::Exec,
    io::{Async, Promise},
    util::slot::Slot,
};
use std::{
    any::Any,
    fmt::{self, Formatter, Debug},
    sync::Arc,
};


// offers one option of a select on its channel. returns whether it matched immediately.
type Register = Box<dyn FnOnce(Party) -> bool + Send + 'static>;

// continues the select after its option won.
type Resume<R> = Box<dyn FnOnce() -> Async<R> + Send + 'static>;


// register each option on its channel in list order, under one fresh token, and return a promise
// for the index of whichever option wins.
//
// registration stops early once the token is done, so if several options can match immediately
// the earliest one in the list wins. options not reached are never offered, and options already
// offered stay queued on their channels until some later operation finds them stale.
fn process_select(exec: &Exec, registers: Vec<Register>) -> Promise<usize> {
    let token = Token::new(exec);
    if registers.is_empty() {
        warn!("select with no options, will never complete");
    }
    for (option, register) in registers.into_iter().enumerate() {
        if token.is_done() {
            break;
        }
        if register(Party::new(&token, option)) {
            trace!(token = token.id(), option, "select matched while registering");
            break;
        }
    }
    token.fired().clone()
}


/// Builder for a select: an action which commits to exactly one of several send and receive
/// options, and then continues with that option's continuation
///
/// Options may be on channels of different element types, and on any mix of unbuffered and
/// buffered channels. If several options are ready at the time the select runs, the one added to
/// the builder first wins. Otherwise, whichever becomes ready first wins. Options which lose are
/// never retracted, but also can never match once their select has committed.
///
/// The channels of a select's options are kept alive until it commits, even if every port to
/// them is dropped in the meantime.
///
/// A select with no options never completes.
pub struct SelectBuilder<R> {
    registers: Vec<Register>,
    resumes: Vec<Resume<R>>,
    keep_alive: Vec<Arc<dyn Any + Send + Sync>>,
}

impl<R: Clone + Send + 'static> SelectBuilder<R> {
    /// Construct with no options.
    pub fn new() -> Self {
        SelectBuilder { registers: Vec::new(), resumes: Vec::new(), keep_alive: Vec::new() }
    }

    /// Add an option to send `value` on `port`, continuing with `then` if it wins.
    pub fn send<T, F>(mut self, port: &SendPort<T>, value: T, then: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce() -> Async<R> + Send + 'static,
    {
        self.keep_alive.push(port.channel().clone());
        self.send_on(port.channel(), value, then)
    }

    /// Add an option to receive on `port`, continuing with `then` of the received value if it
    /// wins.
    pub fn receive<T, F>(mut self, port: &ReceivePort<T>, then: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(T) -> Async<R> + Send + 'static,
    {
        self.keep_alive.push(port.channel().clone());
        self.receive_on(port.channel(), then)
    }

    // option on a channel that only the select's pending entry keeps alive, so the channel and
    // entry are freed together if every other reference is dropped.
    pub(crate) fn send_on<T, F>(mut self, channel: &Arc<Channel<T>>, value: T, then: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce() -> Async<R> + Send + 'static,
    {
        let channel = Arc::clone(channel);
        self.registers.push(Box::new(move |party| channel.send(party, value)));
        self.resumes.push(Box::new(then));
        self
    }

    pub(crate) fn receive_on<T, F>(mut self, channel: &Arc<Channel<T>>, then: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(T) -> Async<R> + Send + 'static,
    {
        let channel = Arc::clone(channel);
        let slot = Arc::new(Slot::empty());
        let slot_2 = Arc::clone(&slot);
        self.registers.push(Box::new(move |party| channel.receive(party, slot_2)));
        self.resumes.push(Box::new(move || {
            let value = slot.take().expect("receive option won without a value (internal bug)");
            then(value)
        }));
        self
    }

    /// Number of options added so far.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Whether no options have been added.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Finish building the select into an action.
    ///
    /// Nothing is offered on any channel until the action is run.
    pub fn build(self) -> Async<R> {
        let SelectBuilder { registers, mut resumes, keep_alive } = self;
        Async::new(move |exec| process_select(exec, registers))
            .bind(move |option| {
                drop(keep_alive);
                (resumes.swap_remove(option))()
            })
    }
}

impl<R: Clone + Send + 'static> Default for SelectBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Debug for SelectBuilder<R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SelectBuilder")
            .field("options", &self.registers.len())
            .finish()
    }
}

/// Begin building a select which continues into an action producing `R`.
pub fn select<R: Clone + Send + 'static>() -> SelectBuilder<R> {
    SelectBuilder::new()
}


// ==== selecting for an outcome value ====


/// What a select built with [`select_outcome`] committed to
#[derive(Debug, Clone)]
pub enum SelectOutcome<T> {
    /// A send option won, and its value was received by someone
    Sent {
        /// The port the value was sent on
        port: SendPort<T>,
    },
    /// A receive option won
    Received {
        /// The port the value was received on
        port: ReceivePort<T>,
        /// The received value
        value: T,
    },
}

impl<T> SelectOutcome<T> {
    /// Which kind of option won.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            SelectOutcome::Sent { .. } => OutcomeKind::Sent,
            SelectOutcome::Received { .. } => OutcomeKind::Received,
        }
    }

    /// The port a send went out on, or an error if a receive won.
    pub fn send_port(&self) -> Result<&SendPort<T>, UsageError> {
        match self {
            SelectOutcome::Sent { port } => Ok(port),
            _ => Err(self.wrong("send port")),
        }
    }

    /// The port a value came in on, or an error if a send won.
    pub fn receive_port(&self) -> Result<&ReceivePort<T>, UsageError> {
        match self {
            SelectOutcome::Received { port, .. } => Ok(port),
            _ => Err(self.wrong("receive port")),
        }
    }

    /// The value that came in, or an error if a send won.
    pub fn received_value(&self) -> Result<&T, UsageError> {
        match self {
            SelectOutcome::Received { value, .. } => Ok(value),
            _ => Err(self.wrong("received value")),
        }
    }

    /// Take the value that came in, or an error if a send won.
    pub fn into_received_value(self) -> Result<T, UsageError> {
        match self {
            SelectOutcome::Received { value, .. } => Ok(value),
            SelectOutcome::Sent { .. } => Err(UsageError::WrongOutcome {
                accessor: "received value",
                actual: OutcomeKind::Sent,
            }),
        }
    }

    fn wrong(&self, accessor: &'static str) -> UsageError {
        UsageError::WrongOutcome { accessor, actual: self.kind() }
    }
}

/// Builder for a select which completes with a [`SelectOutcome`] rather than running a
/// per-option continuation
///
/// Has the same commitment and priority semantics as [`SelectBuilder`].
pub struct OutcomeBuilder<T>(SelectBuilder<SelectOutcome<T>>);

impl<T: Clone + Send + 'static> OutcomeBuilder<T> {
    /// Construct with no options.
    pub fn new() -> Self {
        OutcomeBuilder(SelectBuilder::new())
    }

    /// Add an option to send `value` on `port`.
    pub fn send(self, port: &SendPort<T>, value: T) -> Self {
        let outcome = SelectOutcome::Sent { port: port.clone() };
        OutcomeBuilder(self.0.send(port, value, move || Async::unit(outcome)))
    }

    /// Add an option to receive on `port`.
    pub fn receive(self, port: &ReceivePort<T>) -> Self {
        let port_2 = port.clone();
        OutcomeBuilder(self.0.receive(port, move |value| {
            Async::unit(SelectOutcome::Received { port: port_2, value })
        }))
    }

    /// Finish building the select into an action.
    pub fn build(self) -> Async<SelectOutcome<T>> {
        self.0.build()
    }
}

impl<T: Clone + Send + 'static> Default for OutcomeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for OutcomeBuilder<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("OutcomeBuilder").field(&self.0).finish()
    }
}

/// Begin building a select which completes with a [`SelectOutcome`].
pub fn select_outcome<T: Clone + Send + 'static>() -> OutcomeBuilder<T> {
    OutcomeBuilder::new()
}
