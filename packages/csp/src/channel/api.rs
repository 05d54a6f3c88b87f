// exposed API of channels

use super::{
    core::{Channel, ChannelId},
    select::select,
    buffered,
};
use crate::{
    exec::Exec,
    io::{Async, Promise},
};
use std::{
    fmt::{self, Formatter, Debug},
    hash::{Hash, Hasher},
    sync::Arc,
};


// ==== ports ====


/// Capability to send on a channel
///
/// Cloning a `SendPort` clones a handle to the same channel. Ports compare equal if they refer to
/// the same channel.
pub struct SendPort<T> {
    channel: Arc<Channel<T>>,
}

impl<T> SendPort<T> {
    pub(crate) fn new(channel: Arc<Channel<T>>) -> Self {
        SendPort { channel }
    }

    pub(crate) fn channel(&self) -> &Arc<Channel<T>> {
        &self.channel
    }

    /// Identity of the channel this sends on.
    pub fn id(&self) -> ChannelId {
        self.channel.id()
    }
}

impl<T: Send + 'static> SendPort<T> {
    /// Action that sends `value` on this channel, completing once it has been received (or, for a
    /// buffered channel, once it has been buffered).
    pub fn send(&self, value: T) -> Async<()> {
        select().send(self, value, || Async::unit(())).build()
    }
}

/// Capability to receive from a channel
///
/// Cloning a `ReceivePort` clones a handle to the same channel. Ports compare equal if they refer
/// to the same channel.
pub struct ReceivePort<T> {
    channel: Arc<Channel<T>>,
}

impl<T> ReceivePort<T> {
    pub(crate) fn new(channel: Arc<Channel<T>>) -> Self {
        ReceivePort { channel }
    }

    pub(crate) fn channel(&self) -> &Arc<Channel<T>> {
        &self.channel
    }

    /// Identity of the channel this receives from.
    pub fn id(&self) -> ChannelId {
        self.channel.id()
    }
}

impl<T: Clone + Send + 'static> ReceivePort<T> {
    /// Action that receives a value from this channel, completing once one arrives.
    ///
    /// The value is delivered through a [`Promise`], which hands a clone to each of its callbacks,
    /// so only `Clone` values can be received. To pass something that can't be cloned, such as a
    /// one-shot reply handle or a boxed `FnOnce`, wrap it in a shared cell like
    /// `Arc<Mutex<Option<_>>>` and take it out on the receiving side.
    pub fn receive(&self) -> Async<T> {
        select().receive(self, Async::unit).build()
    }
}

macro_rules! port_impls {
    ($port:ident) => {
        impl<T> Clone for $port<T> {
            fn clone(&self) -> Self {
                $port { channel: Arc::clone(&self.channel) }
            }
        }

        impl<T> Debug for $port<T> {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                f.debug_tuple(stringify!($port)).field(&self.id()).finish()
            }
        }

        impl<T> PartialEq for $port<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id() == other.id()
            }
        }

        impl<T> Eq for $port<T> {}

        impl<T> Hash for $port<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id().hash(state)
            }
        }
    };
}

port_impls!(SendPort);
port_impls!(ReceivePort);


// ==== handle ====


/// A send port and a receive port for one logical channel
///
/// For an unbuffered channel both ports refer to the same rendezvous channel. For a buffered
/// channel they refer to the two ends of a buffer process, and so have different ids.
pub struct ChannelHandle<T> {
    send_port: SendPort<T>,
    receive_port: ReceivePort<T>,
}

impl<T> ChannelHandle<T> {
    /// Construct a new unbuffered channel.
    pub fn unbuffered() -> Self {
        let channel = Arc::new(Channel::new());
        ChannelHandle::from_ports(SendPort::new(Arc::clone(&channel)), ReceivePort::new(channel))
    }

    pub(crate) fn from_ports(send_port: SendPort<T>, receive_port: ReceivePort<T>) -> Self {
        ChannelHandle { send_port, receive_port }
    }

    /// Capability to send on this channel.
    pub fn send_port(&self) -> &SendPort<T> {
        &self.send_port
    }

    /// Capability to receive from this channel.
    pub fn receive_port(&self) -> &ReceivePort<T> {
        &self.receive_port
    }

    /// Split into ports.
    pub fn into_ports(self) -> (SendPort<T>, ReceivePort<T>) {
        (self.send_port, self.receive_port)
    }
}

impl<T> Clone for ChannelHandle<T> {
    fn clone(&self) -> Self {
        ChannelHandle {
            send_port: self.send_port.clone(),
            receive_port: self.receive_port.clone(),
        }
    }
}

impl<T> Debug for ChannelHandle<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("send_port", &self.send_port)
            .field("receive_port", &self.receive_port)
            .finish()
    }
}


// ==== construction ====


/// Construct a channel with room for `capacity` values, or an unbuffered channel if `capacity`
/// is 0.
///
/// A buffered channel is run by a process on `exec`, which stops once all the channel's send
/// ports have been dropped and its buffer has drained, or once all its receive ports have been
/// dropped.
///
/// Values must be `Clone`, since receiving delivers them through a [`Promise`]. They must also be
/// `Sync`, since a buffered channel keeps them in a persistent queue whose versions share nodes
/// across threads. See [`ReceivePort::receive`] for passing values which are neither.
pub fn channel<T>(exec: &Exec, capacity: usize) -> ChannelHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    if capacity == 0 {
        ChannelHandle::unbuffered()
    } else {
        buffered::spawn(exec, capacity)
    }
}

/// Action that constructs a channel, like [`channel`], on the executor it is run on.
pub fn new_channel<T>(capacity: usize) -> Async<ChannelHandle<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Async::new(move |exec| Promise::completed(exec, channel(exec, capacity)))
}
