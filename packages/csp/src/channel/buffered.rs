// buffered channels, built from two rendezvous channels and a process between them.

use super::{
    api::{ChannelHandle, SendPort, ReceivePort},
    core::Channel,
    select::select,
};
use crate::{
    exec::Exec,
    io::Async,
};
use pqueue::PersistentQueue;
use std::{
    ops::ControlFlow,
    sync::{Arc, Weak},
};


// snapshot of a buffer process. transitions produce a new snapshot and never mutate.
#[derive(Debug, Clone)]
pub(crate) struct BufferState<T> {
    buffer: PersistentQueue<T>,
    size: usize,
    capacity: usize,
    // whether there is room to accept another value from a sender.
    sender_ready: bool,
    // whether there is a value to offer to a receiver.
    receiver_ready: bool,
}

impl<T: Clone> BufferState<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer with no capacity (internal bug)");
        BufferState {
            buffer: PersistentQueue::new(),
            size: 0,
            capacity,
            sender_ready: true,
            receiver_ready: false,
        }
    }

    // the oldest buffered value, which is what gets offered to receivers.
    pub(crate) fn head(&self) -> Option<&T> {
        self.buffer.peek()
    }

    // state after a sender handed over value.
    pub(crate) fn on_send(&self, value: T) -> Self {
        debug_assert!(self.sender_ready, "buffer accepted value while full (internal bug)");
        let size = self.size + 1;
        BufferState {
            buffer: self.buffer.push(value),
            size,
            capacity: self.capacity,
            sender_ready: size < self.capacity,
            receiver_ready: true,
        }
    }

    // state after a receiver took the head. None if there was no head.
    pub(crate) fn on_receive(&self) -> Option<Self> {
        let buffer = self.buffer.pop()?;
        let size = self.size - 1;
        Some(BufferState {
            buffer,
            size,
            capacity: self.capacity,
            sender_ready: true,
            receiver_ready: size > 0,
        })
    }
}

// construct a buffered channel and fork its process onto exec.
//
// the process holds both of its channels weakly. users hold the inbound channel through send
// ports and the outbound channel through receive ports, so the process stops once it finds the
// outbound channel gone, or finds the inbound channel gone and the buffer empty.
pub(crate) fn spawn<T>(exec: &Exec, capacity: usize) -> ChannelHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    let inbound = Arc::new(Channel::new());
    let outbound = Arc::new(Channel::new());
    debug!(inbound = %inbound.id(), outbound = %outbound.id(), capacity, "starting buffer process");

    let process = {
        let inbound = Arc::downgrade(&inbound);
        let outbound = Arc::downgrade(&outbound);
        Async::iterate(BufferState::new(capacity), move |state| step(&inbound, &outbound, state))
    };
    // the promise returned by running fork is already complete
    let _ = Async::fork(process).run(exec);

    ChannelHandle::from_ports(SendPort::new(inbound), ReceivePort::new(outbound))
}

// one round of a buffer process: wait for whichever of a sender or a receiver comes first, and
// transition accordingly. offering the head to receivers comes first in the select, so that when
// both are ready the buffer drains rather than fills.
fn step<T>(
    inbound: &Weak<Channel<T>>,
    outbound: &Weak<Channel<T>>,
    state: BufferState<T>,
) -> Async<ControlFlow<(), BufferState<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    let Some(outbound) = outbound.upgrade() else {
        debug!("buffer process stopping, receivers gone");
        return Async::unit(ControlFlow::Break(()));
    };
    let inbound = inbound.upgrade();
    if inbound.is_none() && !state.receiver_ready {
        debug!("buffer process stopping, senders gone and buffer drained");
        return Async::unit(ControlFlow::Break(()));
    }

    let mut options = select();
    if let Some(head) = state.head() {
        // pop only once the hand-off wins, so each snapshot is popped at most once
        let state = state.clone();
        options = options.send_on(&outbound, head.clone(), move || {
            let next = state
                .on_receive()
                .expect("buffer handed off from empty state (internal bug)");
            trace!(size = next.size, "buffer handed off value");
            Async::unit(ControlFlow::Continue(next))
        });
    }
    if let Some(inbound) = inbound.as_ref().filter(|_| state.sender_ready) {
        let state = state.clone();
        options = options.receive_on(inbound, move |value| {
            let next = state.on_send(value);
            trace!(size = next.size, "buffer took value");
            Async::unit(ControlFlow::Continue(next))
        });
    }
    options.build()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::api::channel,
        exec::{PoolConfig, WorkerPool},
        error::WouldBlockError,
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering::Relaxed},
        time::Duration,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);
    const SHORT: Duration = Duration::from_millis(100);

    fn pool() -> WorkerPool {
        WorkerPool::new(PoolConfig::default().with_worker_threads(4)).unwrap()
    }

    #[test]
    fn state_transitions() {
        let state = BufferState::new(2);
        assert!(state.sender_ready && !state.receiver_ready);
        assert!(state.on_receive().is_none());

        let state = state.on_send("a");
        assert!(state.sender_ready && state.receiver_ready);
        let state = state.on_send("b");
        assert!(!state.sender_ready && state.receiver_ready);
        assert_eq!(state.size, 2);
        assert_eq!(state.head(), Some(&"a"));

        let after = state.on_receive().unwrap();
        assert!(after.sender_ready && after.receiver_ready);
        assert_eq!(after.head(), Some(&"b"));
        // the old snapshot is unaffected
        assert_eq!(state.head(), Some(&"a"));

        let after = after.on_receive().unwrap();
        assert!(after.sender_ready && !after.receiver_ready);
        assert_eq!(after.size, 0);
    }

    #[test]
    fn size_one() {
        let pool = pool();
        let handle = channel(pool.exec(), 1);
        let (send, receive) = (handle.send_port(), handle.receive_port());

        assert_eq!(send.send(40).run(pool.exec()).block_timeout(TIMEOUT), Ok(()));
        assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok(40));

        assert_eq!(send.send(40).run(pool.exec()).block_timeout(TIMEOUT), Ok(()));
        let second = send.send(2).run(pool.exec());
        assert_eq!(second.block_timeout(SHORT), Err(WouldBlockError));
        assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok(40));
        assert_eq!(second.block_timeout(TIMEOUT), Ok(()));
        assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok(2));
    }

    #[test]
    fn size_two() {
        let pool = pool();
        let handle = channel(pool.exec(), 2);
        let (send, receive) = (handle.send_port(), handle.receive_port());
        assert_eq!(send.send("foo").run(pool.exec()).block_timeout(TIMEOUT), Ok(()));
        assert_eq!(send.send("bar").run(pool.exec()).block_timeout(TIMEOUT), Ok(()));
        assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok("foo"));
        assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok("bar"));
    }

    #[test]
    fn bounded_by_capacity() {
        const CAPACITY: u32 = 5;

        let pool = pool();
        let handle = channel(pool.exec(), CAPACITY as usize);
        for i in 0..CAPACITY {
            let sent = handle.send_port().send(i).run(pool.exec());
            assert_eq!(sent.block_timeout(TIMEOUT), Ok(()));
        }
        let over = handle.send_port().send(CAPACITY).run(pool.exec());
        assert_eq!(over.block_timeout(SHORT), Err(WouldBlockError));

        for i in 0..=CAPACITY {
            let received = handle.receive_port().receive().run(pool.exec());
            assert_eq!(received.block_timeout(TIMEOUT), Ok(i));
        }
        assert_eq!(over.block_timeout(TIMEOUT), Ok(()));
    }

    #[test]
    fn receive_before_send() {
        let pool = pool();
        let handle = channel(pool.exec(), 3);
        let received = handle.receive_port().receive().run(pool.exec());
        assert_eq!(received.block_timeout(SHORT), Err(WouldBlockError));
        handle.send_port().send(9).run(pool.exec());
        assert_eq!(received.block_timeout(TIMEOUT), Ok(9));
    }

    #[derive(Debug)]
    struct Counted(Arc<AtomicUsize>);

    impl Clone for Counted {
        fn clone(&self) -> Self {
            self.0.fetch_add(1, Relaxed);
            Counted(Arc::clone(&self.0))
        }
    }

    // filling must clone each value a constant number of times, not once per value behind it
    #[test]
    fn fill_clones_linear() {
        const CAPACITY: usize = 200;

        let pool = pool();
        let clones = Arc::new(AtomicUsize::new(0));
        let handle = channel(pool.exec(), CAPACITY);
        for _ in 0..CAPACITY {
            let sent = handle.send_port().send(Counted(Arc::clone(&clones))).run(pool.exec());
            assert!(sent.block_timeout(TIMEOUT).is_ok());
        }
        let over = handle.send_port().send(Counted(Arc::clone(&clones))).run(pool.exec());
        assert!(over.block_timeout(SHORT).is_err());

        let clones = clones.load(Relaxed);
        assert!(clones <= 2 * CAPACITY, "{} clones filling capacity {}", clones, CAPACITY);
    }

    #[test]
    fn drains_after_senders_dropped() {
        let pool = pool();
        let (send, receive) = channel(pool.exec(), 3).into_ports();
        for i in 0..3 {
            assert_eq!(send.send(i).run(pool.exec()).block_timeout(TIMEOUT), Ok(()));
        }
        drop(send);
        for i in 0..3 {
            assert_eq!(receive.receive().run(pool.exec()).block_timeout(TIMEOUT), Ok(i));
        }
        let received = receive.receive().run(pool.exec());
        assert_eq!(received.block_timeout(SHORT), Err(WouldBlockError));
    }
}
