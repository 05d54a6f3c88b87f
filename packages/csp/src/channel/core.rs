// the unbuffered rendezvous channel.

use super::token::{Party, Match, rendezvous};
use crate::util::slot::Slot;
use std::{
    collections::VecDeque,
    cmp::max,
    fmt::{self, Display, Formatter},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering::Relaxed},
    },
};
use parking_lot::Mutex;
use smallvec::SmallVec;


// pending queues are swept of done entries whenever they reach their mark, after which the mark
// becomes twice the surviving length, but never less than this.
const MIN_PRUNE_MARK: usize = 16;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);


/// Process-unique identity of a channel.
///
/// Ports to the same channel compare equal by this.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    fn mint() -> Self {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Relaxed))
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}


// a select option offering to send value.
struct SendEntry<T> {
    party: Party,
    value: T,
}

// a select option offering to receive into slot.
struct RecvEntry<T> {
    party: Party,
    slot: Arc<Slot<T>>,
}

trait Entry {
    fn party(&self) -> &Party;
}

impl<T> Entry for SendEntry<T> {
    fn party(&self) -> &Party {
        &self.party
    }
}

impl<T> Entry for RecvEntry<T> {
    fn party(&self) -> &Party {
        &self.party
    }
}

// the part of the channel behind the mutex.
struct Lockable<T> {
    senders: VecDeque<SendEntry<T>>,
    receivers: VecDeque<RecvEntry<T>>,
    senders_prune_mark: usize,
    receivers_prune_mark: usize,
}

// channel with no capacity, on which every send is a rendezvous with a receive.
//
// each side holds a fifo of pending offers. an arriving offer walks the opposite fifo from the
// front, attempting to match against each entry, until it commits a match or finds its own select
// already done. if it does neither it joins the back of its own side's fifo.
pub(crate) struct Channel<T> {
    id: ChannelId,
    lockable: Mutex<Lockable<T>>,
}

impl<T> Channel<T> {
    pub(crate) fn new() -> Self {
        Channel {
            id: ChannelId::mint(),
            lockable: Mutex::new(Lockable {
                senders: VecDeque::new(),
                receivers: VecDeque::new(),
                senders_prune_mark: MIN_PRUNE_MARK,
                receivers_prune_mark: MIN_PRUNE_MARK,
            }),
        }
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    // offer to send value on behalf of party. returns whether the offer matched immediately.
    //
    // if it didn't, and party's select is not yet done, the offer stays pending until a receive
    // matches it.
    pub(crate) fn send(&self, party: Party, value: T) -> bool {
        let mut lock = self.lockable.lock();
        let mut value = Some(value);
        let mut skipped = SmallVec::<[RecvEntry<T>; 2]>::new();
        let mut matched = false;

        while let Some(peer) = lock.receivers.pop_front() {
            if peer.party.same_select(&party) {
                skipped.push(peer);
                continue;
            }
            let outcome = rendezvous(&party, &peer.party, || {
                if let Some(value) = value.take() {
                    peer.slot.put(value);
                }
            });
            match outcome {
                Match::Matched => {
                    matched = true;
                    break;
                }
                // stale receiver, discard it and keep looking
                Match::ReceiverDone => (),
                Match::SenderDone => {
                    lock.receivers.push_front(peer);
                    break;
                }
                Match::BothDone => break,
            }
        }
        for peer in skipped.into_iter().rev() {
            lock.receivers.push_front(peer);
        }

        if matched {
            trace!(channel = %self.id, "send matched pending receive");
        } else if let Some(value) = value {
            if !party.token.is_done() {
                let lock = &mut *lock;
                prune(&mut lock.senders, &mut lock.senders_prune_mark);
                lock.senders.push_back(SendEntry { party, value });
                trace!(channel = %self.id, pending = lock.senders.len(), "send pending");
            }
        }
        matched
    }

    // offer to receive into slot on behalf of party. returns whether the offer matched
    // immediately, in which case the slot has been filled.
    //
    // if it didn't, and party's select is not yet done, the offer stays pending until a send
    // matches it and fills the slot.
    pub(crate) fn receive(&self, party: Party, slot: Arc<Slot<T>>) -> bool {
        let mut lock = self.lockable.lock();
        let mut skipped = SmallVec::<[SendEntry<T>; 2]>::new();
        let mut matched = false;

        while let Some(peer) = lock.senders.pop_front() {
            if peer.party.same_select(&party) {
                skipped.push(peer);
                continue;
            }
            let SendEntry { party: peer, value } = peer;
            let mut value = Some(value);
            let outcome = rendezvous(&peer, &party, || {
                if let Some(value) = value.take() {
                    slot.put(value);
                }
            });
            match outcome {
                Match::Matched => {
                    matched = true;
                    break;
                }
                // stale sender, discard it and keep looking
                Match::SenderDone => (),
                Match::ReceiverDone => {
                    if let Some(value) = value {
                        lock.senders.push_front(SendEntry { party: peer, value });
                    }
                    break;
                }
                Match::BothDone => break,
            }
        }
        for peer in skipped.into_iter().rev() {
            lock.senders.push_front(peer);
        }

        if matched {
            trace!(channel = %self.id, "receive matched pending send");
        } else if !party.token.is_done() {
            let lock = &mut *lock;
            prune(&mut lock.receivers, &mut lock.receivers_prune_mark);
            lock.receivers.push_back(RecvEntry { party, slot });
            trace!(channel = %self.id, pending = lock.receivers.len(), "receive pending");
        }
        matched
    }

    #[cfg(test)]
    fn pending(&self) -> (usize, usize) {
        let lock = self.lockable.lock();
        (lock.senders.len(), lock.receivers.len())
    }
}

// if the queue has reached its mark, drop entries whose select is already done and raise the mark.
fn prune<E: Entry>(queue: &mut VecDeque<E>, mark: &mut usize) {
    if queue.len() >= *mark {
        let before = queue.len();
        queue.retain(|entry| !entry.party().token.is_done());
        *mark = max(MIN_PRUNE_MARK, queue.len() * 2);
        trace!(pruned = before - queue.len(), remaining = queue.len(), "pruned pending queue");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::token::Token,
        exec::{PoolConfig, WorkerPool},
    };
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pool() -> WorkerPool {
        WorkerPool::new(PoolConfig::default().with_worker_threads(2)).unwrap()
    }

    #[test]
    fn ids_distinct() {
        assert_ne!(Channel::<()>::new().id(), Channel::<()>::new().id());
    }

    #[test]
    fn send_then_receive() {
        let pool = pool();
        let channel = Channel::new();
        let sender = Token::new(pool.exec());
        let receiver = Token::new(pool.exec());
        assert!(!channel.send(Party::new(&sender, 0), "hello"));
        assert_eq!(channel.pending(), (1, 0));

        let slot = Arc::new(Slot::empty());
        assert!(channel.receive(Party::new(&receiver, 2), Arc::clone(&slot)));
        assert_eq!(slot.take(), Some("hello"));
        assert_eq!(channel.pending(), (0, 0));
        assert_eq!(sender.fired().block_timeout(TIMEOUT), Ok(0));
        assert_eq!(receiver.fired().block_timeout(TIMEOUT), Ok(2));
    }

    #[test]
    fn receive_then_send() {
        let pool = pool();
        let channel = Channel::new();
        let receiver = Token::new(pool.exec());
        let slot = Arc::new(Slot::empty());
        assert!(!channel.receive(Party::new(&receiver, 0), Arc::clone(&slot)));
        assert_eq!(slot.take(), None);
        assert!(channel.send(Party::new(&Token::new(pool.exec()), 0), 5));
        assert_eq!(slot.take(), Some(5));
    }

    #[test]
    fn pending_sends_match_in_order() {
        let pool = pool();
        let channel = Channel::new();
        for i in 0..3 {
            channel.send(Party::new(&Token::new(pool.exec()), 0), i);
        }
        for i in 0..3 {
            let slot = Arc::new(Slot::empty());
            assert!(channel.receive(Party::new(&Token::new(pool.exec()), 0), Arc::clone(&slot)));
            assert_eq!(slot.take(), Some(i));
        }
    }

    #[test]
    fn stale_offers_skipped() {
        let pool = pool();
        let channel = Channel::new();
        let other = Channel::new();
        // a select offering on both channels, which then matches on the other one
        let stale = Token::new(pool.exec());
        channel.send(Party::new(&stale, 0), "stale");
        other.send(Party::new(&stale, 1), "other");
        assert!(other.receive(Party::new(&Token::new(pool.exec()), 0), Arc::new(Slot::empty())));

        channel.send(Party::new(&Token::new(pool.exec()), 0), "fresh");
        let slot = Arc::new(Slot::empty());
        assert!(channel.receive(Party::new(&Token::new(pool.exec()), 0), Arc::clone(&slot)));
        assert_eq!(slot.take(), Some("fresh"));
        assert_eq!(channel.pending(), (0, 0));
    }

    #[test]
    fn own_select_not_matched() {
        let pool = pool();
        let channel = Channel::new();
        let token = Token::new(pool.exec());
        assert!(!channel.send(Party::new(&token, 0), 1));
        let slot = Arc::new(Slot::empty());
        assert!(!channel.receive(Party::new(&token, 1), Arc::clone(&slot)));
        assert_eq!(channel.pending(), (1, 1));
        assert!(!token.is_done());

        // a third party still matches the skipped send first
        let slot_2 = Arc::new(Slot::empty());
        assert!(channel.receive(Party::new(&Token::new(pool.exec()), 0), Arc::clone(&slot_2)));
        assert_eq!(slot_2.take(), Some(1));
        assert_eq!(token.fired().block_timeout(TIMEOUT), Ok(0));
    }

    #[test]
    fn done_select_not_enqueued() {
        let pool = pool();
        let channel = Channel::new();
        let token = Token::new(pool.exec());
        channel.send(Party::new(&token, 0), 1);
        assert!(channel.receive(Party::new(&Token::new(pool.exec()), 0), Arc::new(Slot::empty())));
        assert!(!channel.send(Party::new(&token, 1), 2));
        assert_eq!(channel.pending(), (0, 0));
    }

    #[test]
    fn done_entries_pruned() {
        let pool = pool();
        let channel = Channel::new();
        let other = Channel::new();
        for i in 0..MIN_PRUNE_MARK * 4 {
            let token = Token::new(pool.exec());
            channel.send(Party::new(&token, 0), i);
            other.send(Party::new(&token, 1), i);
            assert!(other.receive(Party::new(&Token::new(pool.exec()), 0), Arc::new(Slot::empty())));
        }
        let (senders, _) = channel.pending();
        assert!(senders <= MIN_PRUNE_MARK, "{} stale entries retained", senders);
    }
}
