// select tokens and the deadlock-free matching of two tokens.

use crate::{
    exec::Exec,
    io::Promise,
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering::Relaxed},
};
use parking_lot::Mutex;


// source of token ids. only strict ordering matters, not contiguity.
static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(0);


// one participant of one select call, shared by every option that select registers.
pub(crate) struct Token {
    // unique. fixes the order in which two tokens' locks are acquired.
    id: u64,
    // transitions false -> true at most once, under this lock, as part of a committed match.
    done: Mutex<bool>,
    // completed with the index of the winning option when done becomes true.
    fired: Promise<usize>,
}

impl Token {
    pub(crate) fn new(exec: &Exec) -> Arc<Self> {
        Arc::new(Token {
            id: NEXT_TOKEN_ID.fetch_add(1, Relaxed),
            done: Mutex::new(false),
            fired: Promise::new(exec),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn fired(&self) -> &Promise<usize> {
        &self.fired
    }

    // whether some option of this token already won. once true, stays true.
    pub(crate) fn is_done(&self) -> bool {
        *self.done.lock()
    }
}

// a token together with which of its select's options a channel queue entry stands for.
pub(crate) struct Party {
    pub(crate) token: Arc<Token>,
    pub(crate) option: usize,
}

impl Party {
    pub(crate) fn new(token: &Arc<Token>, option: usize) -> Self {
        Party { token: Arc::clone(token), option }
    }

    // whether the two parties belong to the same select.
    pub(crate) fn same_select(&self, other: &Party) -> bool {
        self.token.id == other.token.id
    }
}

// result of attempting to match a sender with a receiver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Match {
    // both tokens were free, and are now done. the value has been handed off.
    Matched,
    // the sender's token was already done. no match.
    SenderDone,
    // the receiver's token was already done. no match.
    ReceiverDone,
    // both tokens were already done. no match.
    BothDone,
}

// attempt to commit a rendezvous between a sender and a receiver.
//
// both tokens' locks are held for the duration, acquired lower id first regardless of role. thus
// two matches running concurrently under different channel locks can never wait on each other
// in a cycle. if neither token is done, hand_off is called to move the value to the receiver,
// then both tokens fire with their option index and become done.
//
// panics if called with two parties of the same select.
pub(crate) fn rendezvous<F>(sender: &Party, receiver: &Party, hand_off: F) -> Match
where
    F: FnOnce(),
{
    assert!(!sender.same_select(receiver), "select matched against itself (internal bug)");

    let sender_first = sender.token.id < receiver.token.id;
    let (first, second) =
        if sender_first { (&sender.token, &receiver.token) }
        else { (&receiver.token, &sender.token) };
    let first_lock = first.done.lock();
    let second_lock = second.done.lock();
    let (mut sender_done, mut receiver_done) =
        if sender_first { (first_lock, second_lock) }
        else { (second_lock, first_lock) };

    match (*sender_done, *receiver_done) {
        (false, false) => {
            hand_off();
            let fired = sender.token.fired.try_deliver(sender.option);
            assert!(fired, "free sender token had already fired (internal bug)");
            let fired = receiver.token.fired.try_deliver(receiver.option);
            assert!(fired, "free receiver token had already fired (internal bug)");
            *sender_done = true;
            *receiver_done = true;
            Match::Matched
        }
        (true, false) => {
            assert_fired(&sender.token);
            Match::SenderDone
        }
        (false, true) => {
            assert_fired(&receiver.token);
            Match::ReceiverDone
        }
        (true, true) => {
            assert_fired(&sender.token);
            assert_fired(&receiver.token);
            Match::BothDone
        }
    }
}

// a token only becomes done through a committed match, which always fires it first.
fn assert_fired(token: &Token) {
    assert!(token.fired.is_completed(), "token done without a committed match (internal bug)");
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{PoolConfig, WorkerPool};
    use std::{
        thread,
        time::Duration,
        sync::atomic::AtomicUsize,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pool() -> WorkerPool {
        WorkerPool::new(PoolConfig::default().with_worker_threads(2)).unwrap()
    }

    #[test]
    fn ids_increase() {
        let pool = pool();
        let a = Token::new(pool.exec());
        let b = Token::new(pool.exec());
        assert!(a.id() < b.id());
    }

    #[test]
    fn match_fires_both() {
        let pool = pool();
        let sender = Party::new(&Token::new(pool.exec()), 3);
        let receiver = Party::new(&Token::new(pool.exec()), 1);
        let mut handed_off = false;
        assert_eq!(rendezvous(&sender, &receiver, || handed_off = true), Match::Matched);
        assert!(handed_off);
        assert!(sender.token.is_done() && receiver.token.is_done());
        assert_eq!(sender.token.fired().block_timeout(TIMEOUT), Ok(3));
        assert_eq!(receiver.token.fired().block_timeout(TIMEOUT), Ok(1));
    }

    #[test]
    fn done_tokens_do_not_match() {
        let pool = pool();
        let a = Party::new(&Token::new(pool.exec()), 0);
        let b = Party::new(&Token::new(pool.exec()), 0);
        let c = Party::new(&Token::new(pool.exec()), 0);
        let d = Party::new(&Token::new(pool.exec()), 0);
        assert_eq!(rendezvous(&a, &b, || ()), Match::Matched);

        let mut handed_off = false;
        assert_eq!(rendezvous(&a, &c, || handed_off = true), Match::SenderDone);
        assert_eq!(rendezvous(&c, &b, || handed_off = true), Match::ReceiverDone);
        assert_eq!(rendezvous(&b, &a, || handed_off = true), Match::BothDone);
        assert!(!handed_off);
        assert!(!c.token.is_done());
        assert_eq!(rendezvous(&c, &d, || ()), Match::Matched);
    }

    #[test]
    #[should_panic(expected = "select matched against itself")]
    fn self_match_panics() {
        let pool = pool();
        let token = Token::new(pool.exec());
        rendezvous(&Party::new(&token, 0), &Party::new(&token, 1), || ());
    }

    // many threads matching overlapping pairs in both roles and both id orders. a lock ordering
    // bug shows up as this test hanging.
    #[test]
    fn concurrent_matches_commit_each_token_once() {
        let pool = pool();
        let tokens = (0..64).map(|_| Token::new(pool.exec())).collect::<Vec<_>>();
        let matches = Arc::new(AtomicUsize::new(0));
        let joins = (0..8)
            .map(|t| {
                let tokens = tokens.clone();
                let matches = Arc::clone(&matches);
                thread::spawn(move || {
                    for i in 0..tokens.len() {
                        let j = (i * 7 + t * 13 + 1) % tokens.len();
                        if i == j {
                            continue;
                        }
                        let (s, r) = if t % 2 == 0 { (i, j) } else { (j, i) };
                        let sender = Party::new(&tokens[s], s);
                        let receiver = Party::new(&tokens[r], r);
                        if rendezvous(&sender, &receiver, || ()) == Match::Matched {
                            matches.fetch_add(1, Relaxed);
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for join in joins {
            join.join().unwrap();
        }
        let done = tokens.iter().filter(|token| token.is_done()).count();
        assert_eq!(done, matches.load(Relaxed) * 2);
    }
}
