// implementation of csp channels and select.
//
// the basic architecture is token matching in the style of concurrent ml. it is as such:
//
// every send or receive is a select, possibly with just one option. running a select
// creates one token for it, then offers each option on its channel in turn:
//
//       token {id, done, fired}
//          |
//          |------ id is unique and minted in increasing order. when two tokens must both be
//          |       locked, the lower id is always locked first, so concurrent matches can't
//          |       deadlock no matter which channels they're happening on.
//          |
//          |------ done flips to true exactly once, under the token's own lock, when one of its
//          |       options commits a match.
//          |
//          \------ fired is a promise completed with the index of the winning option at that
//                  same moment. the select's continuation hangs off of it.
//
// a channel is a mutex around two fifos of pending offers, one per side. an offer walks the
// opposite fifo trying to commit a match with each entry's token, and joins its own side's fifo
// if it can't. losing offers are never retracted. they're discarded whenever some later walk
// finds their token done, and swept periodically when a fifo grows.
//
// a buffered channel is two such channels, an inbound and an outbound, with a process in between
// which repeatedly selects over taking from inbound and offering its oldest value to outbound.
//
// the organization of these modules is as such:
//
//      token<---------core: The rendezvous channel. Safe, but only usable through tokens
//        ^            ^     and parties.
//        |            |
//        \--------select: Runs selects over cores and continues into their winning
//                     ^     continuations. Public builders.
//                     |
//      buffered<-----api: Ports and handles wrapping cores, and the channel constructors.
//                         The crate re-exports this API publically.

pub(crate) mod api;
pub(crate) mod select;

mod token;
mod core;
mod buffered;

pub use self::core::ChannelId;
