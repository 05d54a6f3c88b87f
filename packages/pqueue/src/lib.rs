//! Persistent (immutable, structure-sharing) FIFO queue and LIFO stack.
//!
//! The queue is the classic two-stack "banker's" construction: elements are pushed onto a back
//! stack and popped from a front stack, and the back stack is reversed into the front once the
//! front runs dry. Push and pop are amortized O(1) when versions are used linearly.

mod stack;

pub use crate::stack::{PersistentStack, Iter as StackIter};

use std::fmt::{self, Formatter, Debug};


/// Immutable FIFO queue whose versions share structure.
///
/// Every "mutating" operation returns a new queue and leaves `self` untouched. Cloning is O(1).
pub struct PersistentQueue<T> {
    // elements in pop order, top is the front of the queue.
    // invariant: if front is empty, back is empty too.
    front: PersistentStack<T>,
    // elements in reverse push order, top is the back of the queue.
    back: PersistentStack<T>,
}

impl<T> PersistentQueue<T> {
    /// Construct empty.
    pub const fn new() -> Self {
        PersistentQueue { front: PersistentStack::new(), back: PersistentStack::new() }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    /// Oldest element, if any.
    pub fn peek(&self) -> Option<&T> {
        self.front.peek()
    }

    /// New queue with `elem` appended after all elements of `self`.
    pub fn push(&self, elem: T) -> Self {
        if self.front.is_empty() {
            PersistentQueue { front: self.front.push(elem), back: PersistentStack::new() }
        } else {
            PersistentQueue { front: self.front.clone(), back: self.back.push(elem) }
        }
    }

    /// Iterate from oldest to newest by reference.
    pub fn iter(&self) -> impl Iterator<Item=&T> {
        let mut back = self.back.iter().collect::<Vec<_>>();
        back.reverse();
        self.front.iter().chain(back)
    }
}

impl<T: Clone> PersistentQueue<T> {
    /// New queue without the oldest element, or `None` if empty.
    pub fn pop(&self) -> Option<Self> {
        let front = self.front.pop()?;
        if front.is_empty() {
            Some(PersistentQueue { front: self.back.reversed(), back: PersistentStack::new() })
        } else {
            Some(PersistentQueue { front, back: self.back.clone() })
        }
    }
}

impl<T> Clone for PersistentQueue<T> {
    fn clone(&self) -> Self {
        PersistentQueue { front: self.front.clone(), back: self.back.clone() }
    }
}

impl<T> Default for PersistentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for PersistentQueue<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for PersistentQueue<T> {
    fn from_iter<I: IntoIterator<Item=T>>(iter: I) -> Self {
        iter.into_iter().fold(PersistentQueue::new(), |queue, elem| queue.push(elem))
    }
}
