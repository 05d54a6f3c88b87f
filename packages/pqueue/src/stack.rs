//! Persistent singly linked stack.

use std::{
    sync::Arc,
    fmt::{self, Formatter, Debug},
};


/// Immutable LIFO stack whose versions share structure.
///
/// Every "mutating" operation returns a new stack and leaves `self` untouched. Cloning is O(1).
pub struct PersistentStack<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

struct Node<T> {
    elem: T,
    next: Option<Arc<Node<T>>>,
}

impl<T> PersistentStack<T> {
    /// Construct empty.
    pub const fn new() -> Self {
        PersistentStack { head: None, len: 0 }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Top element, if any.
    pub fn peek(&self) -> Option<&T> {
        self.head.as_ref().map(|node| &node.elem)
    }

    /// New stack with `elem` on top of `self`.
    pub fn push(&self, elem: T) -> Self {
        PersistentStack {
            head: Some(Arc::new(Node { elem, next: self.head.clone() })),
            len: self.len + 1,
        }
    }

    /// New stack without the top element, or `None` if empty.
    pub fn pop(&self) -> Option<Self> {
        self.head.as_ref().map(|node| PersistentStack {
            head: node.next.clone(),
            len: self.len - 1,
        })
    }

    /// Iterate from top to bottom by reference.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { next: self.head.as_deref() }
    }
}

impl<T: Clone> PersistentStack<T> {
    /// New stack with the elements in reverse order.
    pub fn reversed(&self) -> Self {
        let mut reversed = PersistentStack::new();
        for elem in self.iter() {
            reversed = reversed.push(elem.clone());
        }
        reversed
    }
}

impl<T> Clone for PersistentStack<T> {
    fn clone(&self) -> Self {
        PersistentStack { head: self.head.clone(), len: self.len }
    }
}

impl<T> Default for PersistentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for PersistentStack<T> {
    fn drop(&mut self) {
        // unlink iteratively, so that dropping a long uniquely owned chain doesn't recurse once
        // per node. stop at the first node some other version still shares.
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T: Debug> Debug for PersistentStack<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over a [`PersistentStack`] from top to bottom.
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            &node.elem
        })
    }
}
