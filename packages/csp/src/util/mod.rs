//! Low-level utility.

pub(crate) mod slot;
