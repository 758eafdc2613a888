//! Typed local port indices.
//!
//! A system refers to its own ports by position in the order its
//! [`SystemSpec`](jf_graph::SystemSpec) declares them. The type parameter
//! records what the port carries so reads and writes need no annotations.

use core::fmt;
use core::marker::PhantomData;

pub struct InputSlot<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> InputSlot<T> {
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for InputSlot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InputSlot<T> {}

impl<T> fmt::Debug for InputSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputSlot({})", self.index)
    }
}

pub struct OutputSlot<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> OutputSlot<T> {
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for OutputSlot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OutputSlot<T> {}

impl<T> fmt::Debug for OutputSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputSlot({})", self.index)
    }
}
