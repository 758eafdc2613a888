//! Single-writer, many-reader double buffer.
//!
//! The writer fills the back slot and then flips an atomic index, so readers
//! always see a complete, previously published value. Each slot sits behind a
//! mutex. The writer only ever `try_lock`s the back slot: if a slow reader
//! still holds it, the publish is skipped and reported, and the writer never
//! blocks.
//!
//! [`DoubleBuffer::read`] does lock. A reader that loaded the front index just
//! before two quick publishes can find the writer filling that same slot and
//! waits for it. Readers on a real-time thread use
//! [`DoubleBuffer::try_read`] instead and keep what they had on contention.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [Mutex<T>; 2],
    front: AtomicUsize,
    version: AtomicU64,
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: [Mutex::new(initial.clone()), Mutex::new(initial)],
            front: AtomicUsize::new(0),
            version: AtomicU64::new(0),
        }
    }
}

impl<T> DoubleBuffer<T> {
    /// Write into the back slot and make it the front.
    ///
    /// Must only be called from one thread at a time. Returns `false` when a
    /// reader held the back slot and nothing was published.
    pub fn publish(&self, write: impl FnOnce(&mut T)) -> bool {
        let back = 1 - self.front.load(Ordering::Acquire);
        let mut guard = match self.slots[back].try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        write(&mut guard);
        drop(guard);
        self.front.store(back, Ordering::Release);
        self.version.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Read the most recently published value.
    pub fn read<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        let guard = self.front_guard();
        read(&guard)
    }

    /// Like [`read`](Self::read), but gives up instead of waiting when the
    /// writer holds the slot.
    pub fn try_read<R>(&self, read: impl FnOnce(&T) -> R) -> Option<R> {
        let front = self.front.load(Ordering::Acquire);
        let guard = match self.slots[front].try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(read(&guard))
    }

    /// Number of successful publishes so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn front_guard(&self) -> MutexGuard<'_, T> {
        let front = self.front.load(Ordering::Acquire);
        self.slots[front]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> DoubleBuffer<T> {
    /// Clone out the most recently published value.
    pub fn load(&self) -> T {
        self.read(T::clone)
    }
}
