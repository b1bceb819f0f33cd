//! Double-buffered observables.
//!
//! A writer in tick T never perturbs what its peers read in T: reads come
//! from the slot written in T−1, and the scheduler flips all buffers at the
//! barrier between the update and delivery phases.
//!
//! Two strategies, selected by [`MutexStrategy`] in the configuration:
//!
//! - [`Buffered`]: two slots and an index; readers never lock.
//! - [`Locked`]: the same two slots behind a mutex; cheaper when observables
//!   are large and read rarely.

use std::sync::Mutex;

use ms_core::MutexStrategy;

// ── Buffered ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Buffered<T> {
    slots: [T; 2],
    read: usize,
}

impl<T: Clone> Buffered<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: [initial.clone(), initial],
            read: 0,
        }
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.slots[self.read]
    }

    /// Store into the write slot; visible to readers only after `flip`.
    #[inline]
    pub fn set(&mut self, value: T) {
        self.slots[1 - self.read] = value;
    }

    #[inline]
    pub fn flip(&mut self) {
        self.read = 1 - self.read;
    }
}

// ── Locked ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Locked<T> {
    inner: Mutex<(T, T, usize)>,
}

impl<T: Clone> Locked<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new((initial.clone(), initial, 0)),
        }
    }

    pub fn get(&self) -> T {
        let g = self.inner.lock().unwrap();
        if g.2 == 0 { g.0.clone() } else { g.1.clone() }
    }

    pub fn set(&self, value: T) {
        let mut g = self.inner.lock().unwrap();
        if g.2 == 0 {
            g.1 = value;
        } else {
            g.0 = value;
        }
    }

    pub fn flip(&self) {
        let mut g = self.inner.lock().unwrap();
        g.2 = 1 - g.2;
    }
}

// ── Shared ────────────────────────────────────────────────────────────────────

/// Strategy-erased double buffer.
#[derive(Debug)]
pub enum Shared<T> {
    Buffered(Buffered<T>),
    Locked(Locked<T>),
}

impl<T: Clone> Shared<T> {
    pub fn new(strategy: MutexStrategy, initial: T) -> Self {
        match strategy {
            MutexStrategy::Buffered => Shared::Buffered(Buffered::new(initial)),
            MutexStrategy::Locked => Shared::Locked(Locked::new(initial)),
        }
    }

    /// Read the tick T−1 value.
    pub fn get(&self) -> T {
        match self {
            Shared::Buffered(b) => b.get().clone(),
            Shared::Locked(l) => l.get(),
        }
    }

    /// Write the tick T value (hidden until the flip).
    pub fn set(&mut self, value: T) {
        match self {
            Shared::Buffered(b) => b.set(value),
            Shared::Locked(l) => l.set(value),
        }
    }

    /// Overwrite both slots (dispatch and reap tombstones).
    pub fn force(&mut self, value: T) {
        match self {
            Shared::Buffered(b) => {
                b.set(value.clone());
                b.flip();
                b.set(value);
                b.flip();
            }
            Shared::Locked(l) => {
                l.set(value.clone());
                l.flip();
                l.set(value);
                l.flip();
            }
        }
    }

    pub fn flip(&mut self) {
        match self {
            Shared::Buffered(b) => b.flip(),
            Shared::Locked(l) => l.flip(),
        }
    }
}
