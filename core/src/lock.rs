//! Reader/writer locking.
//!
//! [`ReadWriteLock`] lets many readers in at once or a single writer. The
//! thread holding the write lock may acquire it again (read or write) without
//! blocking on itself. A thread holding only a read lock must not ask for the
//! write lock; that never succeeds.

use parking_lot::{Condvar, Mutex, RwLock};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: Option<ThreadId>,
    /// Nested acquisitions held by `writer`.
    depth: usize,
}

#[derive(Debug, Default)]
pub struct ReadWriteLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until no other thread holds the write lock.
    pub fn read(&self) -> ReadGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            state.depth += 1;
            return ReadGuard { lock: self, nested: true };
        }
        while state.writer.is_some() {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
        ReadGuard { lock: self, nested: false }
    }

    /// Blocks until every reader and every other writer has released.
    pub fn write(&self) -> WriteGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            state.depth += 1;
            return WriteGuard { lock: self };
        }
        while state.writer.is_some() || state.readers > 0 {
            self.changed.wait(&mut state);
        }
        state.writer = Some(me);
        state.depth = 1;
        WriteGuard { lock: self }
    }

    /// Number of threads currently holding a read lock.
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.changed.notify_all();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.depth -= 1;
        if state.depth == 0 {
            state.writer = None;
            self.changed.notify_all();
        }
    }
}

#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a ReadWriteLock,
    nested: bool,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if self.nested {
            self.lock.release_write();
        } else {
            self.lock.release_read();
        }
    }
}

#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a ReadWriteLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

/// Locking strategy chosen when a guarded structure is constructed.
pub trait LockPolicy: Default {
    type Read<'a>
    where
        Self: 'a;
    type Write<'a>
    where
        Self: 'a;

    fn read(&self) -> Self::Read<'_>;
    fn write(&self) -> Self::Write<'_>;
}

/// No synchronisation beyond the value's own cell; for task-local use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLock;

impl LockPolicy for NoLock {
    type Read<'a> = ();
    type Write<'a> = ();

    fn read(&self) {}
    fn write(&self) {}
}

impl LockPolicy for ReadWriteLock {
    type Read<'a> = ReadGuard<'a>;
    type Write<'a> = WriteGuard<'a>;

    fn read(&self) -> ReadGuard<'_> {
        ReadWriteLock::read(self)
    }

    fn write(&self) -> WriteGuard<'_> {
        ReadWriteLock::write(self)
    }
}

/// A value whose every access goes through a [`LockPolicy`]. The value sits
/// in a parking_lot `RwLock` taken after the policy lock, so the policy decides
/// who may enter and the inner lock only hands out the reference.
///
/// Closures passed to [`Guarded::read`] and [`Guarded::write`] must not touch
/// the same `Guarded` again; the inner lock is not reentrant.
pub(crate) struct Guarded<T, L: LockPolicy> {
    lock: L,
    value: RwLock<T>,
}

impl<T, L: LockPolicy> Guarded<T, L> {
    pub(crate) fn new(value: T) -> Self {
        Self { lock: L::default(), value: RwLock::new(value) }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let _guard = self.lock.read();
        let value = self.value.read();
        f(&value)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.lock.write();
        let mut value = self.value.write();
        f(&mut value)
    }

    pub(crate) fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    #[test]
    fn readers_share_the_lock() {
        let lock = Arc::new(ReadWriteLock::new());
        let barrier = Arc::new(Barrier::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let _r = lock.read();
                    // every reader must be inside at the same time to get past this
                    barrier.wait();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lock.readers(), 0);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = Arc::new(ReadWriteLock::new());
        let inside = Arc::new(AtomicBool::new(false));
        let w = lock.write();
        let reader = {
            let lock = lock.clone();
            let inside = inside.clone();
            thread::spawn(move || {
                let _r = lock.read();
                inside.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!inside.load(Ordering::SeqCst));
        drop(w);
        reader.join().unwrap();
        assert!(inside.load(Ordering::SeqCst));
    }

    #[test]
    fn writer_waits_for_readers() {
        let lock = Arc::new(ReadWriteLock::new());
        let r = lock.read();
        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let lock = lock.clone();
            let done = done.clone();
            thread::spawn(move || {
                let _w = lock.write();
                done.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));
        drop(r);
        writer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn write_lock_is_reentrant_for_its_owner() {
        let lock = ReadWriteLock::new();
        let outer = lock.write();
        let inner = lock.write();
        let read = lock.read();
        drop(inner);
        drop(read);
        assert!(lock.is_write_locked());
        drop(outer);
        assert!(!lock.is_write_locked());
        let _again = lock.write();
    }

    #[test]
    fn release_happens_on_panic() {
        let lock = Arc::new(ReadWriteLock::new());
        let l = lock.clone();
        let res = thread::spawn(move || {
            let _w = l.write();
            panic!("boom");
        })
        .join();
        assert!(res.is_err());
        assert!(!lock.is_write_locked());
        let _r = lock.read();
    }

    #[test]
    fn guarded_counter_under_contention() {
        let counter = Arc::new(Guarded::<usize, ReadWriteLock>::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.write(|c| *c += 1);
                        assert!(counter.read(|c| *c) > 0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.read(|c| *c), 8000);
    }

    #[test]
    fn guarded_value_is_usable_after_a_panicking_writer() {
        let guarded = Arc::new(Guarded::<Vec<u32>, ReadWriteLock>::new(vec![1]));
        let writer = guarded.clone();
        let outcome = thread::spawn(move || {
            writer.write(|v| {
                v.push(2);
                panic!("writer failed");
            })
        })
        .join();
        assert!(outcome.is_err());
        assert_eq!(guarded.read(|v| v.clone()), vec![1, 2]);
        guarded.write(|v| v.push(3));
        assert_eq!(guarded.read(|v| v.len()), 3);
        assert!(!guarded.lock.is_write_locked());
    }
}
