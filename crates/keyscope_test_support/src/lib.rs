#![allow(clippy::result_large_err)]

pub mod containers;
pub mod fake_source;
pub mod fake_stream;
pub mod fixtures;
pub mod telemetry;

pub use fake_source::{FakeCall, FakeHashSource, FakeSourceStats, FakeZSetSource};
pub use fake_stream::FakeStreamApi;
pub use telemetry::{RecordedEvent, RecordingTelemetry};

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

pub(crate) fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

pub(crate) fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
