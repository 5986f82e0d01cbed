use crate::core::error::TransferError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum State<T> {
    Uninit,
    Ready(T),
    ShutDown,
}

/// Process-wide transport subsystem with explicit `init_once` / `shutdown_once` hooks.
///
/// The first `init_once` builds the shared handle; later calls hand out clones.
/// `shutdown_once` drops it exactly once, whether or not it was ever built.
pub struct TransportLifecycle<T> {
    state: Mutex<State<T>>,
    inits: AtomicUsize,
    teardowns: AtomicUsize,
}

impl<T: Clone> TransportLifecycle<T> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninit),
            inits: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
        }
    }

    pub fn init_once<F>(&self, build: F) -> Result<T, TransferError>
    where
        F: FnOnce() -> Result<T, TransferError>,
    {
        let mut state = self.lock();
        match &*state {
            State::Ready(handle) => Ok(handle.clone()),
            State::ShutDown => Err(TransferError::Setup("transport subsystem already shut down".to_string())),
            State::Uninit => {
                let handle = build()?;
                *state = State::Ready(handle.clone());
                self.inits.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("transport subsystem initialized");
                Ok(handle)
            }
        }
    }

    /// Returns `true` only for the call that performed the teardown.
    pub fn shutdown_once(&self) -> bool {
        let mut state = self.lock();
        if matches!(*state, State::ShutDown) {
            return false;
        }
        let was_ready = matches!(*state, State::Ready(_));
        *state = State::ShutDown;
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(was_ready, "transport subsystem shut down");
        true
    }

    pub fn shutdown_guard(&self) -> ShutdownGuard<'_, T> {
        ShutdownGuard { lifecycle: self }
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        // state is only written after a successful build
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Clone> Default for TransportLifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls `shutdown_once` when dropped.
pub struct ShutdownGuard<'a, T: Clone> {
    lifecycle: &'a TransportLifecycle<T>,
}

impl<T: Clone> Drop for ShutdownGuard<'_, T> {
    fn drop(&mut self) {
        self.lifecycle.shutdown_once();
    }
}
