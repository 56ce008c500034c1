//! Counting semaphore with a close flag, used to hand a shared slot back and forth.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::ChannelError;

#[derive(Debug)]
struct State {
    count: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            state: Mutex::new(State {
                count: initial,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for a permit and take it. Fails once the semaphore is closed and drained.
    pub fn acquire(&self) -> Result<(), ChannelError> {
        let mut state = self
            .available
            .wait_while(self.lock(), |s| s.count == 0 && !s.closed)
            .unwrap_or_else(|e| e.into_inner());
        if state.count == 0 {
            return Err(ChannelError::Disconnected);
        }
        state.count -= 1;
        Ok(())
    }

    /// Return one permit and wake one waiter.
    pub fn release(&self) {
        self.lock().count += 1;
        self.available.notify_one();
    }

    /// No more permits will be released; wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn permits(&self) -> usize {
        self.lock().count
    }
}
