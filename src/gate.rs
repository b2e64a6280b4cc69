// CLASSIFICATION: COMMUNITY
// Filename: gate.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Mutual exclusion over a configure → setup-argument → launch sequence.
//!
//! The three calls arrive as separate C entry points, so an ordinary lock
//! guard cannot span them. The gate instead records which thread owns the
//! sequence in flight. Other threads block in [`LaunchGate::acquire`] until
//! the owner calls [`LaunchGate::release`]. A thread that configures and
//! never launches holds the gate until it does.

use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("launch gate lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
pub struct LaunchGate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl LaunchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership for the calling thread. Re-entrant for the owner.
    pub fn acquire(&self) -> Result<(), GateError> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| GateError::Poisoned)?;
        while let Some(current) = *owner {
            if current == me {
                return Ok(());
            }
            owner = self.released.wait(owner).map_err(|_| GateError::Poisoned)?;
        }
        *owner = Some(me);
        Ok(())
    }

    /// Give up ownership if the calling thread holds it.
    pub fn release(&self) -> Result<(), GateError> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| GateError::Poisoned)?;
        if *owner == Some(me) {
            *owner = None;
            self.released.notify_all();
        }
        Ok(())
    }

    /// Drop ownership regardless of which thread holds it and wake waiters.
    pub fn clear(&self) {
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner = None;
        self.released.notify_all();
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.owner.lock().ok().and_then(|owner| *owner)
    }
}
