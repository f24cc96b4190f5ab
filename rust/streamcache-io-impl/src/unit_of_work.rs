use std::sync::{Mutex, PoisonError};

use log::debug;
use streamcache_io::{CompletionCallback, Outcome, UnitOfWork};
use uuid::Uuid;

enum State {
    Running(Vec<CompletionCallback>),
    Done(Outcome),
}

/// A minimal unit of work: a list of completion callbacks run once by
/// [`done`](DefaultUnitOfWork::done).
///
/// A unit of work dropped before completion completes with
/// [`Outcome::Failure`], so registered cleanups always run.
pub struct DefaultUnitOfWork {
    id: Uuid,
    state: Mutex<State>,
}

impl DefaultUnitOfWork {
    pub fn new() -> DefaultUnitOfWork {
        DefaultUnitOfWork {
            id: Uuid::new_v4(),
            state: Mutex::new(State::Running(Vec::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.lock(), State::Done(_))
    }

    /// Number of callbacks waiting for completion.
    pub fn pending(&self) -> usize {
        match &*self.lock() {
            State::Running(callbacks) => callbacks.len(),
            State::Done(_) => 0,
        }
    }

    /// Completes the unit of work and runs every registered callback.
    ///
    /// Returns `false` if it had already completed, in which case nothing runs.
    pub fn done(&self, outcome: Outcome) -> bool {
        let callbacks = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, State::Done(outcome)) {
                State::Running(callbacks) => callbacks,
                previous @ State::Done(_) => {
                    *state = previous;
                    return false;
                }
            }
        };
        debug!(
            "unit of work {} done ({outcome:?}), running {} callbacks",
            self.id,
            callbacks.len()
        );
        for callback in callbacks {
            callback(outcome);
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DefaultUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultUnitOfWork")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

impl UnitOfWork for DefaultUnitOfWork {
    fn on_completion(&self, callback: CompletionCallback) {
        let outcome = match &mut *self.lock() {
            State::Running(callbacks) => {
                callbacks.push(callback);
                return;
            }
            State::Done(outcome) => *outcome,
        };
        callback(outcome);
    }
}

impl Drop for DefaultUnitOfWork {
    fn drop(&mut self) {
        self.done(Outcome::Failure);
    }
}
