//! Create and get ceremonies.
//!
//! Both operations run the same lifecycle: `idle -> started -> completed | stopped`. Whatever
//! ends the operation first (a result, an error event, cancellation or the lifetime timer) settles
//! it; everything after that is ignored.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle};

use crate::WebAuthnError;

mod create;
mod get;

pub use self::{create::CreateOperation, get::GetOperation};

type Outcome<T> = Result<T, WebAuthnError>;

/// Lifecycle shared by [`CreateOperation`] and [`GetOperation`].
pub(crate) struct Lifecycle<T> {
    state: Mutex<State<T>>,
    lifetime: Duration,
}

struct State<T> {
    started: bool,
    stopped: bool,
    completion: Option<oneshot::Sender<Outcome<T>>>,
    timer: Option<JoinHandle<()>>,
}

/// Proof that the caller won the race to settle an operation.
pub(crate) struct Settled<T>(Option<oneshot::Sender<Outcome<T>>>);

impl<T> Settled<T> {
    pub(crate) fn dispatch(self, outcome: Outcome<T>) {
        if let Some(completion) = self.0 {
            if completion.send(outcome).is_err() {
                log::debug!("operation result dropped, nobody is waiting for it");
            }
        }
    }
}

impl<T> Lifecycle<T> {
    pub(crate) fn new(lifetime: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                started: false,
                stopped: false,
                completion: None,
                timer: None,
            }),
            lifetime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Move to `started`, or fail with [`WebAuthnError::BadOperation`] when already started or
    /// stopped.
    pub(crate) fn begin(&self) -> Result<oneshot::Receiver<Outcome<T>>, WebAuthnError> {
        let mut state = self.lock();
        if state.stopped {
            log::debug!("operation already stopped");
            return Err(WebAuthnError::BadOperation);
        }
        if state.started {
            log::debug!("operation already started");
            return Err(WebAuthnError::BadOperation);
        }
        let (tx, rx) = oneshot::channel();
        state.started = true;
        state.completion = Some(tx);
        Ok(rx)
    }

    pub(crate) fn arm_timer(&self, timer: JoinHandle<()>) {
        let mut state = self.lock();
        if state.stopped {
            timer.abort();
        } else if let Some(previous) = state.timer.replace(timer) {
            previous.abort();
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub(crate) fn is_running(&self) -> bool {
        let state = self.lock();
        state.started && !state.stopped
    }

    /// Move to `stopped` and hand out the completion, unless the operation never started or
    /// already stopped.
    pub(crate) fn settle(&self) -> Option<Settled<T>> {
        let mut state = self.lock();
        if !state.started {
            log::debug!("operation not started");
            return None;
        }
        if state.stopped {
            log::debug!("operation already stopped");
            return None;
        }
        state.stopped = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        Some(Settled(state.completion.take()))
    }
}

/// Await the completion handed out by [`Lifecycle::begin`].
pub(crate) async fn outcome<T>(rx: oneshot::Receiver<Outcome<T>>) -> Outcome<T> {
    rx.await.map_err(|_| WebAuthnError::Unknown)?
}
