//! The worker loop and the activation claim.

use crate::context::WorkerToken;
use crate::stats::WriterStats;
use crate::writer::task::Task;
use crossbeam::channel::Receiver;
use onewriter_store::Store;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Token id meaning "no worker is active".
pub(crate) const NO_WORKER: u64 = 0;

/// State shared between a writer and the workers it spawns.
#[derive(Debug, Default)]
pub(crate) struct WorkerState {
    /// True while a worker holds the activation claim.
    pub(crate) running: AtomicBool,
    /// Submitters registered for a hand-off whose task has not been received.
    pub(crate) queued: AtomicUsize,
    /// Token id of the active worker, or [`NO_WORKER`].
    pub(crate) current: AtomicU64,
    /// Worker threads spawned and not yet exited, claim or no claim.
    pub(crate) threads: AtomicUsize,
    /// Last token id handed out.
    last_token: AtomicU64,
    pub(crate) stats: WriterStats,
}

/// Proof that the holder is the single active worker.
///
/// Dropping it releases the claim, on every exit path of the worker,
/// unwinding included.
struct Activation<'a> {
    state: &'a WorkerState,
    token: WorkerToken,
}

impl<'a> Activation<'a> {
    fn claim(state: &'a WorkerState) -> Option<Self> {
        state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        let token = WorkerToken::new(state.last_token.fetch_add(1, Ordering::SeqCst) + 1);
        state.current.store(token.id(), Ordering::SeqCst);
        state.stats.record_activation();
        Some(Self { state, token })
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        // Clear the token first so a new claimer's token is never overwritten.
        self.state.current.store(NO_WORKER, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// Counts a worker thread until it exits.
struct LiveThread<'a>(&'a AtomicUsize);

impl Drop for LiveThread<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Body of a worker thread.
///
/// Exits at once if another worker holds the claim. Otherwise runs tasks
/// one at a time for as long as submitters are registered, then retires.
/// A submitter that registers while the worker is retiring is either seen
/// by the re-check below or sees the cleared flag and spawns a new worker.
pub(crate) fn run<S: Store>(state: Arc<WorkerState>, tasks: Receiver<Task<S>>) {
    let _live = LiveThread(&state.threads);
    let Some(mut activation) = Activation::claim(&state) else {
        state.stats.record_lost_claim();
        trace!("worker lost the activation claim");
        return;
    };
    debug!(token = %activation.token, "writer worker active");

    loop {
        while state.queued.load(Ordering::SeqCst) > 0 {
            // A registered submitter always sends, so this cannot park forever.
            let Ok(task) = tasks.recv() else {
                debug!("task queue closed");
                return;
            };
            state.queued.fetch_sub(1, Ordering::SeqCst);
            task.run(activation.token, &state.stats);
        }

        let token = activation.token;
        drop(activation);
        if state.queued.load(Ordering::SeqCst) == 0 {
            debug!(%token, "writer worker idle, retiring");
            return;
        }

        match Activation::claim(&state) {
            Some(next) => {
                trace!(token = %next.token, "worker reclaimed for late submitter");
                activation = next;
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let state = WorkerState::default();
        let first = Activation::claim(&state).unwrap();
        assert!(Activation::claim(&state).is_none());
        assert_eq!(state.current.load(Ordering::SeqCst), first.token.id());

        drop(first);
        assert!(!state.running.load(Ordering::SeqCst));
        assert_eq!(state.current.load(Ordering::SeqCst), NO_WORKER);
    }

    #[test]
    fn each_claim_mints_a_new_token() {
        let state = WorkerState::default();
        let a = Activation::claim(&state).unwrap().token;
        let b = Activation::claim(&state).unwrap().token;
        assert_ne!(a, b);
        assert_ne!(a.id(), NO_WORKER);
        assert_eq!(state.stats.activations(), 2);
    }
}
