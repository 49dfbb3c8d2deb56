//! Time-bounded table of requests awaiting a response

use super::CorrelationId;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{instrument, trace};
use uuid::Uuid;

type ResponseSlot = oneshot::Sender<Option<String>>;

/// Future resolving to the body of a response or `None` if no response arrived in time
///
/// It may be cloned freely, every clone resolves to the same value.
#[derive(Clone)]
pub struct ResponseFuture {
    correlation_id: CorrelationId,
    inner: Shared<BoxFuture<'static, Option<String>>>,
}

impl ResponseFuture {
    fn new(correlation_id: CorrelationId, rx: oneshot::Receiver<Option<String>>) -> Self {
        // A dropped sender means the entry was withdrawn or the table is gone
        let inner = rx.map(|result| result.unwrap_or(None)).boxed().shared();

        Self {
            correlation_id,
            inner,
        }
    }

    /// Correlation id of the request this future belongs to
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

impl Future for ResponseFuture {
    type Output = Option<String>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_unpin(cx)
    }
}

#[derive(Default)]
struct TableState {
    slots: HashMap<CorrelationId, ResponseSlot>,
    // Ordered by deadline since every entry shares the same time-to-live.
    // May contain ids which have been resolved already.
    deadlines: VecDeque<(Instant, CorrelationId)>,
}

/// Associative cache from correlation ids to unresolved responses
///
/// Every entry expires a fixed duration after insertion. Entries still unresolved at that point are
/// completed with `None` so no [`ResponseFuture`] is left hanging. Expiry is performed by
/// [`expire`](Self::expire), which [`reap`](Self::reap) calls whenever the earliest deadline passes.
pub struct PendingRequestTable {
    timeout: Duration,
    state: Mutex<TableState>,
    armed: Notify,
}

impl PendingRequestTable {
    /// Creates a new, empty table whose entries live for the given duration
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: Mutex::new(TableState::default()),
            armed: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new entry under a freshly generated correlation id
    pub fn create(&self) -> (CorrelationId, ResponseFuture) {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + self.timeout;

        let mut state = self.state();

        let mut id = Uuid::new_v4();
        while state.slots.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let was_idle = state.deadlines.is_empty();
        state.slots.insert(id, tx);
        state.deadlines.push_back((deadline, id));
        drop(state);

        if was_idle {
            self.armed.notify_one();
        }

        (id, ResponseFuture::new(id, rx))
    }

    /// Completes the entry for the given id with a value
    ///
    /// Returns whether an entry has been found. Resolving an id which has already been
    /// resolved, expired or never existed has no effect.
    pub fn resolve(&self, id: &CorrelationId, value: String) -> bool {
        let slot = self.state().slots.remove(id);

        match slot {
            Some(slot) => {
                // The requester may have lost interest, that is fine
                slot.send(Some(value)).ok();
                true
            }
            None => false,
        }
    }

    /// Removes an entry without delivering a value, its future resolves to `None`
    pub fn withdraw(&self, id: &CorrelationId) -> bool {
        self.state().slots.remove(id).is_some()
    }

    /// Evicts all entries whose deadline has passed and returns how many were still unresolved
    pub fn expire(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state();
        let mut expired = 0;

        while let Some(&(deadline, id)) = state.deadlines.front() {
            if deadline > now {
                break;
            }

            state.deadlines.pop_front();

            if let Some(slot) = state.slots.remove(&id) {
                slot.send(None).ok();
                expired += 1;
            }
        }

        expired
    }

    /// Earliest deadline currently armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state().deadlines.front().map(|(deadline, _)| *deadline)
    }

    /// Number of requests still awaiting a response
    pub fn len(&self) -> usize {
        self.state().slots.len()
    }

    /// Whether no request is awaiting a response
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time-to-live of entries
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Expires entries as their deadlines pass, never returns
    #[instrument(skip(self), fields(timeout = ?self.timeout))]
    pub async fn reap(&self) {
        loop {
            match self.next_deadline() {
                Some(deadline) => sleep_until(deadline).await,
                None => self.armed.notified().await,
            }

            let expired = self.expire();
            if expired > 0 {
                trace!(expired, "Pending requests timed out");
            }
        }
    }
}
