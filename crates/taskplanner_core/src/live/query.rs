//! Live query handles and subscriptions.
//!
//! # Responsibility
//! - Drive one query per [`LiveQuery`] and multicast its snapshots.
//! - Re-evaluate on relevant change notices and, for scoped queries, on
//!   scope changes (the current profile switching).
//!
//! # Invariants
//! - A subscriber first receives the latest snapshot (if any), then every
//!   snapshot published after it subscribed.
//! - Each relevant committed mutation yields exactly one re-evaluation.
//! - When every handle and subscription is dropped the driver is aborted.

use crate::db::Database;
use crate::live::bus::Table;
use log::warn;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

/// One query result, or the displayable reason it could not be produced.
pub type Snapshot<T> = Result<Arc<T>, String>;

const NO_RUNTIME_MESSAGE: &str = "live queries require a running tokio runtime";

/// Multicast handle to a continuously re-evaluated query.
///
/// Cloning shares the same driver; every clone observes the same snapshots.
pub struct LiveQuery<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    state: Mutex<SharedState<T>>,
    driver: Mutex<Option<AbortHandle>>,
    capacity: usize,
}

struct SharedState<T> {
    latest: Option<Snapshot<T>>,
    sender: broadcast::Sender<Snapshot<T>>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}

/// Write side held by a driver task. Holds only a weak reference so the
/// driver never keeps its own query alive.
struct Publisher<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Publisher<T> {
    /// Stores and broadcasts `snapshot`. Returns `false` once nobody is
    /// listening any more.
    fn publish(&self, snapshot: Snapshot<T>) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut state = shared.state.lock();
        state.latest = Some(snapshot.clone());
        let _ = state.sender.send(snapshot);
        true
    }
}

impl<T: Send + Sync + 'static> LiveQuery<T> {
    /// Starts a live query over `tables`.
    ///
    /// `query` runs once immediately and again after every committed
    /// mutation touching one of `tables`.
    pub fn spawn<F, E>(db: &Database, tables: &'static [Table], query: F) -> Self
    where
        F: Fn(&Database) -> Result<T, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let db = db.clone();
        let capacity = db.change_buffer();
        Self::with_driver(capacity, move |publisher| {
            drive(
                publisher,
                db,
                tables,
                (),
                None,
                Arc::new(move |db: &Database, _: ()| query(db)),
            )
        })
    }

    /// Starts a live query that also re-evaluates whenever `scope` changes.
    ///
    /// This is the dependent re-subscription used for current-profile
    /// scoping: `query` receives the scope value current at evaluation time.
    pub fn spawn_scoped<S, F, E>(
        db: &Database,
        tables: &'static [Table],
        scope: watch::Receiver<S>,
        query: F,
    ) -> Self
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(&Database, S) -> Result<T, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let db = db.clone();
        let capacity = db.change_buffer();
        Self::with_driver(capacity, move |publisher| {
            let mut scope = scope;
            let initial = scope.borrow_and_update().clone();
            drive(publisher, db, tables, initial, Some(scope), Arc::new(query))
        })
    }

    /// Subscribes to this query's snapshots.
    pub fn subscribe(&self) -> Subscription<T> {
        let state = self.shared.state.lock();
        Subscription {
            pending: state.latest.clone(),
            receiver: state.sender.subscribe(),
            _shared: Arc::clone(&self.shared),
        }
    }

    /// Latest published snapshot, `None` while the first evaluation runs.
    pub fn latest(&self) -> Option<Snapshot<T>> {
        self.shared.state.lock().latest.clone()
    }

    fn with_driver<D, Fut>(capacity: usize, driver: D) -> Self
    where
        D: FnOnce(Publisher<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let shared = Arc::new(Shared {
            state: Mutex::new(SharedState {
                latest: None,
                sender,
            }),
            driver: Mutex::new(None),
            capacity,
        });
        let publisher = Publisher {
            shared: Arc::downgrade(&shared),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(driver(publisher));
                *shared.driver.lock() = Some(handle.abort_handle());
            }
            Err(_) => {
                warn!("event=live_query_start module=live status=error error_code=no_runtime");
                publisher.publish(Err(NO_RUNTIME_MESSAGE.to_string()));
            }
        }

        Self { shared }
    }
}

/// Receiving side of a [`LiveQuery`].
pub struct Subscription<T> {
    pending: Option<Snapshot<T>>,
    receiver: broadcast::Receiver<Snapshot<T>>,
    _shared: Arc<Shared<T>>,
}

impl<T> Subscription<T> {
    /// Waits for the next snapshot.
    ///
    /// A subscriber that fell behind skips to the newest buffered snapshot.
    pub async fn recv(&mut self) -> Option<Snapshot<T>> {
        if let Some(snapshot) = self.pending.take() {
            return Some(snapshot);
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event=live_subscription module=live status=lagged skipped={skipped}");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Derives a live query recomputed whenever either upstream emits.
///
/// Nothing is emitted until both upstreams have produced a snapshot. An
/// upstream error is forwarded as the combined snapshot.
pub fn combine_latest<A, B, C, F>(
    left: &LiveQuery<A>,
    right: &LiveQuery<B>,
    combine: F,
) -> LiveQuery<C>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    C: Send + Sync + 'static,
    F: Fn(&A, &B) -> C + Send + Sync + 'static,
{
    let mut left_sub = left.subscribe();
    let mut right_sub = right.subscribe();
    let capacity = left.shared.capacity.max(right.shared.capacity);

    LiveQuery::with_driver(capacity, move |publisher| async move {
        let mut left_value: Option<Snapshot<A>> = None;
        let mut right_value: Option<Snapshot<B>> = None;
        loop {
            tokio::select! {
                next = left_sub.recv() => match next {
                    Some(snapshot) => left_value = Some(snapshot),
                    None => return,
                },
                next = right_sub.recv() => match next {
                    Some(snapshot) => right_value = Some(snapshot),
                    None => return,
                },
            }

            let (Some(left), Some(right)) = (left_value.as_ref(), right_value.as_ref()) else {
                continue;
            };
            let snapshot = match (left, right) {
                (Ok(a), Ok(b)) => Ok(Arc::new(combine(a, b))),
                (Err(message), _) | (_, Err(message)) => Err(message.clone()),
            };
            if !publisher.publish(snapshot) {
                return;
            }
        }
    })
}

async fn drive<T, S, F, E>(
    publisher: Publisher<T>,
    db: Database,
    tables: &'static [Table],
    initial: S,
    mut scope: Option<watch::Receiver<S>>,
    query: Arc<F>,
) where
    T: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    F: Fn(&Database, S) -> Result<T, E> + Send + Sync + 'static,
    E: Display,
{
    // Subscribe before the first evaluation so no commit slips between.
    let mut changes = db.subscribe_changes();
    let mut scope_value = initial;

    loop {
        if let Some(receiver) = scope.as_mut() {
            scope_value = receiver.borrow_and_update().clone();
        }
        let snapshot = evaluate(&db, &query, scope_value.clone()).await;
        if !publisher.publish(snapshot) {
            return;
        }

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) if change.touches(tables) => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("event=live_query module=live status=lagged skipped={skipped}");
                        break;
                    }
                    Err(RecvError::Closed) => return,
                },
                changed = scope_changed(&mut scope) => {
                    if changed {
                        break;
                    }
                    // Scope owner is gone; keep following table changes only.
                    scope = None;
                }
            }
        }
    }
}

async fn scope_changed<S>(scope: &mut Option<watch::Receiver<S>>) -> bool {
    match scope.as_mut() {
        Some(receiver) => receiver.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

async fn evaluate<T, S, F, E>(db: &Database, query: &Arc<F>, scope: S) -> Snapshot<T>
where
    T: Send + Sync + 'static,
    S: Send + 'static,
    F: Fn(&Database, S) -> Result<T, E> + Send + Sync + 'static,
    E: Display,
{
    let db = db.clone();
    let query = Arc::clone(query);
    let result = tokio::task::spawn_blocking(move || {
        query(&db, scope)
            .map(Arc::new)
            .map_err(|err| err.to_string())
    })
    .await;

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => {
            warn!("event=live_query module=live status=error error={message}");
            Err(message)
        }
        Err(err) => Err(format!("live query evaluation failed: {err}")),
    }
}
