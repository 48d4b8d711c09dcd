//! The async-attribution tracker (component C8): attributes awaited work
//! to the logical chain that requested it, so a flow can answer "what
//! requests have I (transitively) awaited so far".
//!
//! Each logical chain owns a tracked-value list behind `Arc`. Spawning
//! (or simply awaiting) further async work inside a chain inherits the
//! same `Arc` — a copy-on-write reference, in the sense that the child
//! only actually diverges into its own list when it's run through
//! [`disconnected`] or [`shared`], not on every await. `track` appends an
//! identity (a request trace id, typically) to the *current* chain;
//! `awaited` snapshots it. Chains are also registered into a process-wide
//! table by weak reference, so a finished chain's tracked list is dropped
//! as soon as nothing else holds its `Arc`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, Weak};
use std::future::Future;

use tokio::sync::Semaphore;

/// Identifies one logical chain (a top-level ask, or a nested flow step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(u64);

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

fn next_chain_id() -> ChainId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    ChainId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

struct ChainState {
    id: ChainId,
    tracked: Mutex<Vec<String>>,
}

type ChainHandle = std::sync::Arc<ChainState>;

fn registry() -> &'static Mutex<BTreeMap<ChainId, Weak<ChainState>>> {
    static REGISTRY: OnceLock<Mutex<BTreeMap<ChainId, Weak<ChainState>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(BTreeMap::new()))
}

fn new_chain(register: bool) -> ChainHandle {
    let handle = std::sync::Arc::new(ChainState {
        id: next_chain_id(),
        tracked: Mutex::new(Vec::new()),
    });
    if register {
        registry()
            .lock()
            .unwrap()
            .insert(handle.id, std::sync::Arc::downgrade(&handle));
    }
    handle
}

tokio::task_local! {
    static CURRENT: ChainHandle;
}

/// Run `fut` inside a brand-new root chain. Every `pardon` entry point
/// (a CLI invocation, a flow's outermost step) should be wrapped in this.
pub async fn root_scope<F: Future>(fut: F) -> F::Output {
    let chain = new_chain(true);
    CURRENT.scope(chain, fut).await
}

/// Record `value` (an identity — typically a request trace id) in the
/// current chain's tracked set. A no-op outside any tracked scope.
pub fn track(value: impl Into<String>) {
    let value = value.into();
    let _ = CURRENT.try_with(|chain| {
        let mut tracked = chain.tracked.lock().unwrap();
        if !tracked.contains(&value) {
            tracked.push(value);
        }
    });
}

/// Merge `values` into the current chain, preserving the order they're
/// given in and skipping any already present — this is how a caller
/// folds a just-awaited sub-chain's [`awaited`] set into its own
/// (Testable Property 7: `awaited(A) ⊇ tracks(B) ∪ tracks(A)` once A has
/// awaited B).
pub fn track_all(values: impl IntoIterator<Item = String>) {
    for v in values {
        track(v);
    }
}

/// Snapshot everything tracked in the current chain so far, in the order
/// it was tracked.
pub fn awaited() -> Vec<String> {
    CURRENT
        .try_with(|chain| chain.tracked.lock().unwrap().clone())
        .unwrap_or_default()
}

/// The current chain's id, if inside a tracked scope.
pub fn current_chain_id() -> Option<ChainId> {
    CURRENT.try_with(|chain| chain.id).ok()
}

/// Run `fut` in a fresh, fully isolated chain: it does not inherit the
/// caller's tracked values, and nothing it tracks is visible afterward —
/// not even by chain id lookup.
pub async fn disconnected<F: Future>(fut: F) -> F::Output {
    let chain = new_chain(false);
    CURRENT.scope(chain, fut).await
}

/// Run `fut` in a fresh chain that starts empty but, unlike
/// [`disconnected`], stays registered for external introspection by
/// [`ChainId`] — used for reusable sub-flows whose own `awaited` set a
/// caller may want to inspect later without it polluting the caller's
/// own tracking.
pub async fn shared<F: Future>(fut: F) -> F::Output {
    let chain = new_chain(true);
    CURRENT.scope(chain, fut).await
}

/// Look up a registered chain's tracked set by id, if it's still alive.
pub fn awaited_by(id: ChainId) -> Option<Vec<String>> {
    let weak = registry().lock().unwrap().get(&id).cloned()?;
    let chain = weak.upgrade()?;
    Some(chain.tracked.lock().unwrap().clone())
}

/// A concurrency gate: tasks run through it get independent tracking —
/// none of them inherit the caller's chain, and they don't inherit each
/// other's either.
pub struct Gate {
    semaphore: Semaphore,
}

impl Gate {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Semaphore::new(permits),
        }
    }

    /// Acquire a permit, then run `fut` in its own disconnected chain.
    pub async fn run<F, Fut>(&self, make_fut: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        disconnected(make_fut()).await
    }
}

/// Convenience constructor matching the spec's `semaphore(n)` name.
pub fn semaphore(n: usize) -> Gate {
    Gate::new(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_and_awaited_within_scope() {
        root_scope(async {
            track("req-1");
            track("req-2");
            assert_eq!(awaited(), vec!["req-1".to_string(), "req-2".to_string()]);
        })
        .await;
    }

    #[tokio::test]
    async fn test_track_is_noop_outside_scope() {
        track("stray");
        assert_eq!(awaited(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_disconnected_does_not_inherit_or_publish() {
        root_scope(async {
            track("outer");
            disconnected(async {
                assert!(awaited().is_empty());
                track("inner");
            })
            .await;
            // the outer chain never saw "inner" tracked
            assert_eq!(awaited(), vec!["outer".to_string()]);
        })
        .await;
    }

    #[tokio::test]
    async fn test_tracker_union_property_7() {
        // Chain B tracks its own request, then chain A awaits B and
        // folds B's tracked set into its own.
        let b_tracked = shared(async {
            track("b-request");
            awaited()
        })
        .await;

        root_scope(async move {
            track("a-request");
            track_all(b_tracked.clone());
            let a_awaited = awaited();
            assert!(a_awaited.contains(&"a-request".to_string()));
            assert!(a_awaited.contains(&"b-request".to_string()));
        })
        .await;
    }

    #[tokio::test]
    async fn test_shared_chain_stays_registered_for_lookup() {
        let mut seen_id = None;
        shared(async {
            seen_id = current_chain_id();
            track("shared-request");
        })
        .await;
        let id = seen_id.unwrap();
        assert_eq!(awaited_by(id), Some(vec!["shared-request".to_string()]));
    }

    #[tokio::test]
    async fn test_semaphore_tasks_get_independent_tracking() {
        let gate = semaphore(2);
        root_scope(async {
            track("caller");
            gate.run(|| async {
                assert!(awaited().is_empty());
                track("gated-task");
                awaited()
            })
            .await;
            // the caller's own tracking is untouched by the gated task
            assert_eq!(awaited(), vec!["caller".to_string()]);
        })
        .await;
    }
}
