use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::Result;

type SharedCall<V> = Shared<BoxFuture<'static, Result<V>>>;

/// What happens to other keys' entries when a call comes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eviction {
    /// Entries live until they expire.
    #[default]
    KeepAll,
    /// Every call drops all entries except its own key, so only the newest
    /// distinct call stays joinable.
    Latest,
}

struct Entry<V> {
    call: SharedCall<V>,
    inserted_at: Instant,
}

impl<V: Clone> Entry<V> {
    /// Pending calls are always live. Failures are only shared while pending.
    fn is_live(&self, max_age: Duration, now: Instant) -> bool {
        match self.call.peek() {
            None => true,
            Some(Ok(_)) => now.duration_since(self.inserted_at) < max_age,
            Some(Err(_)) => false,
        }
    }
}

/// In-flight call cache: callers presenting the same key share one
/// underlying invocation and observe the same result.
pub struct Coalescer<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, Entry<V>>>,
    max_age: Duration,
    eviction: Eviction,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    /// Zero max age: only concurrent calls coalesce, settled results are
    /// never served again.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            max_age: Duration::ZERO,
            eviction: Eviction::KeepAll,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_eviction(mut self, eviction: Eviction) -> Self {
        self.eviction = eviction;
        self
    }

    /// Join the live call for `key`, or spawn `producer` and record it so
    /// later callers can join it. Must be called within a tokio runtime.
    pub async fn get_or_compute<F, Fut>(&self, key: K, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let call = self.join_or_start(key, producer);
        call.await
    }

    fn join_or_start<F, Fut>(&self, key: K, producer: F) -> SharedCall<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match self.eviction {
            Eviction::Latest => entries.retain(|k, _| *k == key),
            Eviction::KeepAll => entries.retain(|_, e| e.is_live(self.max_age, now)),
        }

        if let Some(entry) = entries.get(&key)
            && entry.is_live(self.max_age, now)
        {
            trace!(cache = self.name, ?key, "joining cached call");
            return entry.call.clone();
        }

        trace!(cache = self.name, ?key, "starting call");
        let call = producer().boxed().shared();
        // Driven by its own task: once dispatched, the call settles even if
        // every caller stops waiting.
        tokio::spawn(call.clone());
        entries.insert(
            key,
            Entry {
                call: call.clone(),
                inserted_at: now,
            },
        );
        call
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of tracked entries, including settled ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> fmt::Debug for Coalescer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("name", &self.name)
            .field("entries", &self.entries.lock().len())
            .field("max_age", &self.max_age)
            .field("eviction", &self.eviction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn gate() -> Arc<Semaphore> {
        Arc::new(Semaphore::new(0))
    }

    fn gated(
        calls: &Arc<AtomicUsize>,
        gate: &Arc<Semaphore>,
        value: u32,
    ) -> impl Future<Output = Result<u32>> + Send + 'static {
        let calls = calls.clone();
        let gate = gate.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await;
            Ok(value)
        }
    }

    fn immediate(calls: &Arc<AtomicUsize>) -> impl Future<Output = Result<u32>> + Send + 'static {
        let calls = calls.clone();
        async move { Ok(calls.fetch_add(1, Ordering::SeqCst) as u32 + 1) }
    }

    async fn release(gate: &Semaphore) {
        tokio::task::yield_now().await;
        gate.add_permits(16);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_invocation() {
        let coalescer: Coalescer<&str, u32> = Coalescer::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate();

        let (a, b, ()) = tokio::join!(
            coalescer.get_or_compute("k", || gated(&calls, &gate, 1)),
            coalescer.get_or_compute("k", || gated(&calls, &gate, 2)),
            release(&gate),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settled_result_not_reused_without_max_age() {
        let coalescer: Coalescer<(), u32> = Coalescer::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coalescer.get_or_compute((), || immediate(&calls)).await.unwrap();
        let second = coalescer.get_or_compute((), || immediate(&calls)).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn max_age_serves_settled_value_until_expiry() {
        let coalescer: Coalescer<(), u32> =
            Coalescer::new("test").with_max_age(Duration::from_secs(3600));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(coalescer.get_or_compute((), || immediate(&calls)).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(coalescer.get_or_compute((), || immediate(&calls)).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(coalescer.get_or_compute((), || immediate(&calls)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_shared_while_pending_only() {
        let coalescer: Coalescer<(), u32> =
            Coalescer::new("test").with_max_age(Duration::from_secs(3600));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate();

        let failing = || {
            let calls = calls.clone();
            let gate = gate.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _permit = gate.acquire().await;
                Err::<u32, _>(Error::UnexpectedStatus {
                    path: "v1/test".to_string(),
                    status: 500,
                    expected: 200,
                })
            }
        };

        let (a, b, ()) = tokio::join!(
            coalescer.get_or_compute((), failing),
            coalescer.get_or_compute((), failing),
            release(&gate),
        );
        assert!(matches!(a, Err(Error::UnexpectedStatus { status: 500, .. })));
        assert!(matches!(b, Err(Error::UnexpectedStatus { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let retried = coalescer.get_or_compute((), || immediate(&calls)).await;
        assert_eq!(retried.unwrap(), 2);
    }

    #[tokio::test]
    async fn latest_eviction_keeps_only_newest_key() {
        let coalescer: Coalescer<&str, u32> = Coalescer::new("test").with_eviction(Eviction::Latest);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate();

        let (a, b, a_again, ()) = tokio::join!(
            coalescer.get_or_compute("a", || gated(&calls, &gate, 1)),
            coalescer.get_or_compute("b", || gated(&calls, &gate, 2)),
            coalescer.get_or_compute("a", || gated(&calls, &gate, 3)),
            release(&gate),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(a_again.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(coalescer.len(), 1);
    }

    #[tokio::test]
    async fn keep_all_tracks_keys_independently() {
        let coalescer: Coalescer<&str, u32> = Coalescer::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate();

        let (a, b, a_again, ()) = tokio::join!(
            coalescer.get_or_compute("a", || gated(&calls, &gate, 1)),
            coalescer.get_or_compute("b", || gated(&calls, &gate, 2)),
            coalescer.get_or_compute("a", || gated(&calls, &gate, 3)),
            release(&gate),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(a_again.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_new_call() {
        let coalescer: Coalescer<(), u32> =
            Coalescer::new("test").with_max_age(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        coalescer.get_or_compute((), || immediate(&calls)).await.unwrap();
        coalescer.invalidate(&());
        assert!(coalescer.is_empty());
        assert_eq!(coalescer.get_or_compute((), || immediate(&calls)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dispatched_call_survives_dropped_caller() {
        let coalescer: Coalescer<(), u32> = Coalescer::new("test");
        let gate = gate();
        let finished = Arc::new(AtomicBool::new(false));

        let producer = {
            let gate = gate.clone();
            let finished = finished.clone();
            move || async move {
                let _permit = gate.acquire().await;
                finished.store(true, Ordering::SeqCst);
                Ok(7)
            }
        };
        let waited =
            tokio::time::timeout(Duration::from_millis(10), coalescer.get_or_compute((), producer))
                .await;
        assert!(waited.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        gate.add_permits(1);
        for _ in 0..10 {
            if finished.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(finished.load(Ordering::SeqCst));

        let calls = Arc::new(AtomicUsize::new(0));
        let next = coalescer.get_or_compute((), || immediate(&calls)).await;
        assert_eq!(next.unwrap(), 1);
    }
}
