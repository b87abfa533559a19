//! Keyed coalescing of concurrent async work.
//!
//! When several tasks request the same work (identified by key) at the
//! same time, only the first caller (the leader) runs the closure; the
//! others (followers) wait on the leader's completion latch and receive a
//! clone of its result — including its error, when the result type is a
//! `Result`.
//!
//! The key is deregistered only after the leader finishes, so a request
//! arriving after completion runs the closure afresh: results are not
//! cached here, only concurrent duplication is suppressed.
//!
//! If a leader is cancelled mid-flight (its future dropped), the call is
//! deregistered and waiting followers race to take over as the new
//! leader, so nobody waits on a latch that will never fire.

use ahash::AHashMap;
use event_listener::Event;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

/// One in-flight call: a completion latch plus the leader's result.
struct Call<V> {
    result: OnceLock<V>,
    done: Event,
}

impl<V> Call<V> {
    fn new() -> Self {
        Self {
            result: OnceLock::new(),
            done: Event::new(),
        }
    }
}

/// A space of keyed work units with duplicate suppression.
pub struct Group<K, V> {
    calls: Mutex<AHashMap<K, Arc<Call<V>>>>,
}

impl<K, V> Default for Group<K, V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(AHashMap::new()),
        }
    }
}

impl<K, V> Group<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or wait for the execution already in flight.
    ///
    /// At most one execution of `work` runs concurrently per key across
    /// the whole group. Every caller observes the same result.
    pub async fn work<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        enum Role<V> {
            Leader(Arc<Call<V>>),
            Follower(Arc<Call<V>>),
        }

        let mut work = Some(work);

        loop {
            let role = {
                let mut calls = self.calls.lock();
                match calls.get(&key).cloned() {
                    Some(call) => Role::Follower(call),
                    None => {
                        let call = Arc::new(Call::new());
                        calls.insert(key.clone(), call.clone());
                        Role::Leader(call)
                    }
                }
            };

            match role {
                Role::Leader(call) => {
                    // Deregisters the key and wakes followers even if
                    // this future is dropped before the work completes.
                    let guard = LeaderGuard {
                        group: self,
                        key: &key,
                        call: &call,
                    };
                    let value = (work.take().expect("leader ran twice"))().await;
                    let _ = call.result.set(value.clone());
                    drop(guard);
                    return value;
                }
                Role::Follower(call) => {
                    // Register the listener before checking the slot so a
                    // completion between the two cannot be missed.
                    let listener = call.done.listen();
                    if let Some(value) = call.result.get() {
                        return value.clone();
                    }
                    listener.await;
                    if let Some(value) = call.result.get() {
                        return value.clone();
                    }
                    // The leader vanished without a result; retry. One of
                    // the waiters becomes the new leader.
                }
            }
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Removes the call record and wakes followers when the leader finishes
/// or is dropped.
struct LeaderGuard<'a, K: Eq + Hash, V> {
    group: &'a Group<K, V>,
    key: &'a K,
    call: &'a Arc<Call<V>>,
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut calls = self.group.calls.lock();
        if let Some(current) = calls.get(self.key)
            && Arc::ptr_eq(current, self.call)
        {
            calls.remove(self.key);
        }
        drop(calls);
        self.call.done.notify(usize::MAX);
    }
}
