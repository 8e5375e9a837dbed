//! Per-key lookup bookkeeping.
//!
//! A request lives from the first `find_*` call for a key until its result
//! is delivered. Every attempt (the first query and each retry) carries the
//! same [`CorrelationToken`], so a late answer to an earlier attempt still
//! completes the request.
//!
//! # Lifecycle
//!
//! ```text
//!   find_*  ──► Pending ──reply──────────────► Finished
//!                 │  ▲                             ▲
//!              timeout│retry (budget left)         │
//!                 ▼  │                             │
//!               (re-send) ──budget exhausted───────┘
//! ```
//!
//! Adapter requests add a quorum phase: once a replica-group member answers,
//! the timeout is shortened to the quorum window and the next timer firing
//! merges what was collected instead of retrying.

use std::time::Duration;

use crate::timer::TimerHandle;
use crate::types::{AdapterId, CorrelationToken, Identity, ServiceReference};

/// Callback receiving the outcome of a lookup. `None` means not found.
pub type ResolveCallback = Box<dyn FnOnce(Option<ServiceReference>) + Send + 'static>;

/// State shared by both request kinds.
pub(crate) struct Request<K> {
    key: K,
    token: CorrelationToken,
    retries_remaining: u32,
    waiters: Vec<ResolveCallback>,
    timer: Option<TimerHandle>,
    /// Timer-clock reading taken when the current attempt was sent.
    sent_at: Duration,
}

impl<K> Request<K> {
    fn new(key: K, retry_count: u32) -> Self {
        Self {
            key,
            token: CorrelationToken::random(),
            retries_remaining: retry_count,
            waiters: Vec::new(),
            timer: None,
            sent_at: Duration::ZERO,
        }
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    pub(crate) fn token(&self) -> CorrelationToken {
        self.token
    }

    pub(crate) fn matches(&self, token: &CorrelationToken) -> bool {
        self.token == *token
    }

    /// Register a waiter. Returns true for the first one.
    pub(crate) fn add_waiter(&mut self, callback: ResolveCallback) -> bool {
        self.waiters.push(callback);
        self.waiters.len() == 1
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn mark_sent(&mut self, now: Duration) {
        self.sent_at = now;
    }

    pub(crate) fn sent_at(&self) -> Duration {
        self.sent_at
    }

    /// Replace the armed timeout, cancelling the previous one.
    pub(crate) fn arm(&mut self, handle: TimerHandle) {
        if let Some(previous) = self.timer.replace(handle) {
            previous.cancel();
        }
    }

    /// Consume one retry from the budget, if any is left.
    pub(crate) fn take_retry(&mut self) -> bool {
        if self.retries_remaining == 0 {
            return false;
        }
        self.retries_remaining -= 1;
        true
    }

    pub(crate) fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    fn finish(self, result: Option<ServiceReference>) -> Finished {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
        Finished {
            waiters: self.waiters,
            result,
        }
    }
}

/// Lookup of a single object: the first answer wins.
pub(crate) struct ObjectRequest {
    core: Request<Identity>,
}

impl ObjectRequest {
    pub(crate) fn new(identity: Identity, retry_count: u32) -> Self {
        Self {
            core: Request::new(identity, retry_count),
        }
    }

    pub(crate) fn core(&self) -> &Request<Identity> {
        &self.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut Request<Identity> {
        &mut self.core
    }

    /// Object lookups retry on every timeout until the budget runs out.
    pub(crate) fn should_retry(&mut self) -> bool {
        self.core.take_retry()
    }

    pub(crate) fn finish(self, result: Option<ServiceReference>) -> Finished {
        self.core.finish(result)
    }
}

/// Lookup of a hosting group, merging answers from replica-group members.
pub(crate) struct AdapterRequest {
    core: Request<AdapterId>,
    collected: Vec<ServiceReference>,
}

impl AdapterRequest {
    pub(crate) fn new(adapter_id: AdapterId, retry_count: u32) -> Self {
        Self {
            core: Request::new(adapter_id, retry_count),
            collected: Vec::new(),
        }
    }

    pub(crate) fn core(&self) -> &Request<AdapterId> {
        &self.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut Request<AdapterId> {
        &mut self.core
    }

    /// Record a replica-group member's answer. Returns true for the first
    /// answer, which is the one that opens the quorum window.
    pub(crate) fn add_reply(&mut self, reference: ServiceReference) -> bool {
        self.collected.push(reference);
        self.collected.len() == 1
    }

    pub(crate) fn collected(&self) -> usize {
        self.collected.len()
    }

    /// A timeout with answers in hand means the quorum window closed.
    pub(crate) fn should_retry(&mut self) -> bool {
        self.collected.is_empty() && self.core.take_retry()
    }

    /// Finish with an explicit answer, discarding anything collected.
    pub(crate) fn finish(self, result: Option<ServiceReference>) -> Finished {
        self.core.finish(result)
    }

    /// Finish with the merge of every collected answer.
    pub(crate) fn finish_merged(mut self) -> Finished {
        let result = merge_references(std::mem::take(&mut self.collected));
        self.core.finish(result)
    }
}

/// Merge replica-group answers into one reference.
///
/// The first answer is the template; its endpoints become the
/// concatenation of every answer's endpoints, in arrival order. Endpoints
/// reported by more than one member are kept as many times as reported.
pub(crate) fn merge_references(mut collected: Vec<ServiceReference>) -> Option<ServiceReference> {
    match collected.len() {
        0 => None,
        1 => collected.pop(),
        _ => {
            let endpoints = collected
                .iter()
                .flat_map(|reference| reference.endpoints.iter().cloned())
                .collect();
            Some(collected[0].with_endpoints(endpoints))
        }
    }
}

/// A finished request, detached from the resolver's maps.
///
/// Delivery happens after the resolver lock is released so a waiter may
/// call back into the resolver.
#[must_use]
pub(crate) struct Finished {
    waiters: Vec<ResolveCallback>,
    result: Option<ServiceReference>,
}

impl Finished {
    pub(crate) fn result(&self) -> Option<&ServiceReference> {
        self.result.as_ref()
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Hand the result to every waiter, exactly once each.
    pub(crate) fn deliver(self) {
        for waiter in self.waiters {
            waiter(self.result.clone());
        }
    }
}
