//! Lookup request correlation, deduplication, retry and quorum merge.
//!
//! # Architecture
//!
//! ```text
//!  callers ──find_*──┐                      ┌──► LookupTransport (send)
//!                    ▼                      │
//!  transport ──found_*──►  Mutex<ResolverState>  ──► TimerService (arm/cancel)
//!                    ▲     objects:  Identity  → ObjectRequest
//!  timer ──*_timed_out┘    adapters: AdapterId → AdapterRequest
//! ```
//!
//! Every entry point takes the one lock for its whole mutation, including
//! the outbound send. Replies and timer firings are admitted only if their
//! correlation token names the request currently mapped for the key; any
//! other event is stale and dropped without a trace.
//!
//! Results are delivered after the lock is released. The finished request
//! has already been unmapped by then, so a caller arriving in between
//! starts a fresh request instead of joining a finished one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::DiscoveryConfig;
use crate::error::{ConfigError, SendError};
use crate::request::{AdapterRequest, ObjectRequest, ResolveCallback};
use crate::timer::TimerService;
use crate::transport::{LookupReply, LookupTransport};
use crate::types::{AdapterId, CorrelationToken, Identity, ServiceReference};

/// Shortest quorum window, however fast the first answer came back.
const MIN_QUORUM_WINDOW: Duration = Duration::from_millis(1);

/// Multicast lookup resolver.
///
/// Cheap to clone; clones share the same in-flight requests.
///
/// # Example
///
/// ```rust,ignore
/// let resolver = Resolver::new(config, transport, timer)?;
///
/// resolver.find_object(
///     Box::new(|reference| println!("resolved: {:?}", reference)),
///     Identity::new("printer"),
/// );
///
/// // Later, from the transport's receive loop:
/// resolver.deliver(reply);
/// ```
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    config: DiscoveryConfig,
    transport: Arc<dyn LookupTransport>,
    timer: Arc<dyn TimerService>,
    state: Mutex<ResolverState>,
}

#[derive(Default)]
struct ResolverState {
    objects: HashMap<Identity, ObjectRequest>,
    adapters: HashMap<AdapterId, AdapterRequest>,
}

impl Resolver {
    /// Create a resolver.
    ///
    /// `timer` must never run a task from inside `schedule`; the resolver
    /// arms timers while holding its lock.
    pub fn new(
        config: DiscoveryConfig,
        transport: Arc<dyn LookupTransport>,
        timer: Arc<dyn TimerService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ResolverInner {
                config,
                transport,
                timer,
                state: Mutex::new(ResolverState::default()),
            }),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// Number of object lookups in flight.
    pub fn pending_object_requests(&self) -> usize {
        self.inner.state.lock().objects.len()
    }

    /// Number of adapter lookups in flight.
    pub fn pending_adapter_requests(&self) -> usize {
        self.inner.state.lock().adapters.len()
    }

    /// Resolve `identity`, calling `callback` exactly once with the outcome.
    ///
    /// Joins the in-flight lookup for `identity` if there is one; otherwise
    /// sends a query and arms the per-attempt timeout.
    pub fn find_object(&self, callback: ResolveCallback, identity: Identity) {
        let finished = {
            let mut state = self.inner.state.lock();
            let request = match state.objects.entry(identity.clone()) {
                Entry::Occupied(entry) => {
                    entry.into_mut().core_mut().add_waiter(callback);
                    return;
                }
                Entry::Vacant(entry) => entry.insert(ObjectRequest::new(
                    identity.clone(),
                    self.inner.config.retry_count,
                )),
            };
            request.core_mut().add_waiter(callback);

            tracing::debug!(
                identity = %identity,
                token = %request.core().token(),
                "starting object lookup"
            );
            match self.send_object_query(request) {
                Ok(()) => None,
                Err(_) => state
                    .objects
                    .remove(&identity)
                    .map(|request| request.finish(None)),
            }
        };
        if let Some(finished) = finished {
            finished.deliver();
        }
    }

    /// Resolve the hosting group `adapter_id`, calling `callback` exactly
    /// once with the outcome.
    pub fn find_adapter(&self, callback: ResolveCallback, adapter_id: AdapterId) {
        let finished = {
            let mut state = self.inner.state.lock();
            let request = match state.adapters.entry(adapter_id.clone()) {
                Entry::Occupied(entry) => {
                    entry.into_mut().core_mut().add_waiter(callback);
                    return;
                }
                Entry::Vacant(entry) => entry.insert(AdapterRequest::new(
                    adapter_id.clone(),
                    self.inner.config.retry_count,
                )),
            };
            request.core_mut().add_waiter(callback);

            tracing::debug!(
                adapter_id = %adapter_id,
                token = %request.core().token(),
                "starting adapter lookup"
            );
            match self.send_adapter_query(request) {
                Ok(()) => None,
                Err(_) => state
                    .adapters
                    .remove(&adapter_id)
                    .map(|request| request.finish(None)),
            }
        };
        if let Some(finished) = finished {
            finished.deliver();
        }
    }

    /// Route a decoded reply to [`found_object`](Self::found_object) or
    /// [`found_adapter`](Self::found_adapter).
    ///
    /// Replies from another domain are ignored.
    pub fn deliver(&self, reply: LookupReply) {
        if reply.domain_id() != self.inner.config.domain_id {
            return;
        }
        match reply {
            LookupReply::Object {
                identity,
                token,
                reference,
                ..
            } => self.found_object(&identity, &token, reference),
            LookupReply::Adapter {
                adapter_id,
                token,
                reference,
                is_replica_group,
                ..
            } => self.found_adapter(&adapter_id, &token, reference, is_replica_group),
        }
    }

    /// An object query was answered.
    ///
    /// `reference` of `None` is an explicit negative answer and finishes the
    /// lookup just like a positive one.
    pub fn found_object(
        &self,
        identity: &Identity,
        token: &CorrelationToken,
        reference: Option<ServiceReference>,
    ) {
        let finished = {
            let mut state = self.inner.state.lock();
            match state.objects.get(identity) {
                Some(request) if request.core().matches(token) => {}
                _ => return,
            }
            state
                .objects
                .remove(identity)
                .map(|request| request.finish(reference))
        };
        if let Some(finished) = finished {
            tracing::debug!(
                identity = %identity,
                token = %token,
                found = finished.result().is_some(),
                waiters = finished.waiter_count(),
                "object lookup answered"
            );
            finished.deliver();
        }
    }

    /// An adapter query was answered.
    ///
    /// A member of a replica group never finishes the lookup by itself: the
    /// first such answer shortens the pending timeout to the quorum window,
    /// and the timer firing then merges every answer collected so far. A
    /// member answering with no reference is ignored.
    pub fn found_adapter(
        &self,
        adapter_id: &AdapterId,
        token: &CorrelationToken,
        reference: Option<ServiceReference>,
        is_replica_group: bool,
    ) {
        let finished = {
            let mut state = self.inner.state.lock();
            let request = match state.adapters.get_mut(adapter_id) {
                Some(request) if request.core().matches(token) => request,
                _ => return,
            };
            match reference {
                // A replica member with nothing to report leaves the
                // collection and the armed timer untouched.
                None if is_replica_group => return,
                Some(reference) if is_replica_group => {
                    if request.add_reply(reference) {
                        let window = self.quorum_window(request.core().sent_at());
                        tracing::debug!(
                            adapter_id = %adapter_id,
                            token = %token,
                            window_ms = window.as_millis() as u64,
                            "replica group answered, collecting more replies"
                        );
                        self.arm_adapter_timeout(request, window);
                    }
                    return;
                }
                reference => state
                    .adapters
                    .remove(adapter_id)
                    .map(|request| request.finish(reference)),
            }
        };
        if let Some(finished) = finished {
            tracing::debug!(
                adapter_id = %adapter_id,
                token = %token,
                found = finished.result().is_some(),
                waiters = finished.waiter_count(),
                "adapter lookup answered"
            );
            finished.deliver();
        }
    }

    /// The per-attempt timeout of an object lookup fired.
    ///
    /// Retries while budget remains, otherwise reports not found. Does
    /// nothing if `token` no longer names the in-flight lookup.
    pub fn object_request_timed_out(&self, identity: &Identity, token: &CorrelationToken) {
        let finished = {
            let mut state = self.inner.state.lock();
            let request = match state.objects.get_mut(identity) {
                Some(request) if request.core().matches(token) => request,
                _ => return,
            };
            let resent = request.should_retry() && {
                tracing::debug!(
                    identity = %identity,
                    token = %token,
                    retries_remaining = request.core().retries_remaining(),
                    "object lookup timed out, retrying"
                );
                self.send_object_query(request).is_ok()
            };
            if resent {
                None
            } else {
                state
                    .objects
                    .remove(identity)
                    .map(|request| request.finish(None))
            }
        };
        if let Some(finished) = finished {
            tracing::debug!(
                identity = %identity,
                token = %token,
                waiters = finished.waiter_count(),
                "object lookup gave up"
            );
            finished.deliver();
        }
    }

    /// The timer of an adapter lookup fired.
    ///
    /// With no answers collected this is a plain timeout: retry while budget
    /// remains. With answers collected the quorum window has closed and the
    /// answers are merged.
    pub fn adapter_request_timed_out(&self, adapter_id: &AdapterId, token: &CorrelationToken) {
        let finished = {
            let mut state = self.inner.state.lock();
            let request = match state.adapters.get_mut(adapter_id) {
                Some(request) if request.core().matches(token) => request,
                _ => return,
            };
            let resent = request.should_retry() && {
                tracing::debug!(
                    adapter_id = %adapter_id,
                    token = %token,
                    retries_remaining = request.core().retries_remaining(),
                    "adapter lookup timed out, retrying"
                );
                self.send_adapter_query(request).is_ok()
            };
            if resent {
                None
            } else {
                state
                    .adapters
                    .remove(adapter_id)
                    .map(|request| {
                        tracing::debug!(
                            adapter_id = %adapter_id,
                            token = %token,
                            replies = request.collected(),
                            "adapter lookup finished"
                        );
                        request.finish_merged()
                    })
            }
        };
        if let Some(finished) = finished {
            finished.deliver();
        }
    }

    /// `rtt * latency_multiplier / 100`, never below [`MIN_QUORUM_WINDOW`].
    fn quorum_window(&self, sent_at: Duration) -> Duration {
        let rtt = self.inner.timer.now().saturating_sub(sent_at);
        let window = rtt.saturating_mul(self.inner.config.latency_multiplier) / 100;
        window.max(MIN_QUORUM_WINDOW)
    }

    fn send_object_query(&self, request: &mut ObjectRequest) -> Result<(), SendError> {
        let core = request.core_mut();
        core.mark_sent(self.inner.timer.now());
        if let Err(err) = self.inner.transport.send_object_query(
            &self.inner.config.domain_id,
            core.key(),
            &core.token(),
        ) {
            tracing::warn!(identity = %core.key(), error = %err, "failed to send object lookup");
            return Err(err);
        }
        self.arm_object_timeout(request, self.inner.config.timeout);
        Ok(())
    }

    fn send_adapter_query(&self, request: &mut AdapterRequest) -> Result<(), SendError> {
        let core = request.core_mut();
        core.mark_sent(self.inner.timer.now());
        if let Err(err) = self.inner.transport.send_adapter_query(
            &self.inner.config.domain_id,
            core.key(),
            &core.token(),
        ) {
            tracing::warn!(adapter_id = %core.key(), error = %err, "failed to send adapter lookup");
            return Err(err);
        }
        self.arm_adapter_timeout(request, self.inner.config.timeout);
        Ok(())
    }

    fn arm_object_timeout(&self, request: &mut ObjectRequest, delay: Duration) {
        let resolver = self.downgrade();
        let identity = request.core().key().clone();
        let token = request.core().token();
        let handle = self.inner.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(resolver) = Resolver::upgrade(&resolver) {
                    resolver.object_request_timed_out(&identity, &token);
                }
            }),
        );
        request.core_mut().arm(handle);
    }

    fn arm_adapter_timeout(&self, request: &mut AdapterRequest, delay: Duration) {
        let resolver = self.downgrade();
        let adapter_id = request.core().key().clone();
        let token = request.core().token();
        let handle = self.inner.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(resolver) = Resolver::upgrade(&resolver) {
                    resolver.adapter_request_timed_out(&adapter_id, &token);
                }
            }),
        );
        request.core_mut().arm(handle);
    }

    /// Timers hold the resolver weakly so pending timeouts do not keep a
    /// dropped resolver alive.
    fn downgrade(&self) -> Weak<ResolverInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(inner: &Weak<ResolverInner>) -> Option<Resolver> {
        inner.upgrade().map(|inner| Resolver { inner })
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.inner.config)
            .field("pending_objects", &self.pending_object_requests())
            .field("pending_adapters", &self.pending_adapter_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ManualTimer;

    struct SilentTransport;

    impl LookupTransport for SilentTransport {
        fn send_object_query(
            &self,
            _domain_id: &str,
            _identity: &Identity,
            _token: &CorrelationToken,
        ) -> Result<(), SendError> {
            Ok(())
        }

        fn send_adapter_query(
            &self,
            _domain_id: &str,
            _adapter_id: &AdapterId,
            _token: &CorrelationToken,
        ) -> Result<(), SendError> {
            Ok(())
        }
    }

    fn resolver(config: DiscoveryConfig) -> (Resolver, ManualTimer) {
        let timer = ManualTimer::new();
        let resolver = Resolver::new(config, Arc::new(SilentTransport), Arc::new(timer.clone()))
            .expect("valid config");
        (resolver, timer)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Resolver::new(
            DiscoveryConfig::default().with_timeout(Duration::ZERO),
            Arc::new(SilentTransport),
            Arc::new(ManualTimer::new()),
        );
        assert!(matches!(result, Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_quorum_window_scales_with_latency() {
        let (resolver, timer) = resolver(DiscoveryConfig::default().with_latency_multiplier(250));
        timer.advance(Duration::from_millis(40));
        assert_eq!(
            resolver.quorum_window(Duration::from_millis(0)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_quorum_window_has_floor() {
        let (resolver, timer) = resolver(DiscoveryConfig::default());
        timer.advance(Duration::from_millis(5));
        assert_eq!(
            resolver.quorum_window(Duration::from_millis(5)),
            MIN_QUORUM_WINDOW
        );
    }

    #[test]
    fn test_timer_does_not_outlive_resolver() {
        let (resolver, timer) = resolver(DiscoveryConfig::default());
        resolver.find_object(Box::new(|_| {}), Identity::new("ghost"));
        assert_eq!(timer.pending(), 1);

        drop(resolver);
        timer.advance(Duration::from_secs(10));
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_config_is_kept() {
        let (resolver, _timer) = resolver(DiscoveryConfig::default().with_domain_id("lab"));
        assert_eq!(resolver.config().domain_id, "lab");
        assert_eq!(resolver.clone().config(), resolver.config());
    }

    #[test]
    fn test_debug_shows_pending_counts() {
        let (resolver, _timer) = resolver(DiscoveryConfig::default());
        resolver.find_adapter(Box::new(|_| {}), AdapterId::new("Group"));
        let text = format!("{:?}", resolver);
        assert!(text.contains("pending_adapters: 1"));
    }
}
