//! Shared fixtures for resolver tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moonpool_discovery::{
    AdapterId, CorrelationToken, DiscoveryConfig, Endpoint, Identity, LookupTransport,
    ManualTimer, Resolver, SendError, ServiceReference,
};
use parking_lot::Mutex;

/// One query seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Object {
        domain_id: String,
        identity: Identity,
        token: CorrelationToken,
    },
    Adapter {
        domain_id: String,
        adapter_id: AdapterId,
        token: CorrelationToken,
    },
}

impl Query {
    pub fn token(&self) -> CorrelationToken {
        match self {
            Query::Object { token, .. } | Query::Adapter { token, .. } => *token,
        }
    }
}

/// Transport recording every query, optionally failing sends.
#[derive(Default)]
pub struct RecordingTransport {
    queries: Mutex<Vec<Query>>,
    /// Sends with an index at or past this value fail.
    fail_from: Mutex<Option<usize>>,
    attempts: AtomicUsize,
}

impl RecordingTransport {
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().clone()
    }

    pub fn sent(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn last_token(&self) -> CorrelationToken {
        self.queries
            .lock()
            .last()
            .map(Query::token)
            .expect("at least one query sent")
    }

    /// Fail every send from the `n`th attempt on (0-based).
    pub fn fail_from(&self, n: usize) {
        *self.fail_from.lock() = Some(n);
    }

    fn check(&self) -> Result<(), SendError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match *self.fail_from.lock() {
            Some(n) if attempt >= n => Err(SendError::NoInterface),
            _ => Ok(()),
        }
    }
}

impl LookupTransport for RecordingTransport {
    fn send_object_query(
        &self,
        domain_id: &str,
        identity: &Identity,
        token: &CorrelationToken,
    ) -> Result<(), SendError> {
        self.check()?;
        self.queries.lock().push(Query::Object {
            domain_id: domain_id.to_string(),
            identity: identity.clone(),
            token: *token,
        });
        Ok(())
    }

    fn send_adapter_query(
        &self,
        domain_id: &str,
        adapter_id: &AdapterId,
        token: &CorrelationToken,
    ) -> Result<(), SendError> {
        self.check()?;
        self.queries.lock().push(Query::Adapter {
            domain_id: domain_id.to_string(),
            adapter_id: adapter_id.clone(),
            token: *token,
        });
        Ok(())
    }
}

/// Collects what each waiter was called back with.
#[derive(Clone, Default)]
pub struct Outcomes {
    results: Arc<Mutex<Vec<Option<ServiceReference>>>>,
}

impl Outcomes {
    pub fn callback(&self) -> moonpool_discovery::ResolveCallback {
        let results = self.results.clone();
        Box::new(move |reference| results.lock().push(reference))
    }

    pub fn all(&self) -> Vec<Option<ServiceReference>> {
        self.results.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

pub struct Harness {
    pub resolver: Resolver,
    pub transport: Arc<RecordingTransport>,
    pub timer: ManualTimer,
}

pub const TIMEOUT: Duration = Duration::from_millis(300);

pub fn config() -> DiscoveryConfig {
    DiscoveryConfig::default()
        .with_timeout(TIMEOUT)
        .with_retry_count(3)
        .with_latency_multiplier(100)
        .with_domain_id("test")
}

pub fn harness(config: DiscoveryConfig) -> Harness {
    init_tracing();
    let transport = Arc::new(RecordingTransport::default());
    let timer = ManualTimer::new();
    let resolver = Resolver::new(config, transport.clone(), Arc::new(timer.clone()))
        .expect("valid config");
    Harness {
        resolver,
        transport,
        timer,
    }
}

pub fn endpoint(last_octet: u8, port: u16) -> Endpoint {
    Endpoint::tcp(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), port)
}

pub fn object_reference(name: &str, endpoints: Vec<Endpoint>) -> ServiceReference {
    ServiceReference::new(Identity::new(name), endpoints)
}

pub fn adapter_reference(adapter: &str, endpoints: Vec<Endpoint>) -> ServiceReference {
    ServiceReference::new(Identity::new("dummy"), endpoints)
        .with_adapter_id(AdapterId::new(adapter))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
