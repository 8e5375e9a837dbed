//! Locator facade: the resolution API callers see.
//!
//! Each call creates a oneshot completion bound to the caller and passes
//! its sender, wrapped as a [`ResolveCallback`](crate::ResolveCallback),
//! into the [`Resolver`]. The caller awaits the [`ResolveFuture`].
//!
//! # Example
//!
//! ```rust,ignore
//! let locator = Locator::new(resolver, registry_reference);
//!
//! match locator.resolve_adapter(&AdapterId::new("Printers")).await {
//!     Some(reference) => connect(&reference.endpoints),
//!     None => tracing::info!("no printer answered"),
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::resolver::Resolver;
use crate::types::{AdapterId, Identity, ServiceReference};

/// Asynchronous locator backed by multicast discovery.
#[derive(Debug, Clone)]
pub struct Locator {
    resolver: Resolver,
    registry: ServiceReference,
}

impl Locator {
    /// Create a locator answering through `resolver`.
    ///
    /// `registry` is handed out unchanged by [`registry`](Self::registry).
    pub fn new(resolver: Resolver, registry: ServiceReference) -> Self {
        Self { resolver, registry }
    }

    /// The resolver behind this locator.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Find the endpoints currently serving `identity`.
    ///
    /// Resolves to `None` when nobody answered within the retry budget;
    /// not finding an object is not an error.
    pub fn resolve_object(&self, identity: &Identity) -> ResolveFuture {
        let (tx, rx) = oneshot::channel();
        self.resolver.find_object(
            Box::new(move |reference| {
                // The caller may have stopped waiting.
                let _ = tx.send(reference);
            }),
            identity.clone(),
        );
        ResolveFuture { rx }
    }

    /// Find the endpoints currently serving the hosting group `adapter_id`.
    ///
    /// For a replica group the result carries the endpoints of every member
    /// that answered within the quorum window.
    pub fn resolve_adapter(&self, adapter_id: &AdapterId) -> ResolveFuture {
        let (tx, rx) = oneshot::channel();
        self.resolver.find_adapter(
            Box::new(move |reference| {
                let _ = tx.send(reference);
            }),
            adapter_id.clone(),
        );
        ResolveFuture { rx }
    }

    /// The locator registry reference. Needs no network traffic.
    pub fn registry(&self) -> ServiceReference {
        self.registry.clone()
    }
}

/// Completion of a [`Locator`] lookup.
///
/// Resolves to `None` if the lookup found nothing, or if the resolver was
/// dropped while the lookup was still in flight.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct ResolveFuture {
    rx: oneshot::Receiver<Option<ServiceReference>>,
}

impl Future for ResolveFuture {
    type Output = Option<ServiceReference>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(reference)) => Poll::Ready(reference),
            Poll::Ready(Err(_)) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
