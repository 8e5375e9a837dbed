//! # moonpool-discovery
//!
//! Multicast discovery of object and adapter locations.
//!
//! Given an object [`Identity`] or a hosting-group [`AdapterId`], the
//! [`Resolver`] broadcasts a lookup query, correlates the answers that come
//! back over the unreliable medium, retries on silence, and hands callers a
//! [`ServiceReference`] they can connect to. The [`Locator`] wraps it in an
//! async API.
//!
//! ## What the resolver guarantees
//!
//! - **Deduplication**: concurrent lookups of the same key share one query
//! - **Correlation**: every attempt of a lookup carries the same
//!   [`CorrelationToken`]; stale or duplicate answers are dropped
//! - **Bounded retry**: at most `retry_count + 1` queries per lookup
//! - **Quorum merge**: answers from replica-group members arriving within a
//!   latency-proportional window are merged into one reference
//! - **Exactly once**: every caller is called back once, with `None` when
//!   nothing was found
//!
//! ## Collaborators
//!
//! Socket I/O and wire encoding live behind [`LookupTransport`]; delayed
//! callbacks behind [`TimerService`]. The crate provides [`TokioTimer`] for
//! production and [`ManualTimer`] for deterministic tests.
//!
//! ```text
//! ┌──────────────┐  resolve_*   ┌──────────────┐  send_*_query  ┌─────────────────┐
//! │   Locator    │ ───────────► │   Resolver   │ ─────────────► │ LookupTransport │
//! └──────────────┘              └──────────────┘ ◄───────────── └─────────────────┘
//!                                  ▲        │       deliver
//!                        *_timed_out│        │schedule
//!                                  │        ▼
//!                               ┌──────────────┐
//!                               │ TimerService │
//!                               └──────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod config;
mod error;
mod locator;
mod request;
mod resolver;
mod sim;
mod timer;
mod transport;
mod types;

pub use config::DiscoveryConfig;
pub use error::{ConfigError, ParseError, SendError};
pub use locator::{Locator, ResolveFuture};
pub use request::ResolveCallback;
pub use resolver::Resolver;
pub use sim::ManualTimer;
pub use timer::{TimerHandle, TimerService, TimerTask, TokioTimer};
pub use transport::{LookupReply, LookupTransport};
pub use types::{
    AdapterId, CorrelationToken, Endpoint, Identity, NetworkAddress, ServiceReference, Transport,
};
