//! Seams to the multicast transport.
//!
//! The transport owns the sockets and the wire encoding. It issues lookup
//! queries on behalf of the resolver and hands every decoded reply back as
//! a [`LookupReply`].

use crate::error::SendError;
use crate::types::{AdapterId, CorrelationToken, Identity, ServiceReference};

/// Outbound side of the lookup protocol.
///
/// Implementations must not block on the network: the resolver calls them
/// while holding its lock. A returned error means the query could not even
/// be issued locally (no interface, closed socket) and is not retried.
pub trait LookupTransport: Send + Sync {
    /// Broadcast a query for the object `identity`.
    fn send_object_query(
        &self,
        domain_id: &str,
        identity: &Identity,
        token: &CorrelationToken,
    ) -> Result<(), SendError>;

    /// Broadcast a query for the hosting group `adapter_id`.
    fn send_adapter_query(
        &self,
        domain_id: &str,
        adapter_id: &AdapterId,
        token: &CorrelationToken,
    ) -> Result<(), SendError>;
}

/// A decoded lookup reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupReply {
    /// Answer to an object query.
    Object {
        /// Domain the answering process belongs to.
        domain_id: String,
        /// The object asked about.
        identity: Identity,
        /// Token copied from the query.
        token: CorrelationToken,
        /// Where the object lives; `None` is an explicit negative answer.
        reference: Option<ServiceReference>,
    },

    /// Answer to an adapter query.
    Adapter {
        /// Domain the answering process belongs to.
        domain_id: String,
        /// The hosting group asked about.
        adapter_id: AdapterId,
        /// Token copied from the query.
        token: CorrelationToken,
        /// The member's reference; `None` is an explicit negative answer.
        reference: Option<ServiceReference>,
        /// Whether the answering process is one member of a replica group.
        is_replica_group: bool,
    },
}

impl LookupReply {
    /// Domain the reply was sent from.
    pub fn domain_id(&self) -> &str {
        match self {
            LookupReply::Object { domain_id, .. } | LookupReply::Adapter { domain_id, .. } => {
                domain_id
            }
        }
    }

    /// Token the reply answers.
    pub fn token(&self) -> &CorrelationToken {
        match self {
            LookupReply::Object { token, .. } | LookupReply::Adapter { token, .. } => token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_accessors() {
        let token = CorrelationToken::new(7, 9);
        let object = LookupReply::Object {
            domain_id: "lab".to_string(),
            identity: Identity::new("printer"),
            token,
            reference: None,
        };
        let adapter = LookupReply::Adapter {
            domain_id: "prod".to_string(),
            adapter_id: AdapterId::new("Printers"),
            token,
            reference: None,
            is_replica_group: true,
        };

        assert_eq!(object.domain_id(), "lab");
        assert_eq!(object.token(), &token);
        assert_eq!(adapter.domain_id(), "prod");
        assert_eq!(adapter.token(), &token);
    }
}
