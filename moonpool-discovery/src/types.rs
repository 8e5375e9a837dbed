//! Core types for discovery.
//!
//! - [`Identity`]: names a single remotely hosted object
//! - [`AdapterId`]: names a hosting group, possibly replicated
//! - [`Endpoint`]: one transport + address at which a process is reachable
//! - [`ServiceReference`]: identity plus the endpoints to reach it
//! - [`CorrelationToken`]: tags every attempt of one lookup request

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Identity of a single hosted object.
///
/// # Examples
///
/// ```
/// use moonpool_discovery::Identity;
///
/// let id: Identity = "accounts/alice".parse().expect("parse");
/// assert_eq!(id.category, "accounts");
/// assert_eq!(id.name, "alice");
/// assert_eq!(id.to_string(), "accounts/alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// Object name. Never empty.
    pub name: String,
    /// Optional category; empty when the identity has none.
    pub category: String,
}

impl Identity {
    /// Identity without a category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
        }
    }

    /// Identity with a category.
    pub fn with_category(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.category, self.name)
        }
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = match s.split_once('/') {
            Some((category, name)) => (category, name),
            None => ("", s),
        };
        if name.is_empty() {
            return Err(ParseError::EmptyIdentity);
        }
        Ok(Self::with_category(category, name))
    }
}

/// Identifier of a hosting group ("object adapter").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterId(pub String);

impl AdapterId {
    /// Create an adapter id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AdapterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// IP address and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// IP address (IPv4 or IPv6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl NetworkAddress {
    /// Create a new network address.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parse `ip:port`, with IPv6 in bracket notation (`[::1]:4061`).
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (ip_str, port_str) = if let Some(rest) = s.strip_prefix('[') {
            let (ip, tail) = rest.split_once(']').ok_or(ParseError::InvalidIp)?;
            let port = tail.strip_prefix(':').ok_or(ParseError::MissingPort)?;
            (ip, port)
        } else {
            s.rsplit_once(':').ok_or(ParseError::MissingPort)?
        };
        let ip: IpAddr = ip_str.parse().map_err(|_| ParseError::InvalidIp)?;
        let port: u16 = port_str.parse().map_err(|_| ParseError::InvalidPort)?;
        Ok(Self::new(ip, port))
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Transport protocol of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain TCP.
    Tcp,
    /// UDP datagrams.
    Udp,
    /// TLS over TCP.
    Ssl,
}

impl Transport {
    /// Scheme name used in the endpoint string form.
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
            Transport::Ssl => "ssl",
        }
    }
}

/// One concrete address at which a hosting process can be reached.
///
/// # Examples
///
/// ```
/// use moonpool_discovery::{Endpoint, Transport};
///
/// let endpoint: Endpoint = "tcp://10.0.0.7:4061".parse().expect("parse");
/// assert_eq!(endpoint.transport, Transport::Tcp);
/// assert_eq!(endpoint.address.port, 4061);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Transport protocol.
    pub transport: Transport,
    /// Where to connect.
    pub address: NetworkAddress,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(transport: Transport, address: NetworkAddress) -> Self {
        Self { transport, address }
    }

    /// TCP endpoint shorthand.
    pub fn tcp(ip: IpAddr, port: u16) -> Self {
        Self::new(Transport::Tcp, NetworkAddress::new(ip, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport.scheme(), self.address)
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, address) = s
            .split_once("://")
            .ok_or_else(|| ParseError::MissingScheme(s.to_string()))?;
        let transport = match scheme {
            "tcp" => Transport::Tcp,
            "udp" => Transport::Udp,
            "ssl" => Transport::Ssl,
            other => return Err(ParseError::UnknownTransport(other.to_string())),
        };
        Ok(Self::new(transport, NetworkAddress::parse(address)?))
    }
}

/// Handle addressing a remote object ("proxy").
///
/// A reference returned by discovery is direct: it carries the endpoints
/// of every live member that answered. A reference with no endpoints is
/// indirect and must be resolved again before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReference {
    /// The object this reference addresses.
    pub identity: Identity,
    /// Hosting group, when the reference was obtained through one.
    pub adapter_id: Option<AdapterId>,
    /// Network endpoints, in the order they were reported.
    pub endpoints: Vec<Endpoint>,
}

impl ServiceReference {
    /// Direct reference to `identity` at `endpoints`.
    pub fn new(identity: Identity, endpoints: Vec<Endpoint>) -> Self {
        Self {
            identity,
            adapter_id: None,
            endpoints,
        }
    }

    /// Set the hosting group.
    pub fn with_adapter_id(mut self, adapter_id: AdapterId) -> Self {
        self.adapter_id = Some(adapter_id);
        self
    }

    /// Copy of this reference with its endpoint set replaced.
    pub fn with_endpoints(&self, endpoints: Vec<Endpoint>) -> Self {
        Self {
            identity: self.identity.clone(),
            adapter_id: self.adapter_id.clone(),
            endpoints,
        }
    }

    /// True when the reference carries no endpoints.
    pub fn is_indirect(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Correlation token tagging all attempts of one lookup request.
///
/// 128 random bits, rendered as 32 lowercase hex digits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken {
    /// First 64 bits.
    pub first: u64,
    /// Second 64 bits.
    pub second: u64,
}

impl CorrelationToken {
    /// Token with explicit values.
    pub const fn new(first: u64, second: u64) -> Self {
        Self { first, second }
    }

    /// Fresh random token.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            first: rng.random(),
            second: rng.random(),
        }
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.first, self.second)
    }
}

impl FromStr for CorrelationToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidToken(s.to_string()));
        }
        let invalid = |_| ParseError::InvalidToken(s.to_string());
        let first = u64::from_str_radix(&s[..16], 16).map_err(invalid)?;
        let second = u64::from_str_radix(&s[16..], 16).map_err(invalid)?;
        Ok(Self { first, second })
    }
}
