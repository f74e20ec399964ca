use std::{fmt, net::SocketAddr};

/// Message-id key, scoped to a namespace.
///
/// Without an endpoint the id lives in the local namespace: ids this endpoint
/// generated, including the ids remote peers echo back in ACK and RST
/// messages. With an endpoint the id was chosen by that peer, so two peers may
/// use the same number independently.
///
/// # Examples
///
/// ```
/// use coap_matcher::key::KeyId;
///
/// let peer = "192.0.2.1:5683".parse().expect("valid address");
/// assert_ne!(KeyId::local(5), KeyId::remote(5, peer));
/// assert!(KeyId::local(5).is_local());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyId {
    id: u16,
    endpoint: Option<SocketAddr>,
}

impl KeyId {
    /// Create a key in the given namespace.
    #[must_use]
    pub const fn new(id: u16, endpoint: Option<SocketAddr>) -> Self { Self { id, endpoint } }

    /// Key for an id generated by this endpoint.
    #[must_use]
    pub const fn local(id: u16) -> Self { Self::new(id, None) }

    /// Key for an id generated by `endpoint`.
    #[must_use]
    pub const fn remote(id: u16, endpoint: SocketAddr) -> Self { Self::new(id, Some(endpoint)) }

    #[must_use]
    pub const fn id(&self) -> u16 { self.id }

    #[must_use]
    pub const fn endpoint(&self) -> Option<SocketAddr> { self.endpoint }

    /// True when the id belongs to the local namespace.
    #[must_use]
    pub const fn is_local(&self) -> bool { self.endpoint.is_none() }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint {
            Some(endpoint) => write!(f, "KeyID[{} for {endpoint}]", self.id),
            None => write!(f, "KeyID[{}]", self.id),
        }
    }
}
