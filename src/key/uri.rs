use std::{fmt, net::SocketAddr};

/// Key for one ongoing blockwise transfer of one resource with one peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyUri {
    uri: String,
    endpoint: SocketAddr,
}

impl KeyUri {
    #[must_use]
    pub fn new(uri: impl Into<String>, endpoint: SocketAddr) -> Self {
        Self {
            uri: uri.into(),
            endpoint,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str { &self.uri }

    #[must_use]
    pub fn endpoint(&self) -> SocketAddr { self.endpoint }
}

impl fmt::Display for KeyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyUri[{} for {}]", self.uri, self.endpoint)
    }
}
