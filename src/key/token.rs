use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
};

use crate::message::Token;

/// Token key for matching responses to the request that carried the token.
///
/// The token's hash is computed once on construction and reused by the
/// table's hasher. Equality checks the cached hash first and then the token
/// bytes, so two distinct tokens never alias even when their hashes collide.
#[derive(Clone, Debug)]
pub struct KeyToken {
    token: Token,
    hash: u64,
}

impl KeyToken {
    /// Wrap `token` as a lookup key.
    #[must_use]
    pub fn new(token: Token) -> Self {
        let mut hasher = DefaultHasher::new();
        token.as_bytes().hash(&mut hasher);
        let hash = hasher.finish();
        Self { token, hash }
    }

    #[must_use]
    pub fn token(&self) -> &Token { &self.token }
}

impl From<&Token> for KeyToken {
    fn from(token: &Token) -> Self { Self::new(token.clone()) }
}

impl PartialEq for KeyToken {
    fn eq(&self, other: &Self) -> bool { self.hash == other.hash && self.token == other.token }
}

impl Eq for KeyToken {}

impl Hash for KeyToken {
    fn hash<H: Hasher>(&self, state: &mut H) { state.write_u64(self.hash); }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "KeyToken[{}]", self.token) }
}
