//! Lookup keys for the matcher's exchange tables.
//!
//! Each key type identifies an exchange along one axis: [`KeyId`] by message
//! id and namespace, [`KeyToken`] by request token, and [`KeyUri`] by the
//! resource and peer of an ongoing blockwise transfer. They are plain values
//! with equality and hashing defined over their fields.

pub mod id;
pub mod token;
pub mod uri;

pub use id::KeyId;
pub use token::KeyToken;
pub use uri::KeyUri;
