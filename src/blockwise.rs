//! Progress marker for a blockwise transfer (RFC 7959).
//!
//! The blockwise layer stores a [`BlockwiseStatus`] on the exchange while a
//! transfer is in flight and clears it once the final block has been handled.
//! The matcher only checks for its presence.

use bytes::{Bytes, BytesMut};

/// Transfer state for the request or response body of one exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockwiseStatus {
    current_num: u32,
    current_szx: u8,
    complete: bool,
    random_access: bool,
    content_format: Option<u16>,
    observe: Option<u32>,
    blocks: Vec<Bytes>,
}

impl BlockwiseStatus {
    /// Start tracking a transfer of the given content format.
    #[must_use]
    pub fn new(content_format: Option<u16>) -> Self {
        Self {
            content_format,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn current_num(&self) -> u32 { self.current_num }

    pub fn set_current_num(&mut self, num: u32) { self.current_num = num; }

    #[must_use]
    pub fn current_szx(&self) -> u8 { self.current_szx }

    pub fn set_current_szx(&mut self, szx: u8) { self.current_szx = szx; }

    #[must_use]
    pub fn is_complete(&self) -> bool { self.complete }

    pub fn set_complete(&mut self, complete: bool) { self.complete = complete; }

    /// Whether the peer requested blocks out of order.
    #[must_use]
    pub fn is_random_access(&self) -> bool { self.random_access }

    pub fn set_random_access(&mut self, random_access: bool) { self.random_access = random_access; }

    #[must_use]
    pub fn content_format(&self) -> Option<u16> { self.content_format }

    /// Observe sequence of the notification this transfer belongs to.
    #[must_use]
    pub fn observe(&self) -> Option<u32> { self.observe }

    pub fn set_observe(&mut self, observe: Option<u32>) { self.observe = observe; }

    /// Append the payload of the next block.
    pub fn add_block(&mut self, block: Bytes) { self.blocks.push(block); }

    #[must_use]
    pub fn block_count(&self) -> usize { self.blocks.len() }

    /// Concatenate the collected blocks into one body.
    #[must_use]
    pub fn assemble(&self) -> Bytes {
        let len = self.blocks.iter().map(Bytes::len).sum();
        let mut body = BytesMut::with_capacity(len);
        for block in &self.blocks {
            body.extend_from_slice(block);
        }
        body.freeze()
    }
}
