//! Decoders for the fixed binary layouts emitted by the send library.
//!
//! Both layouts are versionless, big-endian and unpadded. Decoding is lenient: input that is too
//! short yields truncated integers, zeroed addresses and an empty payload instead of an error.
//! Callers that need strictness compare the input length against [`PACKET_HEADER_LEN`].

mod packet;
mod relayer_params;

use alloy::primitives::{Address, U256};

pub use packet::{Packet, PACKET_HEADER_LEN};
pub use relayer_params::{NativeAirdrop, RelayerParams, AIRDROP_KIND};

/// Decodes a hex string with or without the `0x` prefix.
///
/// # Errors
/// Returns an error if the string contains non-hex characters or has an odd length.
pub fn decode_hex(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let data = data.trim();
    hex::decode(data.strip_prefix("0x").unwrap_or(data))
}

/// A forward-only cursor over a byte slice.
///
/// Every read advances the cursor by the requested width even when fewer bytes are left.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Takes the next `len` bytes, or whatever is left of them.
    fn take(&mut self, len: usize) -> &'a [u8] {
        let start = self.offset.min(self.data.len());
        let end = self.offset.saturating_add(len).min(self.data.len());
        self.offset = self.offset.saturating_add(len);
        &self.data[start..end]
    }

    /// Takes all remaining bytes.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let start = self.offset.min(self.data.len());
        self.offset = self.data.len();
        &self.data[start..]
    }

    /// Reads a big-endian unsigned integer of `len <= 8` bytes.
    pub(crate) fn next_uint(&mut self, len: usize) -> u64 {
        debug_assert!(len <= 8);
        self.take(len)
            .iter()
            .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    /// Reads a 2 byte big-endian integer.
    pub(crate) fn next_u16(&mut self) -> u16 {
        // at most two bytes are folded, the value always fits
        u16::try_from(self.next_uint(2)).unwrap_or(u16::MAX)
    }

    /// Reads a 32 byte big-endian integer.
    pub(crate) fn next_u256(&mut self) -> U256 {
        U256::from_be_slice(self.take(32))
    }

    /// Reads a 20 byte address. Missing trailing bytes are zero.
    pub(crate) fn next_address(&mut self) -> Address {
        let bytes = self.take(20);
        let mut buf = [0_u8; 20];
        buf[..bytes.len()].copy_from_slice(bytes);
        Address::from(buf)
    }
}
