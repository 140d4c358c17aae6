//! The packet emitted by `UltraLightNodeV2` in its `Packet(bytes)` event.

use alloy::primitives::{Address, Bytes};

use super::{decode_hex, ByteReader};

/// Width of the fixed fields: nonce (8), source chain (2), source address (20),
/// destination chain (2) and destination address (20).
pub const PACKET_HEADER_LEN: usize = 8 + 2 + 20 + 2 + 20;

/// A decoded cross-chain packet.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Packet {
    /// Ordering hint for the source/destination pair. Not used for deduplication.
    pub nonce: u64,
    /// Protocol chain id of the sending chain.
    pub src_chain_id: u16,
    /// The sending application.
    pub src_address: Address,
    /// Protocol chain id of the receiving chain.
    pub dst_chain_id: u16,
    /// The receiving application.
    pub dst_address: Address,
    /// Application defined payload, possibly empty.
    pub payload: Bytes,
}

impl Packet {
    /// Decodes a packet from its wire form. Never fails, see the module docs for short input.
    #[must_use]
    pub fn decode(data: &[u8]) -> Self {
        let mut reader = ByteReader::new(data);
        Self {
            nonce: reader.next_uint(8),
            src_chain_id: reader.next_u16(),
            src_address: reader.next_address(),
            dst_chain_id: reader.next_u16(),
            dst_address: reader.next_address(),
            payload: Bytes::copy_from_slice(reader.rest()),
        }
    }

    /// Decodes a packet from a hex string, `0x` prefix optional.
    ///
    /// # Errors
    /// Returns an error if `data` is not valid hex.
    pub fn from_hex(data: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self::decode(&decode_hex(data)?))
    }

    /// The path handed to the receiving application: source address followed by destination address.
    #[must_use]
    pub fn path(&self) -> Bytes {
        [self.src_address.as_slice(), self.dst_address.as_slice()]
            .concat()
            .into()
    }

    /// Encodes the packet back into its wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PACKET_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.src_chain_id.to_be_bytes());
        buf.extend_from_slice(self.src_address.as_slice());
        buf.extend_from_slice(&self.dst_chain_id.to_be_bytes());
        buf.extend_from_slice(self.dst_address.as_slice());
        buf.extend_from_slice(&self.payload);
        buf
    }
}
