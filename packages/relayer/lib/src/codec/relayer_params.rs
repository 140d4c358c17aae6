//! The adapter parameters emitted alongside a packet in the `RelayerParams` event.

use alloy::primitives::{Address, U256};

use super::{decode_hex, ByteReader};

/// The adapter parameter kind that carries a native-currency airdrop.
pub const AIRDROP_KIND: u16 = 2;

/// Execution parameters for delivering a packet on its destination chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelayerParams {
    /// The adapter parameter kind. Only [`AIRDROP_KIND`] carries a payment.
    pub kind: u16,
    /// Gas budget for the delivery call.
    pub gas_limit: U256,
    /// Native currency to forward before delivery, present only for [`AIRDROP_KIND`].
    pub airdrop: Option<NativeAirdrop>,
}

/// A native-currency transfer requested by the sender on the destination chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NativeAirdrop {
    /// Amount in wei.
    pub amount: U256,
    /// Receiver of the amount.
    pub recipient: Address,
}

impl RelayerParams {
    /// Decodes adapter parameters: 2 bytes kind, 32 bytes gas limit and, only for
    /// [`AIRDROP_KIND`], 32 bytes amount followed by a 20 byte recipient.
    #[must_use]
    pub fn decode(data: &[u8]) -> Self {
        let mut reader = ByteReader::new(data);
        let kind = reader.next_u16();
        let gas_limit = reader.next_u256();
        let airdrop = (kind == AIRDROP_KIND).then(|| NativeAirdrop {
            amount: reader.next_u256(),
            recipient: reader.next_address(),
        });

        Self {
            kind,
            gas_limit,
            airdrop,
        }
    }

    /// Decodes adapter parameters from a hex string, `0x` prefix optional.
    ///
    /// # Errors
    /// Returns an error if `data` is not valid hex.
    pub fn from_hex(data: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self::decode(&decode_hex(data)?))
    }

    /// The gas limit to attach to the delivery transaction. `None` when unset or too large for a
    /// transaction, leaving the estimate to the node.
    #[must_use]
    pub fn gas_limit_u64(&self) -> Option<u64> {
        u64::try_from(self.gas_limit).ok().filter(|gas| *gas != 0)
    }

    /// The airdrop to perform before delivery, only when it moves a nonzero amount.
    #[must_use]
    pub fn payable_airdrop(&self) -> Option<&NativeAirdrop> {
        self.airdrop
            .as_ref()
            .filter(|airdrop| !airdrop.amount.is_zero())
    }
}
