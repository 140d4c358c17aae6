//! Solidity types for `UltraLightNodeV2.sol`, the default send library of the endpoint.
//!
//! Only the two events emitted on `send` are bound: `Packet` carries the encoded packet and
//! `RelayerParams` carries the adapter parameters of the same transaction.

use alloy_sol_types::SolEvent;

alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    interface IUltraLightNodeV2 {
        event Packet(bytes payload);
        event RelayerParams(bytes adapterParams, uint16 outboundProofType);
    }
);

/// Returns the topic0 of the `Packet` event.
#[must_use]
pub const fn packet_signature_hash() -> alloy_primitives::B256 {
    IUltraLightNodeV2::Packet::SIGNATURE_HASH
}

/// Returns the topic0 of the `RelayerParams` event.
#[must_use]
pub const fn relayer_params_signature_hash() -> alloy_primitives::B256 {
    IUltraLightNodeV2::RelayerParams::SIGNATURE_HASH
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn signatures_match_the_deployed_events() {
        assert_eq!(packet_signature_hash(), keccak256("Packet(bytes)"));
        assert_eq!(
            relayer_params_signature_hash(),
            keccak256("RelayerParams(bytes,uint16)")
        );
    }
}
