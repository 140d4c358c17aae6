//! Selects the destination a packet is delivered to.

use crate::chain::DestinationConnection;

/// Returns the destination whose protocol chain id is `dst_chain_id`.
///
/// Linear match with no fallback: a miss means the packet is addressed to a chain this relayer
/// was not started for.
#[must_use]
pub fn route(
    dst_chain_id: u16,
    destinations: &[DestinationConnection],
) -> Option<&DestinationConnection> {
    destinations
        .iter()
        .find(|destination| destination.protocol_chain_id == dst_chain_id)
}
