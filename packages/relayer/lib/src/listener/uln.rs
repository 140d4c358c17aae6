//! This module defines the chain listener for the `UltraLightNodeV2` send library.

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use anyhow::{Context, Result};
use futures::StreamExt;
use lz_devkit_solidity_types::uln::{
    packet_signature_hash, relayer_params_signature_hash, IUltraLightNodeV2,
};

use super::{BlockStream, PacketEvent, PacketSource, PacketSubscription, RelayerParamsLookup};

/// Listens for packets on a send library over a websocket connection.
#[derive(Clone, Debug)]
pub struct UlnListener {
    /// The send library emitting `Packet` and `RelayerParams`.
    node: Address,
    /// A pubsub capable provider.
    provider: RootProvider,
}

impl UlnListener {
    /// Create a new [`UlnListener`] on an existing provider.
    #[must_use]
    pub const fn new(node: Address, provider: RootProvider) -> Self {
        Self { node, provider }
    }

    /// Connects to `ws_url` and listens on `node`.
    ///
    /// # Errors
    /// Returns an error if the websocket connection cannot be established.
    pub async fn connect(ws_url: &str, node: Address) -> Result<Self> {
        let provider = RootProvider::builder()
            .connect(ws_url)
            .await
            .with_context(|| format!("failed to connect to {ws_url}"))?;
        Ok(Self::new(node, provider))
    }

    /// The send library being watched.
    #[must_use]
    pub const fn node(&self) -> Address {
        self.node
    }
}

#[async_trait::async_trait]
impl PacketSource for UlnListener {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn subscribe_blocks(&self) -> Result<BlockStream> {
        let subscription = self.provider.subscribe_blocks().await?;
        Ok(subscription
            .into_stream()
            .map(|header| header.number)
            .boxed())
    }

    async fn subscribe_packets(&self) -> Result<PacketSubscription> {
        let filter = Filter::new()
            .address(self.node)
            .event_signature(packet_signature_hash());

        let subscription = self.provider.subscribe_logs(&filter).await?;
        Ok(PacketSubscription {
            id: *subscription.local_id(),
            events: subscription
                .into_stream()
                .filter_map(|log| futures::future::ready(packet_event_from_log(&log)))
                .boxed(),
        })
    }

    async fn unsubscribe_packets(&self, id: B256) -> Result<()> {
        // sends `eth_unsubscribe` for the server id currently mapped to `id`
        self.provider.unsubscribe(id)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RelayerParamsLookup for UlnListener {
    async fn relayer_params(&self, event: &PacketEvent) -> Result<Option<Bytes>> {
        let (Some(tx_hash), Some(block_number)) = (event.tx_hash, event.block_number) else {
            return Ok(None);
        };

        let filter = Filter::new()
            .address(self.node)
            .event_signature(relayer_params_signature_hash())
            .from_block(block_number)
            .to_block(block_number);

        Ok(self
            .provider
            .get_logs(&filter)
            .await?
            .iter()
            .filter(|log| log.transaction_hash == Some(tx_hash))
            .find_map(|log| {
                IUltraLightNodeV2::RelayerParams::decode_log_data(&log.inner.data).ok()
            })
            .map(|event| event.adapterParams))
    }
}

/// Decodes a `Packet` log. Logs removed by a reorg and undecodable logs are skipped.
fn packet_event_from_log(log: &Log) -> Option<PacketEvent> {
    if log.removed {
        tracing::debug!(tx_hash = ?log.transaction_hash, "skipping removed packet log");
        return None;
    }

    match IUltraLightNodeV2::Packet::decode_log_data(&log.inner.data) {
        Ok(event) => Some(PacketEvent {
            packet: event.payload,
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
        }),
        Err(e) => {
            tracing::warn!(tx_hash = ?log.transaction_hash, error = %e, "undecodable packet log");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, hex, LogData, B256};

    const NODE: Address = address!("0x4D73AdB72bC3DD368966edD0f0b2148401A178E2");

    fn packet_log(payload: &[u8], removed: bool) -> Log {
        let event = IUltraLightNodeV2::Packet {
            payload: Bytes::copy_from_slice(payload),
        };
        Log {
            inner: alloy::primitives::Log {
                address: NODE,
                data: event.encode_log_data(),
            },
            transaction_hash: Some(B256::repeat_byte(0xaa)),
            block_number: Some(42),
            removed,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_packet_logs() {
        let event = packet_event_from_log(&packet_log(&hex!("00010203"), false)).unwrap();
        assert_eq!(event.packet.as_ref(), hex!("00010203"));
        assert_eq!(event.tx_hash, Some(B256::repeat_byte(0xaa)));
        assert_eq!(event.block_number, Some(42));
    }

    #[test]
    fn skips_removed_logs() {
        assert!(packet_event_from_log(&packet_log(&[1], true)).is_none());
    }

    #[test]
    fn skips_foreign_logs() {
        let log = Log {
            inner: alloy::primitives::Log {
                address: NODE,
                data: LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
            },
            ..Default::default()
        };
        assert!(packet_event_from_log(&log).is_none());
    }
}
