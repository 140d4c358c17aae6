//! Defines the [`PacketSource`] and [`RelayerParamsLookup`] traits and the alloy listener
//! implementing them.

pub mod uln;

use alloy::primitives::{Bytes, TxHash, B256};
use futures::stream::BoxStream;

/// A stream of block numbers, in the order the node reports them.
pub type BlockStream = BoxStream<'static, u64>;

/// A stream of packet events from one subscription.
pub type PacketStream = BoxStream<'static, PacketEvent>;

/// An open packet subscription.
///
/// Dropping `events` only stops local delivery. The node keeps the filter until the
/// subscription is closed with [`PacketSource::unsubscribe_packets`].
pub struct PacketSubscription {
    /// Identifies the subscription to the source that opened it.
    pub id: B256,
    /// The packet events.
    pub events: PacketStream,
}

/// One `Packet` event observed on the source chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketEvent {
    /// The encoded packet.
    pub packet: Bytes,
    /// The transaction that emitted the event.
    pub tx_hash: Option<TxHash>,
    /// The block the transaction was included in.
    pub block_number: Option<u64>,
}

/// The live event feed of a source chain.
///
/// Every call to [`PacketSource::subscribe_packets`] opens a new subscription on the node.
#[async_trait::async_trait]
pub trait PacketSource: Send + Sync {
    /// The current block height.
    async fn block_number(&self) -> anyhow::Result<u64>;

    /// Subscribes to new block notifications.
    async fn subscribe_blocks(&self) -> anyhow::Result<BlockStream>;

    /// Subscribes to packet events on the send library.
    async fn subscribe_packets(&self) -> anyhow::Result<PacketSubscription>;

    /// Closes the packet subscription `id` on the node.
    async fn unsubscribe_packets(&self, id: B256) -> anyhow::Result<()>;
}

/// Finds the adapter parameters that were emitted with a packet.
#[async_trait::async_trait]
pub trait RelayerParamsLookup: Send + Sync {
    /// Returns the encoded relayer params of the packet's transaction, `None` if there are none.
    async fn relayer_params(&self, event: &PacketEvent) -> anyhow::Result<Option<Bytes>>;
}
