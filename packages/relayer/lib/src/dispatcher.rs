//! The per-packet delivery pipeline.
//!
//! For every packet event the [`Dispatcher`] decodes the packet, routes it to a destination,
//! fetches the relayer params emitted with it, forwards the native airdrop and finally calls
//! `lzReceive` on the receiving application as the impersonated endpoint.

use std::{fmt, sync::Arc};

use alloy::{
    primitives::{utils::format_ether, Address, Bytes, TxHash, U256},
    sol_types::SolCall,
};
use lz_devkit_solidity_types::lz_app::ILayerZeroReceiver::lzReceiveCall;

use crate::{
    chain::DestinationConnection,
    codec::{NativeAirdrop, Packet, RelayerParams, PACKET_HEADER_LEN},
    error::{error_chain, DispatchError},
    listener::{PacketEvent, RelayerParamsLookup},
    log_sink::RelayLog,
    router::route,
    watcher::PacketHandler,
};

/// Write access to a destination chain.
#[async_trait::async_trait]
pub trait DestinationChain: Send + Sync {
    /// Sends `amount` wei from `from` to `to`.
    async fn send_native(&self, from: Address, to: Address, amount: U256)
        -> anyhow::Result<TxHash>;

    /// Executes `delivery` from `from`. Fails if the call reverts.
    async fn deliver(&self, from: Address, delivery: &Delivery) -> anyhow::Result<TxHash>;
}

/// An `lzReceive` call on the receiving application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// The receiving application.
    pub app: Address,
    /// Protocol chain id of the source.
    pub src_chain_id: u16,
    /// Source and destination application addresses, concatenated.
    pub path: Bytes,
    /// The packet nonce.
    pub nonce: u64,
    /// The application payload.
    pub payload: Bytes,
    /// Gas limit requested by the sender, `None` to let the node estimate.
    pub gas_limit: Option<u64>,
}

impl Delivery {
    /// Builds the delivery of `packet`.
    #[must_use]
    pub fn new(packet: &Packet, gas_limit: Option<u64>) -> Self {
        Self {
            app: packet.dst_address,
            src_chain_id: packet.src_chain_id,
            path: packet.path(),
            nonce: packet.nonce,
            payload: packet.payload.clone(),
            gas_limit,
        }
    }

    /// The ABI encoded `lzReceive` call.
    #[must_use]
    pub fn calldata(&self) -> Bytes {
        lzReceiveCall {
            srcChainId: self.src_chain_id,
            srcAddress: self.path.clone(),
            nonce: self.nonce,
            payload: self.payload.clone(),
        }
        .abi_encode()
        .into()
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.lzReceive({}, {}, {}, {})",
            self.app, self.src_chain_id, self.path, self.nonce, self.payload
        )
    }
}

/// The transactions a successful dispatch produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// The destination network label.
    pub destination: String,
    /// The airdrop transfer, if one was forwarded.
    pub funding_tx: Option<TxHash>,
    /// The `lzReceive` transaction.
    pub delivery_tx: TxHash,
}

/// Delivers the packets of one source network.
pub struct Dispatcher {
    network: String,
    destinations: Arc<[DestinationConnection]>,
    params: Arc<dyn RelayerParamsLookup>,
    log: Arc<dyn RelayLog>,
}

impl Dispatcher {
    /// Create a new [`Dispatcher`] for the source `network`.
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        destinations: impl Into<Arc<[DestinationConnection]>>,
        params: Arc<dyn RelayerParamsLookup>,
        log: Arc<dyn RelayLog>,
    ) -> Self {
        Self {
            network: network.into(),
            destinations: destinations.into(),
            params,
            log,
        }
    }

    /// The source network label.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The destinations packets can be routed to.
    #[must_use]
    pub fn destinations(&self) -> &[DestinationConnection] {
        &self.destinations
    }

    /// Delivers one packet.
    ///
    /// # Errors
    /// Returns a [`DispatchError`] if the packet cannot be routed, its relayer params cannot be
    /// fetched or one of the destination transactions fails.
    #[tracing::instrument(skip_all, fields(network = %self.network, tx_hash = ?event.tx_hash))]
    pub async fn dispatch(&self, event: &PacketEvent) -> Result<DeliveryOutcome, DispatchError> {
        if event.packet.len() < PACKET_HEADER_LEN {
            tracing::warn!(len = event.packet.len(), "packet shorter than its header");
        }

        let packet = Packet::decode(&event.packet);
        self.log.append(
            &self.network,
            &format!(
                "event Packet({}, {}, {}, {}, {})",
                packet.src_chain_id,
                packet.src_address,
                packet.dst_chain_id,
                packet.dst_address,
                packet.nonce
            ),
        );

        let destination = route(packet.dst_chain_id, &self.destinations)
            .ok_or(DispatchError::UnknownDestinationChain(packet.dst_chain_id))?;

        let params = self.relayer_params(event).await?;

        let funding_tx = match params.as_ref().and_then(RelayerParams::payable_airdrop) {
            Some(airdrop) => Some(self.forward_airdrop(destination, airdrop).await?),
            None => None,
        };

        let delivery = Delivery::new(&packet, params.as_ref().and_then(RelayerParams::gas_limit_u64));
        let delivery_tx = destination
            .client
            .deliver(destination.authority.account, &delivery)
            .await
            .map_err(|source| DispatchError::DeliveryFailure {
                network: destination.name.clone(),
                app: delivery.app,
                source,
            })?;
        self.log
            .append(&destination.name, &format!("execute {delivery}"));
        self.log.append(&destination.name, &delivery_tx.to_string());

        Ok(DeliveryOutcome {
            destination: destination.name.clone(),
            funding_tx,
            delivery_tx,
        })
    }

    /// Writes the result of [`Dispatcher::dispatch`] to the relay log.
    pub fn record(&self, result: &Result<DeliveryOutcome, DispatchError>) {
        match result {
            Ok(outcome) => tracing::info!(
                network = %self.network,
                destination = %outcome.destination,
                delivery_tx = %outcome.delivery_tx,
                "packet delivered"
            ),
            Err(err) => {
                tracing::error!(network = %self.network, reason = err.reason(), "{err}");
                self.log.append(&self.network, &error_chain(err));
            }
        }
    }

    async fn relayer_params(
        &self,
        event: &PacketEvent,
    ) -> Result<Option<RelayerParams>, DispatchError> {
        let Some(raw) = self
            .params
            .relayer_params(event)
            .await
            .map_err(DispatchError::RelayerParams)?
        else {
            self.log.append(
                &self.network,
                "warning: no RelayerParams event for packet, delivering without gas limit",
            );
            return Ok(None);
        };

        let params = RelayerParams::decode(&raw);
        let message = match &params.airdrop {
            Some(airdrop) => format!(
                "event RelayerParams({}, {}, {})",
                params.gas_limit, airdrop.amount, airdrop.recipient
            ),
            None => format!("event RelayerParams({})", params.gas_limit),
        };
        self.log.append(&self.network, &message);

        Ok(Some(params))
    }

    async fn forward_airdrop(
        &self,
        destination: &DestinationConnection,
        airdrop: &NativeAirdrop,
    ) -> Result<TxHash, DispatchError> {
        let tx_hash = destination
            .client
            .send_native(destination.authority.account, airdrop.recipient, airdrop.amount)
            .await
            .map_err(|source| DispatchError::FundingFailure {
                network: destination.name.clone(),
                recipient: airdrop.recipient,
                source,
            })?;

        self.log.append(
            &self.network,
            &format!("sent {} to {}", format_ether(airdrop.amount), airdrop.recipient),
        );
        self.log.append(&destination.name, &tx_hash.to_string());
        Ok(tx_hash)
    }
}

#[async_trait::async_trait]
impl PacketHandler for Dispatcher {
    async fn handle(&self, event: PacketEvent) {
        let result = self.dispatch(&event).await;
        self.record(&result);
    }
}
