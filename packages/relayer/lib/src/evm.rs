//! The alloy JSON-RPC client of a local EVM node and the start-up wiring built on it.

use std::{sync::Arc, time::Duration};

use alloy::{
    network::{ReceiptResponse as _, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    providers::{Provider, RootProvider},
    rpc::types::TransactionRequest,
};
use anyhow::{ensure, Context, Result};
use lz_devkit_solidity_types::endpoint::ILayerZeroEndpoint;

use crate::{
    authority::{acquire_authority, ForkedNetwork, TestNetworkControl},
    chain::{ChainRegistry, ConnectionParams, DestinationConnection, EndpointReader},
    dispatcher::{DestinationChain, Delivery},
    error::RelayerError,
};

/// How long to wait for a destination transaction to be mined.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// A JSON-RPC connection to a local EVM node.
#[derive(Clone, Debug)]
pub struct EvmClient {
    provider: RootProvider,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeMetadata {
    #[serde(default)]
    forked_network: Option<ForkedNetwork>,
}

impl EvmClient {
    /// Create a new [`EvmClient`] on an existing provider.
    #[must_use]
    pub const fn new(provider: RootProvider) -> Self {
        Self { provider }
    }

    /// Connects to `url`. Websocket and http urls are both accepted.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = RootProvider::builder()
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        Ok(Self::new(provider))
    }

    /// The underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &RootProvider {
        &self.provider
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .with_context(|| format!("no receipt for {tx_hash}"))?;
        ensure!(receipt.status(), "transaction {tx_hash} reverted");

        Ok(tx_hash)
    }
}

#[async_trait::async_trait]
impl TestNetworkControl for EvmClient {
    async fn impersonate_account(&self, account: Address) -> Result<()> {
        self.provider
            .raw_request::<_, serde_json::Value>("hardhat_impersonateAccount".into(), (account,))
            .await?;
        Ok(())
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<()> {
        self.provider
            .raw_request::<_, serde_json::Value>("hardhat_setBalance".into(), (account, amount))
            .await?;
        Ok(())
    }

    async fn fork_metadata(&self) -> Result<Option<ForkedNetwork>> {
        let metadata: NodeMetadata = self
            .provider
            .raw_request("hardhat_metadata".into(), ())
            .await?;
        Ok(metadata.forked_network)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }
}

#[async_trait::async_trait]
impl EndpointReader for EvmClient {
    async fn endpoint_chain_id(&self, endpoint: Address) -> Result<u16> {
        let instance = ILayerZeroEndpoint::new(endpoint, self.provider.clone());
        Ok(instance.chainId().call().await?)
    }

    async fn default_send_library(&self, endpoint: Address) -> Result<Address> {
        let instance = ILayerZeroEndpoint::new(endpoint, self.provider.clone());
        Ok(instance.defaultSendLibrary().call().await?)
    }
}

#[async_trait::async_trait]
impl DestinationChain for EvmClient {
    async fn send_native(&self, from: Address, to: Address, amount: U256) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(amount);
        self.submit(tx).await
    }

    async fn deliver(&self, from: Address, delivery: &Delivery) -> Result<TxHash> {
        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(delivery.app)
            .with_input(delivery.calldata());
        if let Some(gas_limit) = delivery.gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }
        self.submit(tx).await
    }
}

/// Connects to the destination `name` and takes over its endpoint.
///
/// # Errors
/// Returns a [`RelayerError`] if the network is not configured, unreachable, or refuses
/// impersonation.
#[tracing::instrument(skip(registry, funding), err(Display))]
pub async fn connect_destination(
    registry: &ChainRegistry,
    name: &str,
    funding: Option<U256>,
) -> Result<DestinationConnection, RelayerError> {
    let params = registry.resolve_network(name)?;
    let client = EvmClient::connect(&params.url)
        .await
        .map_err(|source| RelayerError::Transport {
            network: name.to_string(),
            source,
        })?;

    build_destination(registry, &params, Arc::new(client), funding).await
}

/// Resolves the endpoint and protocol chain id of a destination on `client`, then acquires
/// its authority.
///
/// # Errors
/// Returns a [`RelayerError`] if any of the lookups fails.
pub async fn build_destination<C>(
    registry: &ChainRegistry,
    params: &ConnectionParams,
    client: Arc<C>,
    funding: Option<U256>,
) -> Result<DestinationConnection, RelayerError>
where
    C: TestNetworkControl + EndpointReader + DestinationChain + 'static,
{
    let origin_chain_id = registry
        .origin_chain_id(&params.name, client.as_ref())
        .await?;
    let endpoint = registry.endpoint_address(&params.name, origin_chain_id)?;
    let protocol_chain_id = registry
        .protocol_chain_id(&params.name, params.chain_id, endpoint, client.as_ref())
        .await?;
    let authority = acquire_authority(&params.name, client.as_ref(), endpoint, funding).await?;

    tracing::info!(
        network = %params.name,
        origin_chain_id,
        protocol_chain_id,
        %endpoint,
        "destination ready"
    );

    Ok(DestinationConnection {
        name: params.name.clone(),
        local_chain_id: params.chain_id,
        origin_chain_id,
        protocol_chain_id,
        endpoint,
        authority,
        client,
    })
}

/// Returns the send library to listen on: `node` if given, otherwise the default send library
/// of the source endpoint.
///
/// # Errors
/// Returns a [`RelayerError`] if the endpoint cannot be resolved or queried.
pub async fn resolve_send_library<C>(
    registry: &ChainRegistry,
    params: &ConnectionParams,
    client: &C,
    node: Option<Address>,
) -> Result<Address, RelayerError>
where
    C: TestNetworkControl + EndpointReader,
{
    if let Some(node) = node {
        return Ok(node);
    }

    let origin_chain_id = registry.origin_chain_id(&params.name, client).await?;
    let endpoint = registry.endpoint_address(&params.name, origin_chain_id)?;
    client
        .default_send_library(endpoint)
        .await
        .map_err(|source| RelayerError::EndpointQuery {
            network: params.name.clone(),
            endpoint,
            source,
        })
}
