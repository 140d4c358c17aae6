//! Network resolution and the protocol chain id mapping.
//!
//! The [`ChainRegistry`] is built once per relayer run and passed to every component that needs
//! network information. It owns the protocol chain id cache, so nothing here is process global.

use std::sync::Arc;

use alloy::primitives::Address;
use moka::future::Cache;

use crate::{authority::TestNetworkControl, dispatcher::DestinationChain, error::RelayerError};

/// Protocol chain ids below this value are legacy ids and are shifted by the same amount.
pub const LEGACY_CHAIN_ID_OFFSET: u16 = 100;

/// Maps the raw `chainId()` of an endpoint to the id used inside packets.
#[must_use]
pub const fn normalize_protocol_chain_id(raw: u16) -> u16 {
    if raw < LEGACY_CHAIN_ID_OFFSET {
        raw + LEGACY_CHAIN_ID_OFFSET
    } else {
        raw
    }
}

/// Connection settings of a network as found in the configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkParams {
    /// JSON-RPC url.
    pub url: Option<String>,
    /// Websocket url, derived from `url` when absent.
    pub ws_url: Option<String>,
    /// Native chain id of the (forked) network.
    pub chain_id: Option<u64>,
    /// Endpoint address override for this network.
    pub endpoint: Option<Address>,
}

/// Read access to the network configuration.
pub trait NetworkLookup: Send + Sync {
    /// Returns the settings of the network called `name`.
    fn network(&self, name: &str) -> Option<NetworkParams>;

    /// Returns the endpoint deployed on the chain with the given origin chain id.
    fn endpoint(&self, origin_chain_id: u64) -> Option<Address>;
}

/// Read access to the messaging endpoint contract.
#[async_trait::async_trait]
pub trait EndpointReader: Send + Sync {
    /// The raw `chainId()` of the endpoint, before normalization.
    async fn endpoint_chain_id(&self, endpoint: Address) -> anyhow::Result<u16>;

    /// The default send library of the endpoint, which emits the packet events.
    async fn default_send_library(&self, endpoint: Address) -> anyhow::Result<Address>;
}

/// Resolved connection parameters of a network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParams {
    /// The network label.
    pub name: String,
    /// JSON-RPC url.
    pub url: String,
    /// Websocket url used for subscriptions.
    pub ws_url: String,
    /// Native chain id.
    pub chain_id: u64,
}

/// The signing identity used on a destination chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authority {
    /// The impersonated account. The node signs on its behalf.
    pub account: Address,
}

/// A destination the relayer delivers to. Built at start-up and only read afterwards.
#[derive(Clone)]
pub struct DestinationConnection {
    /// The network label.
    pub name: String,
    /// Native chain id of the network.
    pub local_chain_id: u64,
    /// Chain id of the network the node forked from, used to find the endpoint.
    pub origin_chain_id: u64,
    /// Normalized protocol chain id, matched against packet destinations.
    pub protocol_chain_id: u16,
    /// The messaging endpoint contract.
    pub endpoint: Address,
    /// The identity deliveries are sent from.
    pub authority: Authority,
    /// The RPC handle.
    pub client: Arc<dyn DestinationChain>,
}

impl std::fmt::Debug for DestinationConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConnection")
            .field("name", &self.name)
            .field("local_chain_id", &self.local_chain_id)
            .field("origin_chain_id", &self.origin_chain_id)
            .field("protocol_chain_id", &self.protocol_chain_id)
            .field("endpoint", &self.endpoint)
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

/// Resolves networks and caches protocol chain ids for the lifetime of a relayer run.
pub struct ChainRegistry {
    lookup: Arc<dyn NetworkLookup>,
    protocol_chain_ids: Cache<u64, u16>,
}

impl ChainRegistry {
    /// Maximum number of cached protocol chain ids.
    const CACHE_CAPACITY: u64 = 1_024;

    /// Create a new [`ChainRegistry`] on top of the configuration.
    #[must_use]
    pub fn new(lookup: Arc<dyn NetworkLookup>) -> Self {
        Self {
            lookup,
            protocol_chain_ids: Cache::new(Self::CACHE_CAPACITY),
        }
    }

    /// Resolves the connection parameters of `name`.
    ///
    /// # Errors
    /// Returns [`RelayerError::NetworkNotFound`] if the network is not configured and
    /// [`RelayerError::MissingConnectionInfo`] if it has no url or chain id.
    pub fn resolve_network(&self, name: &str) -> Result<ConnectionParams, RelayerError> {
        let params = self
            .lookup
            .network(name)
            .ok_or_else(|| RelayerError::NetworkNotFound(name.to_string()))?;

        let url = params
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RelayerError::MissingConnectionInfo {
                network: name.to_string(),
                field: "url",
            })?;
        let chain_id = params
            .chain_id
            .ok_or_else(|| RelayerError::MissingConnectionInfo {
                network: name.to_string(),
                field: "chain_id",
            })?;
        let ws_url = params.ws_url.unwrap_or_else(|| to_ws_url(&url));

        Ok(ConnectionParams {
            name: name.to_string(),
            url,
            ws_url,
            chain_id,
        })
    }

    /// Returns the endpoint of `network`: the per-network override first, then the endpoint
    /// table entry for `origin_chain_id`.
    ///
    /// # Errors
    /// Returns [`RelayerError::MissingConnectionInfo`] if neither is configured.
    pub fn endpoint_address(
        &self,
        network: &str,
        origin_chain_id: u64,
    ) -> Result<Address, RelayerError> {
        self.lookup
            .network(network)
            .and_then(|params| params.endpoint)
            .or_else(|| self.lookup.endpoint(origin_chain_id))
            .ok_or_else(|| RelayerError::MissingConnectionInfo {
                network: network.to_string(),
                field: "endpoint",
            })
    }

    /// Returns the chain id of the network the node forked from, or its own chain id when it is
    /// not a fork.
    ///
    /// # Errors
    /// Returns [`RelayerError::Transport`] if the chain id cannot be read.
    pub async fn origin_chain_id(
        &self,
        network: &str,
        control: &dyn TestNetworkControl,
    ) -> Result<u64, RelayerError> {
        match control.fork_metadata().await {
            Ok(Some(forked)) => return Ok(forked.chain_id),
            Ok(None) => tracing::debug!(%network, "network is not a fork"),
            Err(e) => tracing::debug!(%network, error = %e, "fork metadata unavailable"),
        }

        control
            .chain_id()
            .await
            .map_err(|source| RelayerError::Transport {
                network: network.to_string(),
                source,
            })
    }

    /// Returns the normalized protocol chain id served by `endpoint`, cached per native chain id.
    ///
    /// # Errors
    /// Returns [`RelayerError::EndpointQuery`] if the endpoint cannot be read.
    pub async fn protocol_chain_id(
        &self,
        network: &str,
        native_chain_id: u64,
        endpoint: Address,
        reader: &dyn EndpointReader,
    ) -> Result<u16, RelayerError> {
        if let Some(cached) = self.protocol_chain_ids.get(&native_chain_id).await {
            return Ok(cached);
        }

        let raw = reader
            .endpoint_chain_id(endpoint)
            .await
            .map_err(|source| RelayerError::EndpointQuery {
                network: network.to_string(),
                endpoint,
                source,
            })?;
        let protocol_chain_id = normalize_protocol_chain_id(raw);
        self.protocol_chain_ids
            .insert(native_chain_id, protocol_chain_id)
            .await;

        tracing::debug!(%network, raw, protocol_chain_id, "resolved protocol chain id");
        Ok(protocol_chain_id)
    }
}

/// Swaps an http(s) scheme for the matching ws(s) scheme. Other urls are returned unchanged.
fn to_ws_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
