//! Acquiring the right to act as the messaging endpoint on a destination chain.
//!
//! Local forks let any account be impersonated. The relayer impersonates the endpoint, which is
//! the only caller the receiving application accepts, and optionally tops up its balance so it
//! can pay for deliveries.

use alloy::primitives::{Address, U256};

use crate::{chain::Authority, error::RelayerError};

/// Metadata of the network a local node forked from.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkedNetwork {
    /// Chain id of the forked network.
    pub chain_id: u64,
    /// Block the fork was taken at.
    pub fork_block_number: u64,
    /// Hash of that block.
    pub fork_block_hash: String,
}

/// The control-plane methods of a local test network.
#[async_trait::async_trait]
pub trait TestNetworkControl: Send + Sync {
    /// Lets transactions be sent from `account` without its key.
    async fn impersonate_account(&self, account: Address) -> anyhow::Result<()>;

    /// Overwrites the balance of `account`.
    async fn set_balance(&self, account: Address, amount: U256) -> anyhow::Result<()>;

    /// Returns the forked network, `None` if the node is not a fork.
    async fn fork_metadata(&self) -> anyhow::Result<Option<ForkedNetwork>>;

    /// The native chain id reported by the node.
    async fn chain_id(&self) -> anyhow::Result<u64>;
}

/// Impersonates `account` on `network` and funds it with `funding` wei if given.
///
/// # Errors
/// Returns [`RelayerError::AuthorityUnavailable`] if the node refuses either request.
#[tracing::instrument(skip_all, fields(%network, %account), err(Display))]
pub async fn acquire_authority(
    network: &str,
    control: &dyn TestNetworkControl,
    account: Address,
    funding: Option<U256>,
) -> Result<Authority, RelayerError> {
    let unavailable = |source: anyhow::Error| RelayerError::AuthorityUnavailable {
        network: network.to_string(),
        account,
        source,
    };

    control
        .impersonate_account(account)
        .await
        .map_err(unavailable)?;

    if let Some(amount) = funding.filter(|amount| !amount.is_zero()) {
        control
            .set_balance(account, amount)
            .await
            .map_err(unavailable)?;
        tracing::debug!(%amount, "funded impersonated account");
    }

    tracing::info!("acquired authority");
    Ok(Authority { account })
}
