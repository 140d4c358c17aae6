//! Errors surfaced by the relay engine.
//!
//! [`RelayerError`] covers start-up and transport failures, which abort the affected relayer.
//! [`DispatchError`] covers a single packet and is always caught at the dispatcher boundary.

use std::{error::Error, fmt::Write as _};

use alloy::primitives::Address;

/// Start-up and transport errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    /// The network is not present in the configuration.
    #[error("network {0} not found")]
    NetworkNotFound(String),
    /// The network is configured but lacks a field required to connect to it.
    #[error("cannot get {field} from network {network}")]
    MissingConnectionInfo {
        /// The network label.
        network: String,
        /// The missing field.
        field: &'static str,
    },
    /// The node refused to hand over control of the endpoint account.
    #[error("cannot act as {account} on {network}")]
    AuthorityUnavailable {
        /// The network label.
        network: String,
        /// The account that could not be impersonated or funded.
        account: Address,
        /// The node's answer.
        #[source]
        source: anyhow::Error,
    },
    /// A read from the messaging endpoint failed.
    #[error("endpoint {endpoint} query failed on {network}")]
    EndpointQuery {
        /// The network label.
        network: String,
        /// The endpoint contract.
        endpoint: Address,
        /// The transport error.
        #[source]
        source: anyhow::Error,
    },
    /// A subscription on the source chain ended.
    #[error("{stream} subscription on {network} closed")]
    StreamClosed {
        /// The network label.
        network: String,
        /// Which stream ended.
        stream: &'static str,
    },
    /// Any other transport failure.
    #[error("transport error on {network}")]
    Transport {
        /// The network label.
        network: String,
        /// The transport error.
        #[source]
        source: anyhow::Error,
    },
}

/// Per-packet errors. None of these stop the watcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No configured destination has the packet's protocol chain id.
    #[error("unknown destination chain {0}")]
    UnknownDestinationChain(u16),
    /// The relayer parameters of the packet's transaction could not be fetched.
    #[error("cannot fetch relayer params")]
    RelayerParams(#[source] anyhow::Error),
    /// Forwarding the native airdrop failed.
    #[error("airdrop to {recipient} on {network} failed")]
    FundingFailure {
        /// The destination network label.
        network: String,
        /// The airdrop recipient.
        recipient: Address,
        /// The transport or execution error.
        #[source]
        source: anyhow::Error,
    },
    /// The delivery call reverted or the transport failed.
    #[error("delivery to {app} on {network} failed")]
    DeliveryFailure {
        /// The destination network label.
        network: String,
        /// The receiving application.
        app: Address,
        /// The transport or execution error.
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// A short, stable label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnknownDestinationChain(_) => "unknown_destination",
            Self::RelayerParams(_) => "relayer_params",
            Self::FundingFailure { .. } => "funding",
            Self::DeliveryFailure { .. } => "delivery",
        }
    }
}

/// `error: <err>: <cause>: ...` on a single line.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut message = format!("error: {err}");
    let mut cause = err.source();
    while let Some(inner) = cause {
        let _ = write!(message, ": {inner}");
        cause = inner.source();
    }
    message
}
