//! Defines the top level configuration for the relayer.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_primitives::{address, utils::parse_ether, Address, U256};
use anyhow::{ensure, Context};
use lz_devkit_relayer_lib::chain::{NetworkLookup, NetworkParams};
use tracing::Level;

/// The `Endpoint` shared by most chains of the first protocol version.
const SHARED_ENDPOINT: Address = address!("0x3c2269811836af69497E5F486A85D7316753cf62");

/// Known endpoint deployments, keyed by native chain id.
const DEFAULT_ENDPOINTS: [(u64, Address); 7] = [
    (1, address!("0x66A71Dcef29A0fFBDBE3c6a460a3B5BC225Cd675")),
    (10, SHARED_ENDPOINT),
    (56, SHARED_ENDPOINT),
    (137, SHARED_ENDPOINT),
    (250, SHARED_ENDPOINT),
    (42_161, SHARED_ENDPOINT),
    (43_114, SHARED_ENDPOINT),
];

/// The top level configuration for the relayer.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct RelayerConfig {
    /// The observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// The networks relayers can connect to, keyed by label.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Endpoint addresses keyed by origin chain id. Merged over the known deployments.
    #[serde(default)]
    pub endpoints: BTreeMap<u64, Address>,
    /// One entry per source network.
    pub relayers: Vec<RelayerEntry>,
    /// Directory of the relay logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Ether given to every impersonated endpoint. `null` leaves balances untouched.
    #[serde(default = "default_authority_funding")]
    pub authority_funding: Option<String>,
    /// The metrics endpoint. Disabled when absent.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// The connection settings of one network.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct NetworkConfig {
    /// JSON-RPC url.
    #[serde(default)]
    pub url: Option<String>,
    /// Websocket url. Derived from `url` when absent.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Native chain id of the node.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Endpoint override for this network.
    #[serde(default)]
    pub endpoint: Option<Address>,
}

/// A relayer from one source network to a set of destinations.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct RelayerEntry {
    /// The source network label.
    pub src: String,
    /// The destination network labels.
    pub dest: Vec<String>,
    /// Send library to listen on instead of the endpoint's default.
    #[serde(default)]
    pub node: Option<Address>,
    /// Whether the relayer is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// The configuration for the metrics endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct MetricsConfig {
    /// The address to bind to.
    pub address: String,
    /// The port to bind to.
    pub port: u16,
}

/// The observability configuration for the relayer.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct ObservabilityConfig {
    /// The log level.
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to export traces and logs over OTLP.
    #[serde(default)]
    pub use_otel: bool,
    /// The service name reported to the collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// The OTLP collector endpoint.
    #[serde(default)]
    pub otel_endpoint: Option<String>,
}

/// Returns true, used as a default value for boolean fields.
const fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "lz-devkit-relayer".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".logs/relayers")
}

#[allow(clippy::unnecessary_wraps)]
fn default_authority_funding() -> Option<String> {
    Some("10000".to_string())
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            use_otel: false,
            service_name: default_service_name(),
            otel_endpoint: None,
        }
    }
}

impl ObservabilityConfig {
    /// Returns the log level.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

impl MetricsConfig {
    /// The socket address to bind to.
    ///
    /// # Errors
    /// Returns an error if the address does not parse.
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .with_context(|| format!("invalid metrics address {}:{}", self.address, self.port))
    }
}

impl RelayerConfig {
    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    /// Returns an error with the JSON path of the first invalid field.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        parse_config(json)
    }

    /// The enabled relayers.
    pub fn enabled_relayers(&self) -> impl Iterator<Item = &RelayerEntry> {
        self.relayers.iter().filter(|relayer| relayer.enabled)
    }

    /// The funding of impersonated endpoints in wei.
    ///
    /// # Errors
    /// Returns an error if the amount is not a decimal ether value.
    pub fn authority_funding_wei(&self) -> anyhow::Result<Option<U256>> {
        self.authority_funding
            .as_deref()
            .map(|ether| {
                parse_ether(ether).with_context(|| format!("invalid authority_funding {ether}"))
            })
            .transpose()
    }

    /// Checks the references between relayers and networks.
    ///
    /// # Errors
    /// Returns an error describing the first inconsistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.authority_funding_wei()?;

        let mut sources = BTreeSet::new();
        for relayer in self.enabled_relayers() {
            ensure!(
                self.networks.contains_key(&relayer.src),
                "relayer source {} is not a configured network",
                relayer.src
            );
            ensure!(
                sources.insert(relayer.src.as_str()),
                "more than one relayer for source {}",
                relayer.src
            );
            ensure!(
                !relayer.dest.is_empty(),
                "relayer {} has no destinations",
                relayer.src
            );
            for dest in &relayer.dest {
                ensure!(
                    dest != &relayer.src,
                    "relayer {} lists itself as a destination",
                    relayer.src
                );
                ensure!(
                    self.networks.contains_key(dest),
                    "relayer {} destination {dest} is not a configured network",
                    relayer.src
                );
            }
        }
        Ok(())
    }
}

impl NetworkLookup for RelayerConfig {
    fn network(&self, name: &str) -> Option<NetworkParams> {
        self.networks.get(name).map(|network| NetworkParams {
            url: network.url.clone(),
            ws_url: network.ws_url.clone(),
            chain_id: network.chain_id,
            endpoint: network.endpoint,
        })
    }

    fn endpoint(&self, origin_chain_id: u64) -> Option<Address> {
        self.endpoints.get(&origin_chain_id).copied().or_else(|| {
            DEFAULT_ENDPOINTS
                .iter()
                .find_map(|(chain_id, endpoint)| (*chain_id == origin_chain_id).then_some(*endpoint))
        })
    }
}

/// Parse a JSON configuration into the target struct while producing
/// detailed path-aware error messages.
///
/// # Errors
/// Returns an [`anyhow::Error`] with the precise path and the original serde
/// error message.
pub fn parse_config<T>(json: &str) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| anyhow::anyhow!("config error at {}: {}", e.path(), e.inner()))
}
