//! Defines the [`RelayerBuilder`] struct that is used to start the relayers.

use std::{path::Path, sync::Arc};

use alloy_primitives::U256;
use anyhow::Context;
use futures::future::try_join_all;
use lz_devkit_relayer_lib::{
    chain::ChainRegistry,
    dispatcher::Dispatcher,
    evm::{connect_destination, resolve_send_library, EvmClient},
    listener::uln::UlnListener,
    log_sink::{FileRelayLog, RelayLog},
    watcher::Watcher,
};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, Instrument};

use crate::{
    config::{RelayerConfig, RelayerEntry},
    metrics::{MeteredDispatcher, ACTIVE_RELAYERS},
};

/// The `RelayerBuilder` struct is used to start one relayer per enabled source network.
#[allow(clippy::module_name_repetitions)]
pub struct RelayerBuilder {
    config: Arc<RelayerConfig>,
    registry: Arc<ChainRegistry>,
}

impl RelayerBuilder {
    /// Create a new `RelayerBuilder` instance.
    #[must_use]
    pub fn new(config: RelayerConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ChainRegistry::new(config.clone()));
        Self { config, registry }
    }

    /// The configuration the relayers are started from.
    #[must_use]
    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }

    /// Start every enabled relayer and wait until they stop or `ctrl-c` is received.
    ///
    /// A relayer that fails does not stop the others.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, nothing is enabled, or any relayer
    /// stopped with an error.
    #[instrument(skip(self), name = "relayer_start", err(Debug))]
    pub async fn start(&self) -> anyhow::Result<()> {
        self.config.validate()?;
        let funding = self.config.authority_funding_wei()?;

        let mut relayers = JoinSet::new();
        for entry in self.config.enabled_relayers().cloned() {
            let registry = self.registry.clone();
            let log_dir = self.config.log_dir.clone();
            let span = tracing::info_span!("relayer", src_chain = %entry.src);
            relayers.spawn(
                async move {
                    let src = entry.src.clone();
                    (src, run_relayer(&registry, &entry, &log_dir, funding).await)
                }
                .instrument(span),
            );
        }
        anyhow::ensure!(!relayers.is_empty(), "no enabled relayers");
        info!(relayers = relayers.len(), "relayers started");

        let mut failed = 0usize;
        loop {
            tokio::select! {
                joined = relayers.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((src, Ok(()))) => info!(src_chain = %src, "relayer stopped"),
                        Ok((src, Err(e))) => {
                            failed += 1;
                            error!(src_chain = %src, error = %format!("{e:#}"), "relayer failed");
                        }
                        Err(e) => {
                            failed += 1;
                            error!(error = %e, "relayer task panicked");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received ctrl-c, shutting down relayers");
                    relayers.shutdown().await;
                    return Ok(());
                }
            }
        }

        anyhow::ensure!(failed == 0, "{failed} relayer(s) stopped with errors");
        Ok(())
    }
}

/// Runs one relayer until its watcher stops. Start-up errors are also written to the relay log,
/// the watcher records its own.
///
/// # Errors
/// Returns an error if the relay log cannot be created, start-up fails or the watcher stops.
pub async fn run_relayer(
    registry: &ChainRegistry,
    entry: &RelayerEntry,
    log_dir: &Path,
    funding: Option<U256>,
) -> anyhow::Result<()> {
    let log: Arc<dyn RelayLog> = Arc::new(FileRelayLog::create(log_dir, &entry.src)?);

    let watcher = match prepare(registry, entry, funding, log.clone()).await {
        Ok(watcher) => watcher,
        Err(e) => {
            log.append(&entry.src, &format!("error: {e:#}"));
            return Err(e);
        }
    };

    ACTIVE_RELAYERS.inc();
    let result = watcher.run().await;
    ACTIVE_RELAYERS.dec();
    Ok(result?)
}

type RelayWatcher = Watcher<UlnListener, MeteredDispatcher>;

async fn prepare(
    registry: &ChainRegistry,
    entry: &RelayerEntry,
    funding: Option<U256>,
    log: Arc<dyn RelayLog>,
) -> anyhow::Result<RelayWatcher> {
    let source = registry.resolve_network(&entry.src)?;
    let control = EvmClient::connect(&source.url)
        .await
        .with_context(|| format!("cannot connect to {}", entry.src))?;
    let node = resolve_send_library(registry, &source, &control, entry.node).await?;
    info!(src_chain = %entry.src, %node, "listening on send library");

    let destinations = try_join_all(
        entry
            .dest
            .iter()
            .map(|name| connect_destination(registry, name, funding)),
    )
    .await?;
    for destination in &destinations {
        info!(
            src_chain = %entry.src,
            dst_chain = %destination.name,
            protocol_chain_id = destination.protocol_chain_id,
            "destination connected"
        );
    }

    let listener = Arc::new(
        UlnListener::connect(&source.ws_url, node)
            .await
            .with_context(|| format!("cannot subscribe to {}", entry.src))?,
    );
    let dispatcher = Dispatcher::new(
        entry.src.clone(),
        destinations,
        listener.clone(),
        log.clone(),
    );

    Ok(Watcher::new(
        entry.src.clone(),
        listener,
        Arc::new(MeteredDispatcher::new(dispatcher)),
        log,
    ))
}
