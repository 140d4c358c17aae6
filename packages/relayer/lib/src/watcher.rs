//! Keeps a packet subscription alive across local rollbacks.
//!
//! Test networks are reverted to snapshots all the time. A node that rolls back forgets the log
//! filters installed after the snapshot, so a subscription that was live before the revert goes
//! quiet without ever erroring. The watcher notices a rollback when a block notification goes
//! backwards and then re-installs the packet subscription exactly once.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::Instrument;

use crate::{
    error::{error_chain, RelayerError},
    listener::{PacketEvent, PacketSource, PacketSubscription},
    log_sink::RelayLog,
};

/// Receives every packet event the watcher observes. Each call runs on its own task.
#[async_trait::async_trait]
pub trait PacketHandler: Send + Sync + 'static {
    /// Handles one event. Failures must be handled inside.
    async fn handle(&self, event: PacketEvent);
}

/// A backwards move of the chain head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rollback {
    /// The last block seen before the rollback.
    pub from: u64,
    /// The block the chain was rolled back to.
    pub to: u64,
}

/// Tracks the last block number and flags rollbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReorgGuard {
    last_block: u64,
}

impl ReorgGuard {
    /// Create a new [`ReorgGuard`] starting at `last_block`.
    #[must_use]
    pub const fn new(last_block: u64) -> Self {
        Self { last_block }
    }

    /// The last block observed.
    #[must_use]
    pub const fn last_block(&self) -> u64 {
        self.last_block
    }

    /// Records `block` and returns a [`Rollback`] if it is lower than the previous block.
    pub fn observe(&mut self, block: u64) -> Option<Rollback> {
        let previous = std::mem::replace(&mut self.last_block, block);
        (block < previous).then_some(Rollback {
            from: previous,
            to: block,
        })
    }
}

/// The lifecycle of a [`Watcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherState {
    /// Installing the initial subscriptions.
    Subscribing,
    /// Forwarding packet events.
    Listening,
    /// Re-installing the packet subscription after a rollback.
    Resubscribing,
    /// A stream closed or a subscription failed.
    Stopped,
}

/// Watches one source network and hands packet events to a [`PacketHandler`].
pub struct Watcher<S: ?Sized, H: ?Sized> {
    network: String,
    source: Arc<S>,
    handler: Arc<H>,
    log: Arc<dyn RelayLog>,
    state: watch::Sender<WatcherState>,
}

impl<S, H> Watcher<S, H>
where
    S: PacketSource + ?Sized,
    H: PacketHandler + ?Sized,
{
    /// Create a new [`Watcher`] for the source `network`.
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        source: Arc<S>,
        handler: Arc<H>,
        log: Arc<dyn RelayLog>,
    ) -> Self {
        let (state, _) = watch::channel(WatcherState::Subscribing);
        Self {
            network: network.into(),
            source,
            handler,
            log,
            state,
        }
    }

    /// Returns a receiver that follows the state of the watcher.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Runs until a subscription fails or closes.
    ///
    /// # Errors
    /// Returns [`RelayerError::Transport`] if subscribing fails and
    /// [`RelayerError::StreamClosed`] if the node ends a subscription.
    pub async fn run(self) -> Result<(), RelayerError> {
        let result = self.watch().await;
        self.state.send_replace(WatcherState::Stopped);

        if let Err(err) = &result {
            let message = error_chain(err);
            tracing::error!(network = %self.network, "watcher stopped: {message}");
            self.log.append(&self.network, &message);
        }
        result
    }

    async fn watch(&self) -> Result<(), RelayerError> {
        self.state.send_replace(WatcherState::Subscribing);

        let mut blocks = self
            .source
            .subscribe_blocks()
            .await
            .map_err(|source| self.transport(source))?;
        let mut guard = ReorgGuard::new(
            self.source
                .block_number()
                .await
                .map_err(|source| self.transport(source))?,
        );
        let mut packets = self.subscribe_packets().await?;

        self.state.send_replace(WatcherState::Listening);
        self.log.append(&self.network, "listening...");
        tracing::info!(network = %self.network, block = guard.last_block(), "listening for packets");

        loop {
            tokio::select! {
                block = blocks.next() => {
                    let block = block.ok_or_else(|| self.closed("block"))?;
                    let Some(rollback) = guard.observe(block) else {
                        continue;
                    };

                    self.state.send_replace(WatcherState::Resubscribing);
                    self.log.append(
                        &self.network,
                        &format!("evm_revert detected: {} -> {}", rollback.from, rollback.to),
                    );
                    tracing::warn!(network = %self.network, from = rollback.from, to = rollback.to, "rollback detected");

                    // the old filter must be gone before the new one is installed
                    let stale = packets.id;
                    drop(packets);
                    if let Err(e) = self.source.unsubscribe_packets(stale).await {
                        tracing::warn!(network = %self.network, error = %e, "failed to close packet subscription");
                    }
                    packets = self.subscribe_packets().await?;
                    self.state.send_replace(WatcherState::Listening);
                }
                event = packets.events.next() => {
                    let event = event.ok_or_else(|| self.closed("packet"))?;
                    self.spawn_handler(event);
                }
            }
        }
    }

    async fn subscribe_packets(&self) -> Result<PacketSubscription, RelayerError> {
        self.source
            .subscribe_packets()
            .await
            .map_err(|source| self.transport(source))
    }

    fn spawn_handler(&self, event: PacketEvent) {
        let handler = Arc::clone(&self.handler);
        let span = tracing::info_span!(
            "packet",
            network = %self.network,
            tx_hash = ?event.tx_hash,
        );
        tokio::spawn(async move { handler.handle(event).await }.instrument(span));
    }

    fn transport(&self, source: anyhow::Error) -> RelayerError {
        RelayerError::Transport {
            network: self.network.clone(),
            source,
        }
    }

    fn closed(&self, stream: &'static str) -> RelayerError {
        RelayerError::StreamClosed {
            network: self.network.clone(),
            stream,
        }
    }
}
