//! In-memory stand-ins for networks, chains and subscriptions.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use anyhow::{anyhow, bail, ensure, Result};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::{
    authority::{ForkedNetwork, TestNetworkControl},
    chain::{Authority, DestinationConnection, EndpointReader, NetworkLookup, NetworkParams},
    dispatcher::{DestinationChain, Delivery},
    listener::{BlockStream, PacketEvent, PacketSource, PacketSubscription, RelayerParamsLookup},
    watcher::PacketHandler,
};

/// A fixed network table.
#[derive(Clone, Debug, Default)]
pub struct StaticNetworks {
    networks: HashMap<String, NetworkParams>,
    endpoints: HashMap<u64, Address>,
}

impl StaticNetworks {
    pub fn with_network(mut self, name: &str, params: NetworkParams) -> Self {
        self.networks.insert(name.to_string(), params);
        self
    }

    pub fn with_endpoint(mut self, origin_chain_id: u64, endpoint: Address) -> Self {
        self.endpoints.insert(origin_chain_id, endpoint);
        self
    }
}

impl NetworkLookup for StaticNetworks {
    fn network(&self, name: &str) -> Option<NetworkParams> {
        self.networks.get(name).cloned()
    }

    fn endpoint(&self, origin_chain_id: u64) -> Option<Address> {
        self.endpoints.get(&origin_chain_id).copied()
    }
}

/// A call a [`FakeChain`] received on its write side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeCall {
    SendNative {
        from: Address,
        to: Address,
        amount: U256,
    },
    Deliver {
        from: Address,
        delivery: Delivery,
    },
}

#[derive(Debug, Default)]
struct FakeChainState {
    impersonated: Vec<Address>,
    balances: HashMap<Address, U256>,
    calls: Vec<FakeCall>,
    endpoint_queries: usize,
    failing_apps: HashSet<Address>,
    failing_transfers: bool,
    sent: u64,
}

/// A local test network.
#[derive(Debug, Default)]
pub struct FakeChain {
    chain_id: u64,
    forked_from: Option<u64>,
    endpoint_chain_id: u16,
    send_library: Address,
    refuse_impersonation: bool,
    state: Mutex<FakeChainState>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn with_endpoint_chain_id(mut self, raw: u16) -> Self {
        self.endpoint_chain_id = raw;
        self
    }

    pub fn with_send_library(mut self, send_library: Address) -> Self {
        self.send_library = send_library;
        self
    }

    pub fn forked_from(mut self, chain_id: u64) -> Self {
        self.forked_from = Some(chain_id);
        self
    }

    pub fn refusing_impersonation(mut self) -> Self {
        self.refuse_impersonation = true;
        self
    }

    /// Every later transfer fails.
    pub fn fail_transfers(&self) {
        self.state.lock().unwrap().failing_transfers = true;
    }

    /// Every later delivery to `app` reverts.
    pub fn fail_deliveries_to(&self, app: Address) {
        self.state.lock().unwrap().failing_apps.insert(app);
    }

    pub fn endpoint_queries(&self) -> usize {
        self.state.lock().unwrap().endpoint_queries
    }

    pub fn impersonated(&self) -> Vec<Address> {
        self.state.lock().unwrap().impersonated.clone()
    }

    pub fn balance_of(&self, account: Address) -> Option<U256> {
        self.state.lock().unwrap().balances.get(&account).copied()
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn next_tx_hash(state: &mut FakeChainState) -> TxHash {
        state.sent += 1;
        B256::from(U256::from(state.sent))
    }
}

#[async_trait::async_trait]
impl TestNetworkControl for FakeChain {
    async fn impersonate_account(&self, account: Address) -> Result<()> {
        if self.refuse_impersonation {
            bail!("method hardhat_impersonateAccount not found");
        }
        self.state.lock().unwrap().impersonated.push(account);
        Ok(())
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<()> {
        self.state.lock().unwrap().balances.insert(account, amount);
        Ok(())
    }

    async fn fork_metadata(&self) -> Result<Option<ForkedNetwork>> {
        Ok(self.forked_from.map(|chain_id| ForkedNetwork {
            chain_id,
            fork_block_number: 1,
            fork_block_hash: B256::ZERO.to_string(),
        }))
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }
}

#[async_trait::async_trait]
impl EndpointReader for FakeChain {
    async fn endpoint_chain_id(&self, _endpoint: Address) -> Result<u16> {
        self.state.lock().unwrap().endpoint_queries += 1;
        Ok(self.endpoint_chain_id)
    }

    async fn default_send_library(&self, _endpoint: Address) -> Result<Address> {
        Ok(self.send_library)
    }
}

#[async_trait::async_trait]
impl DestinationChain for FakeChain {
    async fn send_native(&self, from: Address, to: Address, amount: U256) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.failing_transfers {
            bail!("insufficient funds for transfer");
        }
        state.calls.push(FakeCall::SendNative { from, to, amount });
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn deliver(&self, from: Address, delivery: &Delivery) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.failing_apps.contains(&delivery.app) {
            return Err(anyhow!("execution reverted"));
        }
        state.calls.push(FakeCall::Deliver {
            from,
            delivery: delivery.clone(),
        });
        Ok(Self::next_tx_hash(&mut state))
    }
}

/// A destination backed by a fresh [`FakeChain`].
pub fn destination(name: &str, protocol_chain_id: u16) -> DestinationConnection {
    destination_on(name, protocol_chain_id, Arc::new(FakeChain::new(1)))
}

/// A destination backed by `chain`, acting as a made-up endpoint.
pub fn destination_on(
    name: &str,
    protocol_chain_id: u16,
    chain: Arc<FakeChain>,
) -> DestinationConnection {
    let endpoint = Address::with_last_byte(0xee);
    DestinationConnection {
        name: name.to_string(),
        local_chain_id: chain.chain_id,
        origin_chain_id: chain.forked_from.unwrap_or(chain.chain_id),
        protocol_chain_id,
        endpoint,
        authority: Authority { account: endpoint },
        client: chain,
    }
}

/// A source network fed by the test.
#[derive(Debug)]
pub struct FakeSource {
    start_block: u64,
    blocks: Mutex<Option<mpsc::UnboundedReceiver<u64>>>,
    subscriptions: Mutex<Vec<mpsc::UnboundedSender<PacketEvent>>>,
    unsubscribed: Mutex<Vec<usize>>,
    params: Mutex<HashMap<TxHash, Bytes>>,
    refuse: AtomicBool,
}

impl FakeSource {
    /// Returns the source and the sender of its block notifications.
    pub fn new(start_block: u64) -> (Arc<Self>, mpsc::UnboundedSender<u64>) {
        let (blocks_tx, blocks_rx) = mpsc::unbounded_channel();
        let source = Self {
            start_block,
            blocks: Mutex::new(Some(blocks_rx)),
            subscriptions: Mutex::default(),
            unsubscribed: Mutex::default(),
            params: Mutex::default(),
            refuse: AtomicBool::new(false),
        };
        (Arc::new(source), blocks_tx)
    }

    pub fn with_relayer_params(&self, tx_hash: TxHash, params: Bytes) {
        self.params.lock().unwrap().insert(tx_hash, params);
    }

    pub fn refuse_subscriptions(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Emits `event` on the newest packet subscription. Returns `false` if nobody listens there.
    pub fn emit(&self, event: PacketEvent) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .last()
            .is_some_and(|subscription| subscription.send(event).is_ok())
    }

    pub fn packet_subscriptions(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Indices of the packet subscriptions closed on the node, in closing order.
    pub fn unsubscribed(&self) -> Vec<usize> {
        self.unsubscribed.lock().unwrap().clone()
    }

    /// Whether the `index`th packet subscription was dropped by its consumer.
    pub fn is_detached(&self, index: usize) -> bool {
        self.subscriptions.lock().unwrap()[index].is_closed()
    }
}

fn receiver_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
) -> futures::stream::BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

#[async_trait::async_trait]
impl PacketSource for FakeSource {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.start_block)
    }

    async fn subscribe_blocks(&self) -> Result<BlockStream> {
        if self.refuse.load(Ordering::SeqCst) {
            bail!("subscriptions not supported");
        }
        let rx = self
            .blocks
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow!("blocks already subscribed"))?;
        Ok(receiver_stream(rx))
    }

    async fn subscribe_packets(&self) -> Result<PacketSubscription> {
        if self.refuse.load(Ordering::SeqCst) {
            bail!("subscriptions not supported");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = self.subscriptions.lock().unwrap();
        subscriptions.push(tx);
        Ok(PacketSubscription {
            id: B256::from(U256::from(subscriptions.len() - 1)),
            events: receiver_stream(rx),
        })
    }

    async fn unsubscribe_packets(&self, id: B256) -> Result<()> {
        let index = usize::try_from(U256::from_be_bytes(id.0))?;
        // the consumer must have dropped the stream already
        ensure!(self.is_detached(index), "subscription {index} still attached");
        self.unsubscribed.lock().unwrap().push(index);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RelayerParamsLookup for FakeSource {
    async fn relayer_params(&self, event: &PacketEvent) -> Result<Option<Bytes>> {
        Ok(event
            .tx_hash
            .and_then(|tx_hash| self.params.lock().unwrap().get(&tx_hash).cloned()))
    }
}

/// Forwards handled events to a channel.
#[derive(Debug)]
pub struct RecordingHandler {
    events: mpsc::UnboundedSender<PacketEvent>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PacketEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { events }), rx)
    }
}

#[async_trait::async_trait]
impl PacketHandler for RecordingHandler {
    async fn handle(&self, event: PacketEvent) {
        let _ = self.events.send(event);
    }
}

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
