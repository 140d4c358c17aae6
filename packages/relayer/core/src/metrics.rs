//! Metrics module for the relayer.

#![allow(missing_docs)]

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::{sync::LazyLock, time::Instant};

use lz_devkit_relayer_lib::{
    dispatcher::Dispatcher, listener::PacketEvent, watcher::PacketHandler,
};

/// Packet events observed, by `src_chain`
pub static PACKETS_OBSERVED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lz_relayer_packets_observed_total",
        "Packet events observed on a source chain",
        &["src_chain"]
    )
    .unwrap()
});

/// Packets delivered, by `src_chain` and `dst_chain`
pub static PACKETS_DELIVERED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lz_relayer_packets_delivered_total",
        "Packets delivered to a destination chain",
        &["src_chain", "dst_chain"]
    )
    .unwrap()
});

/// Packets dropped, by `src_chain` and failure `reason`
pub static PACKETS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lz_relayer_packets_dropped_total",
        "Packets that were not delivered",
        &["src_chain", "reason"]
    )
    .unwrap()
});

/// Time from packet event to delivery outcome in seconds
pub static DISPATCH_TIME: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "lz_relayer_dispatch_time_seconds",
        "Dispatch time in seconds",
        &["src_chain"]
    )
    .unwrap()
});

/// Packets currently being dispatched
pub static IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("lz_relayer_in_flight_packets", "Packets being dispatched").unwrap()
});

/// Running relayers
pub static ACTIVE_RELAYERS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("lz_relayer_active_relayers", "Running relayers").unwrap()
});

/// A [`Dispatcher`] that records metrics around every packet.
pub struct MeteredDispatcher {
    inner: Dispatcher,
}

impl MeteredDispatcher {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: Dispatcher) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl PacketHandler for MeteredDispatcher {
    async fn handle(&self, event: PacketEvent) {
        let src_chain = self.inner.network();
        let timer = Instant::now();
        IN_FLIGHT.inc();
        PACKETS_OBSERVED.with_label_values(&[src_chain]).inc();

        let result = self.inner.dispatch(&event).await;
        match &result {
            Ok(outcome) => PACKETS_DELIVERED
                .with_label_values(&[src_chain, outcome.destination.as_str()])
                .inc(),
            Err(err) => PACKETS_DROPPED
                .with_label_values(&[src_chain, err.reason()])
                .inc(),
        }
        self.inner.record(&result);

        DISPATCH_TIME
            .with_label_values(&[src_chain])
            .observe(timer.elapsed().as_secs_f64());
        IN_FLIGHT.dec();
    }
}
