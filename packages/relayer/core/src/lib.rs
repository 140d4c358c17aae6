//! Configuration, metrics and start-up of the LayerZero devkit relayers.

#![deny(clippy::nursery, clippy::pedantic, missing_docs)]

pub mod builder;
pub mod config;
pub mod metrics;
