#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod authority;
pub mod chain;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod evm;
pub mod listener;
pub mod log_sink;
pub mod router;
pub mod watcher;

#[cfg(test)]
mod test_utils;
