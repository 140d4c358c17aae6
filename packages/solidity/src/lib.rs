//! Solidity types for the LayerZero v1 contracts the relayer talks to.

#![deny(clippy::nursery, clippy::pedantic, unused_crate_dependencies)]

pub mod endpoint;
pub mod lz_app;
pub mod uln;
