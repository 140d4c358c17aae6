//! Solidity types for `LzApp.sol`, the receiving side of an application.

#[cfg(feature = "rpc")]
alloy_sol_types::sol!(
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    interface ILayerZeroReceiver {
        function lzReceive(uint16 srcChainId, bytes calldata srcAddress, uint64 nonce, bytes calldata payload) external;
    }
);

// NOTE: Some environments won't compile with the `rpc` features.
#[cfg(not(feature = "rpc"))]
alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    interface ILayerZeroReceiver {
        function lzReceive(uint16 srcChainId, bytes calldata srcAddress, uint64 nonce, bytes calldata payload) external;
    }
);
