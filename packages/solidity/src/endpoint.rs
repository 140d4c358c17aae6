//! Solidity types for the LayerZero `Endpoint.sol`.

#[cfg(feature = "rpc")]
alloy_sol_types::sol!(
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    interface ILayerZeroEndpoint {
        function chainId() external view returns (uint16);
        function defaultSendLibrary() external view returns (address);
    }
);

// NOTE: Some environments won't compile with the `rpc` features.
#[cfg(not(feature = "rpc"))]
alloy_sol_types::sol!(
    #[derive(Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    interface ILayerZeroEndpoint {
        function chainId() external view returns (uint16);
        function defaultSendLibrary() external view returns (address);
    }
);
