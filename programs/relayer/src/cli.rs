//! Defines the command line interface of the relayer.

use alloy_primitives::Address;
use clap::{Args, Parser, Subcommand};
use lz_devkit_relayer_core::config::RelayerEntry;
use lz_devkit_relayer_lib::codec::{Packet, RelayerParams};

/// The command line interface of the relayer.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct RelayerCli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The subcommands of the relayer.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Start every enabled relayer of the configuration file.
    Start(StartArgs),
    /// Start one relayer from a source network to the given destinations.
    Relay(RelayArgs),
    /// Decode a packet and print it as JSON.
    DecodePacket(DecodePacketArgs),
}

/// Arguments of the `start` subcommand.
#[derive(Clone, Debug, Args)]
pub struct StartArgs {
    /// Path to the JSON configuration file.
    #[arg(short = 'c', long)]
    pub config: String,
}

/// Arguments of the `relay` subcommand.
#[derive(Clone, Debug, Args)]
pub struct RelayArgs {
    /// Path to the JSON configuration file holding the networks.
    #[arg(short = 'c', long)]
    pub config: String,
    /// The source network.
    pub src: String,
    /// A destination network. Repeat for more than one.
    #[arg(long = "dest", required = true)]
    pub dest: Vec<String>,
    /// Send library to listen on instead of the endpoint's default.
    #[arg(long)]
    pub node: Option<Address>,
}

/// Arguments of the `decode-packet` subcommand.
#[derive(Clone, Debug, Args)]
pub struct DecodePacketArgs {
    /// The hex encoded packet.
    pub packet: String,
    /// The hex encoded adapter parameters emitted with the packet.
    #[arg(long)]
    pub relayer_params: Option<String>,
}

impl RelayArgs {
    /// The relayer these arguments describe.
    #[must_use]
    pub fn entry(&self) -> RelayerEntry {
        RelayerEntry {
            src: self.src.clone(),
            dest: self.dest.clone(),
            node: self.node,
            enabled: true,
        }
    }
}

impl DecodePacketArgs {
    /// Decodes the packet and the optional relayer params.
    ///
    /// # Errors
    /// Returns an error if either argument is not valid hex.
    pub fn decode(&self) -> anyhow::Result<serde_json::Value> {
        let packet = Packet::from_hex(&self.packet)?;
        let mut decoded = serde_json::json!({
            "packet": packet,
            "path": packet.path(),
        });

        if let Some(params) = &self.relayer_params {
            decoded["relayer_params"] = serde_json::to_value(RelayerParams::from_hex(params)?)?;
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        RelayerCli::command().debug_assert();
    }

    #[test]
    fn parses_relay_arguments() {
        let cli = RelayerCli::parse_from([
            "lz-devkit-relayer",
            "relay",
            "--config",
            "relayer.json",
            "ethereum",
            "--dest",
            "arbitrum",
            "--dest",
            "bsc",
            "--node",
            "0x4D73AdB72bC3DD368966edD0f0b2148401A178E2",
        ]);

        let Commands::Relay(args) = cli.command else {
            panic!("expected relay");
        };
        let entry = args.entry();
        assert_eq!(entry.src, "ethereum");
        assert_eq!(entry.dest, vec!["arbitrum", "bsc"]);
        assert!(entry.node.is_some());
        assert!(entry.enabled);
    }

    #[test]
    fn relay_requires_a_destination() {
        assert!(RelayerCli::try_parse_from([
            "lz-devkit-relayer",
            "relay",
            "--config",
            "relayer.json",
            "ethereum",
        ])
        .is_err());
    }

    #[test]
    fn decodes_packet_and_params() {
        let mut packet = 9u64.to_be_bytes().to_vec();
        packet.extend_from_slice(&101u16.to_be_bytes());
        packet.extend_from_slice(&[0x11; 20]);
        packet.extend_from_slice(&110u16.to_be_bytes());
        packet.extend_from_slice(&[0x22; 20]);
        packet.extend_from_slice(b"hi");

        let mut params = 1u16.to_be_bytes().to_vec();
        params.extend_from_slice(&[0; 29]);
        params.extend_from_slice(&[0x03, 0x0d, 0x40]);

        let args = DecodePacketArgs {
            packet: format!("0x{}", alloy_primitives::hex::encode(&packet)),
            relayer_params: Some(alloy_primitives::hex::encode(&params)),
        };
        let decoded = args.decode().unwrap();

        assert_eq!(decoded["packet"]["nonce"], 9);
        assert_eq!(decoded["packet"]["src_chain_id"], 101);
        assert_eq!(decoded["packet"]["dst_chain_id"], 110);
        assert_eq!(decoded["packet"]["payload"], "0x6869");
        assert_eq!(decoded["relayer_params"]["kind"], 1);
        assert_eq!(decoded["relayer_params"]["gas_limit"], "0x30d40");
        assert!(decoded["relayer_params"]["airdrop"].is_null());
    }

    #[test]
    fn rejects_invalid_hex() {
        let args = DecodePacketArgs {
            packet: "0xzz".to_string(),
            relayer_params: None,
        };
        assert!(args.decode().is_err());
    }
}
