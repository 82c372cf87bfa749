//! iapguard diagnostic tool
//!
//! Usage:
//!   iapguard inspect payload.der --json
//!   iapguard digest --device-id 00:1c:42:9a:7e:01 --opaque 0102 --bundle-id com.example.app
//!   iapguard device-id
//!   iapguard check payload.der --bundle-id com.example.app --bundle-version 1.0
//!
//! Payload files are unwrapped receipt payloads (the signed envelope
//! already removed).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iapguard_cli::{check_file, device_id_hex, digest_hex, inspect_file, parse_hex};
use iapguard_receipt::{DeviceIdentityProvider, ExpectedIdentity, InterfaceDeviceId};
use std::path::PathBuf;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "iapguard")]
#[command(about = "Inspect receipts and compute device-binding digests")]
struct Args {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a receipt payload and print its fields
    Inspect {
        payload: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compute the digest a receipt must carry for a device
    Digest {
        /// Device identifier, hex (colons allowed)
        #[arg(long)]
        device_id: String,

        /// Opaque value from the receipt, hex
        #[arg(long)]
        opaque: String,

        #[arg(long)]
        bundle_id: String,
    },

    /// Print this machine's device identifier
    DeviceId {
        /// Network interface to read instead of the primary one
        #[arg(long)]
        interface: Option<String>,
    },

    /// Validate a receipt payload for a bundle and device
    Check {
        payload: PathBuf,

        #[arg(long)]
        bundle_id: String,

        #[arg(long)]
        bundle_version: String,

        /// Device identifier, hex; defaults to this machine's
        #[arg(long)]
        device_id: Option<String>,
    },
}

fn device_provider(interface: Option<String>) -> InterfaceDeviceId {
    match interface {
        Some(name) => InterfaceDeviceId::with_interface(name),
        None => InterfaceDeviceId::new(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Inspect { payload, json } => {
            let report = inspect_file(&payload)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
        }
        Command::Digest {
            device_id,
            opaque,
            bundle_id,
        } => {
            let device_id = parse_hex(&device_id).context("--device-id")?;
            let opaque = parse_hex(&opaque).context("--opaque")?;
            println!("{}", digest_hex(&device_id, &opaque, &bundle_id));
        }
        Command::DeviceId { interface } => {
            println!("{}", device_id_hex(&device_provider(interface))?);
        }
        Command::Check {
            payload,
            bundle_id,
            bundle_version,
            device_id,
        } => {
            let device_id = match device_id {
                Some(hex) => parse_hex(&hex).context("--device-id")?,
                None => device_provider(None).current_device_id()?,
            };
            debug!("Checking {} against {bundle_id} {bundle_version}", payload.display());
            let expected = ExpectedIdentity::owned(bundle_id, bundle_version);
            let report = check_file(&payload, expected, &device_id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
