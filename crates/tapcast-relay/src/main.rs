#![forbid(unsafe_code)]

//! Tapcast relay binary.
//!
//! The relay:
//! 1. Accepts persistent TCP connections carrying line-delimited JSON frames
//! 2. Maps device ids to live connections (last write wins)
//! 3. Routes connect requests, descriptions, and candidates between devices

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tapcast_relay::Relay;

#[derive(Parser, Debug)]
#[command(name = "tapcast-relay")]
#[command(about = "Tapcast signaling relay - routes session negotiation between devices")]
struct Args {
    /// TCP listen address
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tapcast_common::init_tracing_with_default(&args.log_level);

    let relay = Relay::bind(args.listen).await?;
    relay.run().await?;
    Ok(())
}
