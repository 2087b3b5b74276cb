#![forbid(unsafe_code)]

//! Tapcast client binary.
//!
//! Runs one device-side session engine against a relay, driven by stdin
//! commands. Either side of a session can run from this binary: stay idle
//! and `accept` to host, or `connect <id>` to view and send taps. The demo
//! wiring uses the in-process mock media stack and a logging injector; real
//! capture and gesture injection are platform capabilities.

use anyhow::{anyhow, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tapcast_client::control::touch_from_pointer;
use tapcast_client::input::LoggingInjector;
use tapcast_client::media::{MockMediaBackend, PeerEvent};
use tapcast_client::{signaling, Negotiator, Notification, Session, SessionConfig};
use tapcast_common::helpers::generate_device_id;
use tapcast_common::protocol::ClientFrame;

#[derive(Parser, Debug)]
#[command(name = "tapcast-client")]
#[command(about = "Tapcast device client - share or control a screen through a relay")]
struct Args {
    /// Relay address
    #[arg(long, default_value = "127.0.0.1:3000")]
    relay: String,

    /// Device id shown to peers (generated when omitted)
    #[arg(long)]
    device_id: Option<String>,

    /// Screen resolution taps are injected into, WxH
    #[arg(long, default_value = "1080x1920")]
    screen: String,

    /// Render surface taps are normalized against, WxH
    #[arg(long, default_value = "360x640")]
    surface: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_dims(raw: &str) -> Result<(f64, f64)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WxH, got {raw}"))?;
    let w: f64 = w.parse()?;
    let h: f64 = h.parse()?;
    if w <= 0.0 || h <= 0.0 {
        return Err(anyhow!("dimensions must be positive, got {raw}"));
    }
    Ok((w, h))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tapcast_common::init_tracing_with_default(&args.log_level);

    let (screen_w, screen_h) = parse_dims(&args.screen)?;
    let config = SessionConfig {
        relay_addr: args.relay,
        device_id: args.device_id.unwrap_or_else(generate_device_id),
        screen: (screen_w as u32, screen_h as u32),
        surface: parse_dims(&args.surface)?,
    };

    let (mut sender, mut receiver) =
        signaling::connect(&config.relay_addr, &config.device_id).await?;
    println!("your device id: {}", config.device_id);
    println!("commands: connect <id> | accept | reject | touch <px> <py> | status | quit");

    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ClientFrame>(64);
    let (notify_tx, mut notify_rx) = mpsc::channel::<Notification>(16);
    let (peer_tx, mut peer_rx) = mpsc::channel::<PeerEvent>(64);

    // Single-writer task owns the send half of the relay connection.
    tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if let Err(err) = sender.send(&frame).await {
                warn!("signaling send failed: {}", err);
                break;
            }
        }
    });

    let backend = MockMediaBackend::new(peer_tx);
    let injector = LoggingInjector::new(config.screen.0, config.screen.1);
    let mut session = Session::new(
        config.device_id.clone(),
        Negotiator::new(Box::new(backend)),
        Box::new(injector),
        outbox_tx,
        notify_tx,
    );

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                match frame? {
                    Some(frame) => session.handle_frame(frame).await?,
                    None => {
                        warn!("relay closed the connection");
                        break;
                    }
                }
            }

            Some(event) = peer_rx.recv() => {
                session.handle_peer_event(event).await?;
            }

            Some(note) = notify_rx.recv() => {
                print_notification(&note);
            }

            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&mut session, line.trim(), config.surface).await? {
                    break;
                }
            }
        }
    }

    session.disconnect().await?;
    Ok(())
}

fn print_notification(note: &Notification) {
    match note {
        Notification::IncomingRequest { from } => {
            println!("incoming request from {from} - type 'accept' or 'reject'");
        }
        Notification::Rejected { by } => println!("request rejected by {by}"),
        Notification::Connected { peer } => println!("connected to {peer}"),
        Notification::Disconnected => println!("session closed"),
        Notification::RelayError { message } => println!("relay error: {message}"),
        Notification::SessionFailed { reason } => println!("session failed: {reason}"),
    }
}

/// Apply one operator command. Returns false to quit.
async fn run_command(session: &mut Session, line: &str, surface: (f64, f64)) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("connect") => match parts.next() {
            Some(target) => {
                if let Err(err) = session.connect(target).await {
                    warn!("connect failed: {}", err);
                }
            }
            None => println!("usage: connect <device-id>"),
        },
        Some("accept") => {
            if let Err(err) = session.accept().await {
                warn!("accept failed: {}", err);
            }
        }
        Some("reject") => {
            if let Err(err) = session.reject().await {
                warn!("reject failed: {}", err);
            }
        }
        Some("touch") => {
            let coords = (
                parts.next().and_then(|v| v.parse::<f64>().ok()),
                parts.next().and_then(|v| v.parse::<f64>().ok()),
            );
            match coords {
                (Some(px), Some(py)) => match touch_from_pointer(px, py, surface.0, surface.1) {
                    Ok(command) => session.send_touch(command).await?,
                    Err(err) => warn!("bad touch: {}", err),
                },
                _ => println!("usage: touch <px> <py>"),
            }
        }
        Some("status") => {
            info!("session state: {:?}", session.state());
            println!("{:?}", session.state());
        }
        Some("quit") | Some("exit") => return Ok(false),
        Some(other) => println!("unknown command: {other}"),
    }
    Ok(true)
}
