//! Signaling transport: line-delimited JSON frames over TCP.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{info, warn};

use tapcast_common::protocol::{from_line, to_line, ClientFrame, RelayFrame};
use tapcast_common::Result;

/// Write half of a relay connection.
pub struct SignalingSender {
    writer: OwnedWriteHalf,
}

impl SignalingSender {
    pub async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let line = to_line(frame)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }
}

/// Read half of a relay connection.
pub struct SignalingReceiver {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl SignalingReceiver {
    /// Next frame from the relay; `None` once the relay closes the
    /// connection. Malformed lines are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<RelayFrame>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match from_line(&line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => warn!("skipping malformed frame from relay: {}", err),
            }
        }
    }
}

/// Connect to the relay and register the device id, returning the split
/// transport halves.
pub async fn connect(addr: &str, device_id: &str) -> Result<(SignalingSender, SignalingReceiver)> {
    let stream = TcpStream::connect(addr).await?;
    let (read, write) = stream.into_split();

    let mut sender = SignalingSender { writer: write };
    sender
        .send(&ClientFrame::RegisterDevice {
            device_id: device_id.to_string(),
        })
        .await?;
    info!("registered as {} with relay {}", device_id, addr);

    let receiver = SignalingReceiver {
        lines: BufReader::new(read).lines(),
    };
    Ok((sender, receiver))
}
