//! Local line transport between the fleet loop and the membership controller.
//!
//! One UTF-8 line per tick: comma-separated channel names, newline
//! terminated. An empty line is an empty desired set.

use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Upper bound on a pushed line.
const MAX_LINE_LEN: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("no desired set received for {0:?}")]
    Stalled(Duration),

    #[error("membership controller is gone")]
    ReceiverGone,
}

impl TransportError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Codec(_) => "codec",
            Self::Stalled(_) => "stalled",
            Self::ReceiverGone => "receiver_gone",
        }
    }
}

pub fn encode_channels(channels: &BTreeSet<String>) -> String {
    channels.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Parse a pushed line: names are trimmed and lowercased, empty entries dropped.
pub fn decode_channels(line: &str) -> BTreeSet<String> {
    line.split(',')
        .map(|name| name.trim().trim_start_matches('#').to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Sending side, held by the fleet loop.
pub struct PushClient {
    framed: Framed<TcpStream, LinesCodec>,
}

impl PushClient {
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        info!(address = %address, "Connected to membership receiver");
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN)),
        })
    }

    pub async fn push(&mut self, channels: &BTreeSet<String>) -> Result<(), TransportError> {
        self.framed.send(encode_channels(channels)).await?;
        debug!(channels = channels.len(), "Pushed desired channel set");
        Ok(())
    }
}

/// Receiving side: forward every pushed set to the membership controller.
///
/// Returns an error when nothing arrives within `read_timeout`, whether
/// waiting for a pusher to connect or for its next line. A pusher that
/// disconnects cleanly may reconnect within the same bound.
pub async fn serve(
    listener: TcpListener,
    read_timeout: Duration,
    desired_tx: mpsc::Sender<BTreeSet<String>>,
) -> Result<(), TransportError> {
    info!(address = ?listener.local_addr().ok(), ?read_timeout, "Membership receiver listening");

    loop {
        let (stream, peer) = tokio::time::timeout(read_timeout, listener.accept())
            .await
            .map_err(|_| TransportError::Stalled(read_timeout))??;
        info!(%peer, "Fleet pusher connected");
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

        loop {
            let next = tokio::time::timeout(read_timeout, framed.next())
                .await
                .map_err(|_| TransportError::Stalled(read_timeout))?;
            match next {
                Some(line) => {
                    let desired = decode_channels(&line?);
                    debug!(channels = desired.len(), "Received desired channel set");
                    desired_tx
                        .send(desired)
                        .await
                        .map_err(|_| TransportError::ReceiverGone)?;
                }
                None => {
                    warn!(%peer, "Fleet pusher disconnected");
                    break;
                }
            }
        }
    }
}
