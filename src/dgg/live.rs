//! DGG live feed client.
//!
//! Watches `live.destiny.gg` for stream info updates and reports the YouTube
//! broadcast status to the live notifier.

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::common::error::DggError;
use crate::common::reconnect::{
    shutdown_requested, wait_before_reconnect, ReconnectDelays,
};
use crate::common::LiveSignal;

const STREAM_INFO: &str = "dggApi:streamInfo";

#[derive(Debug, Deserialize)]
struct LiveMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    streams: Streams,
}

#[derive(Debug, Deserialize)]
struct Streams {
    youtube: Option<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(default)]
    live: bool,
    #[serde(default)]
    id: Option<String>,
}

/// Decode a live feed frame. Frames other than stream info yield `None`.
pub fn parse_live_frame(frame: &str) -> Result<Option<LiveSignal>, DggError> {
    let message: LiveMessage = serde_json::from_str(frame)?;
    if message.kind != STREAM_INFO {
        return Ok(None);
    }

    let info: Option<StreamInfo> = serde_json::from_value(message.data)?;
    let youtube = info.and_then(|info| info.streams.youtube);
    Ok(Some(match youtube {
        Some(stream) => LiveSignal {
            live: stream.live,
            broadcast_id: stream.id.filter(|id| !id.is_empty()),
        },
        None => LiveSignal {
            live: false,
            broadcast_id: None,
        },
    }))
}

pub struct LiveClient {
    url: String,
    signal_tx: mpsc::UnboundedSender<LiveSignal>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LiveClient {
    pub fn new(
        url: impl Into<String>,
        signal_tx: mpsc::UnboundedSender<LiveSignal>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            url: url.into(),
            signal_tx,
            shutdown_rx,
        }
    }

    /// Connect and keep reconnecting with backoff until shutdown.
    pub async fn run_forever(mut self) {
        let mut delays = ReconnectDelays::new();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            if shutdown_requested(&shutdown_rx) {
                break;
            }

            info!("Connecting to DGG live feed at {}...", self.url);
            match self.run(&mut delays).await {
                Ok(()) => info!("DGG live feed closed"),
                Err(e) => error!("DGG live feed error: {}", e),
            }

            if shutdown_requested(&shutdown_rx) {
                break;
            }
            let delay = delays.next_delay();
            if !wait_before_reconnect("DGG live feed", delay, &mut shutdown_rx).await {
                break;
            }
        }
        info!("DGG live feed client stopped");
    }

    async fn run(&mut self, delays: &mut ReconnectDelays) -> Result<(), DggError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        info!("Connected to DGG live feed");
        delays.reset();
        let (_sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str())?,
                        Some(Ok(Message::Close(_))) => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(DggError::ConnectionClosed),
                    }
                }
                result = self.shutdown_rx.changed() => {
                    if result.is_err() || *self.shutdown_rx.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_frame(&self, frame: &str) -> Result<(), DggError> {
        match parse_live_frame(frame) {
            Ok(Some(signal)) => {
                debug!("Stream info: live={} id={:?}", signal.live, signal.broadcast_id);
                self.signal_tx
                    .send(signal)
                    .map_err(|_| DggError::ChannelClosed)?;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping malformed live frame: {}", e),
        }
        Ok(())
    }
}
