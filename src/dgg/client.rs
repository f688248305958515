//! DGG chat websocket client.
//!
//! Feeds public messages into the relay's inbound queue, keeps the presence
//! roster current, forwards whispers to Discord and posts outbound commands.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::bridge::channels::DggChannels;
use crate::bridge::{InboundQueue, PresenceTracker};
use crate::common::error::DggError;
use crate::common::reconnect::{
    shutdown_requested, wait_before_reconnect, ReconnectDelays,
};
use crate::common::DggCommand;
use crate::config::types::DggConfig;
use crate::dgg::protocol::{encode_command, encode_pong, parse_frame, DggEvent};

pub struct DggClient {
    config: DggConfig,
    queue: InboundQueue,
    presence: PresenceTracker,
    pub channels: DggChannels,
}

impl DggClient {
    pub fn new(
        config: DggConfig,
        queue: InboundQueue,
        presence: PresenceTracker,
        channels: DggChannels,
    ) -> Self {
        Self {
            config,
            queue,
            presence,
            channels,
        }
    }

    /// Connect and keep reconnecting with backoff until shutdown.
    pub async fn run_forever(mut self) {
        let mut delays = ReconnectDelays::new();
        let mut shutdown_rx = self.channels.shutdown_rx.clone();

        loop {
            if shutdown_requested(&shutdown_rx) {
                info!("Shutdown signal detected, stopping DGG chat client");
                break;
            }

            info!("Connecting to DGG chat at {}...", self.config.chat_url);
            match self.run(&mut delays).await {
                Ok(()) => info!("DGG chat connection closed"),
                Err(e) => error!("DGG chat error: {}", e),
            }
            self.presence.clear();

            if shutdown_requested(&shutdown_rx) {
                break;
            }
            let delay = delays.next_delay();
            if !wait_before_reconnect("DGG chat", delay, &mut shutdown_rx).await {
                break;
            }
        }
    }

    /// Run one connection until it closes or shutdown is requested.
    pub async fn run(&mut self, delays: &mut ReconnectDelays) -> Result<(), DggError> {
        let mut request = self.config.chat_url.as_str().into_client_request()?;
        if let Some(token) = &self.config.auth_token {
            request
                .headers_mut()
                .insert(COOKIE, HeaderValue::from_str(&format!("authtoken={}", token))?);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        info!("Connected to DGG chat");
        delays.reset();
        let (mut sink, mut stream) = ws.split();
        let mut shutdown_rx = self.channels.shutdown_rx.clone();

        loop {
            tokio::select! {
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = self.handle_frame(text.as_str())? {
                                sink.send(Message::Text(reply.into())).await?;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("DGG chat sent close frame: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(DggError::ConnectionClosed),
                    }
                }

                Some(command) = self.channels.command_rx.recv() => {
                    if let Some(frame) = self.outbound_frame(&command)? {
                        sink.send(Message::Text(frame.into())).await?;
                    }
                }

                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Closing DGG chat connection");
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!("Close frame not sent: {}", e);
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Apply one inbound frame. Returns a frame to send back, if any.
    ///
    /// Malformed frames are logged and skipped. `needlogin` and `banned`
    /// errors end the connection; other server errors are only logged.
    fn handle_frame(&self, frame: &str) -> Result<Option<String>, DggError> {
        let event = match parse_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed DGG frame: {}", e);
                return Ok(None);
            }
        };

        match event {
            DggEvent::Message(message) => {
                self.queue.enqueue(message);
            }
            DggEvent::Whisper(whisper) => {
                info!("Whisper from {}", whisper.sender);
                if self.channels.whisper_tx.send(whisper).is_err() {
                    debug!("Whisper channel closed");
                }
            }
            DggEvent::Names(names) => {
                self.presence.replace_all(&names);
                info!("DGG chat roster loaded ({} users)", self.presence.len());
            }
            DggEvent::Join(nick) => self.presence.join(&nick),
            DggEvent::Quit(nick) => self.presence.quit(&nick),
            DggEvent::Error(description) => match description.as_str() {
                "needlogin" | "banned" => return Err(DggError::Server(description)),
                _ => warn!("DGG chat error: {}", description),
            },
            DggEvent::Ping(payload) => return Ok(Some(encode_pong(&payload))),
            DggEvent::Other(event) => debug!("Ignoring DGG event {}", event),
        }

        Ok(None)
    }

    /// Encode an outbound command, or drop it when the bot cannot post.
    fn outbound_frame(&self, command: &DggCommand) -> Result<Option<String>, DggError> {
        if self.config.auth_token.is_none() {
            warn!("No DGG auth token configured, dropping {:?}", command);
            return Ok(None);
        }
        encode_command(command).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channels::{ChannelBundle, ControlChannels, DiscordSideChannels};

    fn client(auth_token: Option<&str>) -> (DggClient, DiscordSideChannels, ControlChannels) {
        let ChannelBundle {
            dgg,
            discord,
            control,
            ..
        } = ChannelBundle::new();
        let config = DggConfig {
            auth_token: auth_token.map(str::to_string),
            chat_url: "wss://chat.destiny.gg/ws".to_string(),
            live_url: "wss://live.destiny.gg/".to_string(),
        };
        let client = DggClient::new(config, InboundQueue::new(), PresenceTracker::new(), dgg);
        (client, discord, control)
    }

    #[test]
    fn test_messages_are_queued() {
        let (client, _discord, _control) = client(None);
        let reply = client
            .handle_frame(r#"MSG {"nick":"alice","data":"hi","timestamp":1}"#)
            .unwrap();

        assert!(reply.is_none());
        let batch = client.queue.drain_all();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].sender, "alice");
    }

    #[test]
    fn test_roster_is_tracked() {
        let (client, _discord, _control) = client(None);
        client
            .handle_frame(r#"NAMES {"users":[{"nick":"Bob"}],"connectioncount":1}"#)
            .unwrap();
        client.handle_frame(r#"JOIN {"nick":"carol"}"#).unwrap();
        client.handle_frame(r#"QUIT {"nick":"bob"}"#).unwrap();

        assert!(!client.presence.is_present("bob"));
        assert!(client.presence.is_present("Carol"));
    }

    #[tokio::test]
    async fn test_whispers_are_forwarded() {
        let (client, mut discord, _control) = client(None);
        client
            .handle_frame(r#"PRIVMSG {"nick":"bob","data":"psst"}"#)
            .unwrap();

        let whisper = discord.whisper_rx.recv().await.unwrap();
        assert_eq!(whisper.sender, "bob");
        assert_eq!(whisper.text, "psst");
    }

    #[test]
    fn test_ping_is_answered_and_garbage_skipped() {
        let (client, _discord, _control) = client(None);
        assert_eq!(
            client.handle_frame(r#"PING {"data":42}"#).unwrap(),
            Some(r#"PONG {"data":42}"#.to_string())
        );
        assert!(client.handle_frame("???").unwrap().is_none());
    }

    #[test]
    fn test_fatal_server_errors() {
        let (client, _discord, _control) = client(None);
        assert!(client.handle_frame(r#"ERR "throttled""#).unwrap().is_none());
        assert!(matches!(
            client.handle_frame(r#"ERR "needlogin""#),
            Err(DggError::Server(_))
        ));
    }

    #[test]
    fn test_outbound_requires_auth() {
        let command = DggCommand::Send {
            text: "hello".to_string(),
        };

        let (anonymous, _discord, _control) = client(None);
        assert!(anonymous.outbound_frame(&command).unwrap().is_none());

        let (authed, _discord2, _control2) = client(Some("token"));
        assert_eq!(
            authed.outbound_frame(&command).unwrap(),
            Some(r#"MSG {"data":"hello"}"#.to_string())
        );
    }
}
