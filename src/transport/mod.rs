//! WebSocket transport for interview audio
//!
//! Owns the single persistent connection to the interview endpoint and
//! routes traffic: outbound encoded audio frames go to the socket, inbound
//! binary frames are decoded and handed up for playback, inbound text
//! frames are forwarded to the host as structured messages.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::events::SessionEvent;
use crate::frame::{self, FrameKind};
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State of the connection to the interview endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket
    Disconnected,
    /// Dial in progress
    Connecting,
    /// Socket open, frames may flow
    Connected,
}

/// Traffic surfaced to the session loop
#[derive(Debug)]
pub enum Incoming {
    /// Server audio payload, frame tag already stripped
    Audio(Vec<u8>),
    /// Structured text message for the host
    Message(serde_json::Value),
    /// The connection is gone; the state reset has already been emitted
    Closed,
}

/// Owns the connection lifecycle and demultiplexes inbound traffic
pub struct Transport {
    endpoint: Url,
    state: ConnectionState,
    ws: Option<WsStream>,
    events: UnboundedSender<SessionEvent>,
}

impl Transport {
    /// Create a transport for the given base endpoint
    #[must_use]
    pub const fn new(endpoint: Url, events: UnboundedSender<SessionEvent>) -> Self {
        Self {
            endpoint,
            state: ConnectionState::Disconnected,
            ws: None,
            events,
        }
    }

    /// Open the connection for an interview session
    ///
    /// A no-op when not disconnected, so a duplicate call can never open a
    /// second socket.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the dial fails; the state returns to
    /// `Disconnected`.
    pub async fn connect(&mut self, session_id: &str) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored");
            return Ok(());
        }

        let url = session_url(&self.endpoint, session_id)?;
        self.state = ConnectionState::Connecting;
        tracing::debug!(url = %url, "connecting");

        match connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                self.ws = Some(ws);
                self.state = ConnectionState::Connected;
                let _ = self.events.send(SessionEvent::Connected);
                tracing::info!("connected to interview endpoint");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(Error::Connection(e.to_string()))
            }
        }
    }

    /// Transmit an encoded frame
    ///
    /// Silently does nothing unless connected; callers needing certainty
    /// check [`Transport::state`] themselves. A socket-level failure is
    /// reported as an event without touching the state; the close that
    /// follows does the transition.
    pub async fn send(&mut self, frame: Vec<u8>) {
        if self.state != ConnectionState::Connected {
            return;
        }

        if let Some(ws) = &mut self.ws {
            if let Err(e) = ws.send(Message::Binary(frame)).await {
                tracing::warn!(error = %e, "frame send failed");
                let _ = self.events.send(SessionEvent::ConnectionError {
                    detail: e.to_string(),
                });
            }
        }
    }

    /// Wait for the next piece of routable inbound traffic
    ///
    /// Malformed frames, unknown frame kinds, client-audio echoes, and
    /// unparseable text are dropped here with a log line; none of them end
    /// the connection.
    pub async fn recv(&mut self) -> Incoming {
        let mut errored = false;

        loop {
            let Some(ws) = &mut self.ws else {
                return Incoming::Closed;
            };

            match ws.next().await {
                Some(Ok(Message::Binary(data))) => match frame::decode(&data) {
                    Ok((FrameKind::ServerAudio, payload)) => {
                        return Incoming::Audio(payload.to_vec());
                    }
                    Ok((kind, _)) => {
                        tracing::trace!(?kind, "ignoring non-server audio frame");
                    }
                    Err(Error::UnknownFrameKind(kind)) => {
                        tracing::debug!(kind, "dropping unknown frame kind");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed frame");
                    }
                },
                Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                    Ok(value) => return Incoming::Message(value),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unparseable text message");
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(reason))) => {
                    tracing::debug!(?reason, "close frame received");
                    self.ws = None;
                    self.mark_disconnected();
                    return Incoming::Closed;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "socket error");
                    let _ = self.events.send(SessionEvent::ConnectionError {
                        detail: e.to_string(),
                    });
                    // The state transition belongs to the close that
                    // follows; only a repeat error forces it
                    if errored {
                        self.ws = None;
                        self.mark_disconnected();
                        return Incoming::Closed;
                    }
                    errored = true;
                }
                None => {
                    self.ws = None;
                    self.mark_disconnected();
                    return Incoming::Closed;
                }
            }
        }
    }

    /// Close the connection if open
    ///
    /// Idempotent; safe from any state.
    pub async fn disconnect(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
        }
        self.mark_disconnected();
    }

    /// Current connection state
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn mark_disconnected(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            let _ = self.events.send(SessionEvent::Disconnected);
            tracing::info!("disconnected from interview endpoint");
        }
    }
}

/// Derive the connection target from the base endpoint and the opaque
/// session id
fn session_url(endpoint: &Url, session_id: &str) -> Result<Url> {
    if session_id.is_empty() {
        return Err(Error::Config("session id is empty".to_string()));
    }

    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("endpoint {endpoint} cannot carry a session path")))?
        .pop_if_empty()
        .push(session_id);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_session_url_appends_id() {
        let url = session_url(&endpoint("wss://voice.example.com/audio"), "sess-42").unwrap();
        assert_eq!(url.as_str(), "wss://voice.example.com/audio/sess-42");
    }

    #[test]
    fn test_session_url_trailing_slash() {
        let url = session_url(&endpoint("wss://voice.example.com/audio/"), "sess-42").unwrap();
        assert_eq!(url.as_str(), "wss://voice.example.com/audio/sess-42");
    }

    #[test]
    fn test_session_url_rejects_empty_id() {
        assert!(session_url(&endpoint("wss://voice.example.com"), "").is_err());
    }

    #[test]
    fn test_send_without_connection_is_a_no_op() {
        let (events, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut transport = Transport::new(endpoint("wss://voice.example.com"), events);

        assert_eq!(transport.state(), ConnectionState::Disconnected);
        tokio_test::block_on(transport.send(vec![0x01, 0x00, 0x00]));

        assert!(event_rx.try_recv().is_err());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disconnect_before_connect_is_silent() {
        let (events, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut transport = Transport::new(endpoint("wss://voice.example.com"), events);

        tokio_test::block_on(transport.disconnect());
        tokio_test::block_on(transport.disconnect());

        assert!(event_rx.try_recv().is_err());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }
}
