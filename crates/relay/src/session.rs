// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-connection control loop.
//!
//! Each session runs as a pair of tasks: the handler task reads frames and
//! hands them to the broadcaster, and a writer task drains the session's
//! outbound queue onto the stream. Either side ending cancels the other.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use murmur_common::{ChatMessage, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::SessionError;
use crate::registry::{SessionHandle, SessionId};
use crate::relay::Relay;

type FrameSink<S> = SplitSink<Framed<S, FrameCodec>, Bytes>;
type FrameStream<S> = SplitStream<Framed<S, FrameCodec>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the identity frame.
    Connecting,
    /// Registered and relaying.
    Active,
    /// Tearing down: stream being released, registry entry being removed.
    Closing,
    Closed,
}

impl SessionState {
    /// Whether a session in this state may move to `next`. A session only
    /// ever moves forward, and can skip `Active` if the handshake fails.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }
}

fn advance(id: SessionId, state: &mut SessionState, next: SessionState) {
    debug_assert!(
        state.can_advance_to(next),
        "invalid session transition {state:?} -> {next:?}"
    );
    trace!(session = %id, from = ?state, to = ?next, "Session state change");
    *state = next;
}

/// How the inbound side of an active session stopped.
enum InboundEnd {
    EndOfStream,
    DropRequested,
}

struct SessionConnection<S> {
    id: SessionId,
    peer: String,
    relay: Relay,
    state: SessionState,
    read: FrameStream<S>,
    write: Option<FrameSink<S>>,
}

impl<S> SessionConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn transition(&mut self, next: SessionState) {
        advance(self.id, &mut self.state, next);
    }

    async fn run(mut self) -> Result<(), SessionError> {
        let settings = *self.relay.settings();

        let display_name = match self.handshake(settings.idle_timeout).await {
            Ok(name) => name,
            Err(e) => {
                self.transition(SessionState::Closing);
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        let drop_token = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_queue_depth);
        let Some(write) = self.write.take() else {
            return Err(SessionError::TransportError(io::Error::other(
                "session write half already taken",
            )));
        };
        let writer = tokio::spawn(drain_outbound(write, outbound_rx, drop_token.clone()));

        let handle = SessionHandle::new(
            self.id,
            display_name.clone(),
            outbound_tx,
            drop_token.clone(),
        );
        let population = self.relay.registry().add(handle);
        self.transition(SessionState::Active);
        info!(session = %self.id, name = %display_name, peer = %self.peer, "{display_name} has connected");
        self.relay
            .broadcaster()
            .publish(&ChatMessage::join(&*display_name), None);
        info!(population, "Currently {population} user(s) connected");

        let inbound = self
            .relay_inbound(&display_name, &drop_token, settings.idle_timeout)
            .await;

        self.transition(SessionState::Closing);
        drop_token.cancel();
        let outbound = match writer.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::TransportError(io::Error::other(e))),
        };
        let Self {
            id,
            relay,
            read,
            mut state,
            ..
        } = self;
        drop(read);

        if relay.registry().remove(id).is_some() {
            info!(session = %id, name = %display_name, "{display_name} has disconnected");
            relay
                .broadcaster()
                .publish(&ChatMessage::leave(&*display_name), None);
        }
        advance(id, &mut state, SessionState::Closed);

        match inbound? {
            InboundEnd::EndOfStream => Ok(()),
            InboundEnd::DropRequested => {
                // A failed writer cancels the token itself; otherwise it was the
                // broadcaster giving up on a full queue.
                outbound?;
                Err(SessionError::PeerUnresponsive)
            }
        }
    }

    /// Read the identity frame. Anything but a non-empty UTF-8 name fails.
    async fn handshake(&mut self, idle_timeout: Option<Duration>) -> Result<Arc<str>, SessionError> {
        let frame = next_frame(&mut self.read, idle_timeout)
            .await
            .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;
        let Some(frame) = frame else {
            return Err(SessionError::HandshakeFailed(
                "connection closed before identity was sent".to_string(),
            ));
        };
        let name = std::str::from_utf8(&frame)
            .map_err(|e| SessionError::HandshakeFailed(format!("identity is not UTF-8: {e}")))?
            .trim();
        if name.is_empty() {
            return Err(SessionError::HandshakeFailed(
                "empty display name".to_string(),
            ));
        }
        // The longest notice carrying the name must still fit in one frame.
        if ChatMessage::join(name).render().len() > self.relay.settings().max_frame_length {
            return Err(SessionError::HandshakeFailed(
                "display name too long".to_string(),
            ));
        }
        debug!(session = %self.id, name, "Handshake complete");
        Ok(Arc::from(name))
    }

    async fn relay_inbound(
        &mut self,
        display_name: &str,
        drop_token: &CancellationToken,
        idle_timeout: Option<Duration>,
    ) -> Result<InboundEnd, SessionError> {
        loop {
            let frame = select! {
                biased;
                _ = drop_token.cancelled() => return Ok(InboundEnd::DropRequested),
                frame = next_frame(&mut self.read, idle_timeout) => frame?,
            };
            let Some(frame) = frame else {
                return Ok(InboundEnd::EndOfStream);
            };
            if frame.is_empty() {
                continue;
            }
            let body = String::from_utf8(frame.to_vec())
                .map_err(|e| SessionError::MalformedFrame(format!("chat line is not UTF-8: {e}")))?;
            let message = ChatMessage::chat(display_name, body);
            let rendered_length = message.render().len();
            let max = self.relay.settings().max_frame_length;
            if rendered_length > max {
                return Err(SessionError::MalformedFrame(format!(
                    "chat line renders to {rendered_length} bytes, over the {max} byte frame limit"
                )));
            }
            info!(session = %self.id, "{message}");
            self.relay.broadcaster().publish(&message, None);
        }
    }
}

async fn next_frame<S>(
    read: &mut FrameStream<S>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, read.next()).await {
            Ok(next) => next,
            Err(_) => {
                return Err(SessionError::TransportError(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "idle timeout",
                )));
            }
        },
        None => read.next().await,
    };
    next.transpose().map_err(SessionError::from)
}

/// Writer half of a session: moves queued payloads onto the stream in order.
async fn drain_outbound<S>(
    mut write: FrameSink<S>,
    mut outbound: mpsc::Receiver<Bytes>,
    drop_token: CancellationToken,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = loop {
        let payload = select! {
            biased;
            _ = drop_token.cancelled() => break Ok(()),
            payload = outbound.recv() => payload,
        };
        let Some(payload) = payload else {
            break Ok(());
        };
        select! {
            biased;
            _ = drop_token.cancelled() => break Ok(()),
            sent = write.send(payload) => {
                if let Err(e) = sent {
                    break Err(SessionError::from(e));
                }
            }
        }
    };
    if let Err(e) = &result {
        debug!(error = %e, "Write failed, closing session");
        drop_token.cancel();
    }
    result
}

/// Drive one connection from handshake to close.
pub async fn run_session<S>(relay: Relay, stream: S, peer: String) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let codec = FrameCodec::with_max_length(relay.settings().max_frame_length);
    let (write, read) = Framed::new(stream, codec).split();
    let connection = SessionConnection {
        id: SessionId::new(),
        peer,
        relay,
        state: SessionState::Connecting,
        read,
        write: Some(write),
    };
    connection.run().await
}
