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

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use murmur_common::FrameCodec;
use murmur_relay::{Listener, Relay, SessionError, SessionSettings};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A front-end stand-in speaking the framed protocol.
pub struct TestClient<S> {
    framed: Framed<S, FrameCodec>,
}

impl<S> TestClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    pub async fn send<B: AsRef<[u8]>>(&mut self, payload: B) {
        self.framed
            .send(Bytes::copy_from_slice(payload.as_ref()))
            .await
            .expect("Failed to send frame");
    }

    pub fn stream_mut(&mut self) -> &mut S {
        self.framed.get_mut()
    }

    /// Next frame as text, or `None` once the relay has closed the stream.
    pub async fn recv(&mut self) -> Option<String> {
        let next = tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("Timed out waiting for a frame");
        match next {
            Some(Ok(payload)) => Some(String::from_utf8(payload.to_vec()).expect("Non UTF-8 frame")),
            Some(Err(_)) | None => None,
        }
    }

    pub async fn expect(&mut self, line: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(line));
    }

    /// Read until `line` arrives, returning whatever came before it.
    pub async fn recv_until(&mut self, line: &str) -> Vec<String> {
        let mut skipped = vec![];
        loop {
            match self.recv().await {
                Some(got) if got == line => return skipped,
                Some(got) => skipped.push(got),
                None => panic!("Stream closed before {line:?} arrived; saw {skipped:?}"),
            }
        }
    }

    /// Drain until the relay closes the stream, returning what was left.
    pub async fn expect_closed(&mut self) -> Vec<String> {
        let mut remaining = vec![];
        while let Some(line) = self.recv().await {
            remaining.push(line);
        }
        remaining
    }
}

pub async fn start_relay(settings: SessionSettings) -> (SocketAddr, Relay, watch::Sender<bool>) {
    let relay = Relay::new(settings);
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), relay.clone())
        .await
        .expect("Unable to bind test listener");
    let addr = listener.local_addr();
    let (terminate_send, terminate_receive) = watch::channel(false);
    tokio::spawn(listener.run(terminate_receive));
    (addr, relay, terminate_send)
}

pub async fn connect<N: AsRef<[u8]>>(addr: SocketAddr, name: N) -> TestClient<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .expect("Unable to connect to relay");
    let mut client = TestClient::new(stream);
    client.send(name).await;
    client
}

/// Attach an in-memory client to the relay. `buffer` bounds how much the
/// relay can write before the client reads.
pub fn attach_duplex(
    relay: &Relay,
    peer: &str,
    buffer: usize,
) -> (
    TestClient<DuplexStream>,
    JoinHandle<Result<(), SessionError>>,
) {
    let (client_side, relay_side) = tokio::io::duplex(buffer);
    let session = relay.spawn_session(relay_side, peer);
    (TestClient::new(client_side), session)
}

/// A stream whose reads work but whose every write fails with `BrokenPipe`.
pub struct BrokenWrites<S> {
    inner: S,
}

impl<S: AsyncRead + Unpin> AsyncRead for BrokenWrites<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<S: Unpin> AsyncWrite for BrokenWrites<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Like `attach_duplex`, but the relay can never write to this client.
pub fn attach_broken_writes(
    relay: &Relay,
    peer: &str,
) -> (
    TestClient<DuplexStream>,
    JoinHandle<Result<(), SessionError>>,
) {
    let (client_side, relay_side) = tokio::io::duplex(64 * 1024);
    let session = relay.spawn_session(BrokenWrites { inner: relay_side }, peer);
    (TestClient::new(client_side), session)
}

pub async fn wait_for_population(relay: &Relay, expected: usize) {
    let start = Instant::now();
    while relay.registry().len() != expected {
        if start.elapsed() > RECV_TIMEOUT {
            panic!(
                "Population stuck at {} (wanted {expected}): {:?}",
                relay.registry().len(),
                relay.registry().names()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
