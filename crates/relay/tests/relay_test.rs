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

mod common;

use common::{connect, start_relay, wait_for_population};
use murmur_relay::SessionSettings;
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_chat_leave_scenario() {
    let (addr, relay, _terminate) = start_relay(SessionSettings::default()).await;

    let mut alice = connect(addr, "alice").await;
    alice.expect("🔵 alice has joined the chat!").await;

    let mut bob = connect(addr, "bob").await;
    alice.expect("🔵 bob has joined the chat!").await;
    bob.expect("🔵 bob has joined the chat!").await;

    bob.send("hi").await;
    alice.expect("[bob] hi").await;
    bob.expect("[bob] hi").await;

    drop(alice);
    bob.expect("🔴 alice has left the chat.").await;
    assert_eq!(relay.registry().names(), vec!["bob"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_count_only_handshaken_sessions() {
    let (addr, relay, _terminate) = start_relay(SessionSettings::default()).await;

    let joins: Vec<_> = (0..12)
        .map(|i| tokio::spawn(connect(addr, format!("user{i}"))))
        .collect();
    let failures = ["", "   "].map(|name| tokio::spawn(connect(addr, name)));

    let mut clients = vec![];
    for join in joins {
        clients.push(join.await.unwrap());
    }
    let mut rejected = vec![];
    for failure in failures {
        rejected.push(failure.await.unwrap());
    }

    for client in &mut rejected {
        assert_eq!(client.expect_closed().await, Vec::<String>::new());
    }
    wait_for_population(&relay, 12).await;
    assert_eq!(relay.registry().len(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_messages_arrive_in_send_order() {
    let (addr, _relay, _terminate) = start_relay(SessionSettings::default()).await;

    let mut alice = connect(addr, "alice").await;
    alice.expect("🔵 alice has joined the chat!").await;
    let mut bob = connect(addr, "bob").await;
    bob.expect("🔵 bob has joined the chat!").await;
    alice.expect("🔵 bob has joined the chat!").await;

    let reader = tokio::spawn(async move {
        let mut received = vec![];
        for _ in 0..100 {
            received.push(bob.recv().await.expect("bob disconnected"));
        }
        received
    });
    for i in 0..100 {
        alice.send(format!("line {i}")).await;
    }

    let received = reader.await.unwrap();
    let expected: Vec<String> = (0..100).map(|i| format!("[alice] line {i}")).collect();
    assert_eq!(received, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_oversized_frame_closes_only_that_session() {
    let settings = SessionSettings {
        max_frame_length: 1024,
        ..SessionSettings::default()
    };
    let (addr, relay, _terminate) = start_relay(settings).await;

    let mut alice = connect(addr, "alice").await;
    alice.expect("🔵 alice has joined the chat!").await;
    let mut mallory = connect(addr, "mallory").await;
    alice.expect("🔵 mallory has joined the chat!").await;

    // Declares a 2 MiB payload.
    mallory
        .stream_mut()
        .write_all(&[0x00, 0x20, 0x00, 0x00])
        .await
        .unwrap();
    mallory.expect_closed().await;

    alice.expect("🔴 mallory has left the chat.").await;
    alice.send("still here").await;
    alice.expect("[alice] still here").await;
    assert_eq!(relay.registry().names(), vec!["alice"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_truncated_frame_closes_session() {
    let (addr, relay, _terminate) = start_relay(SessionSettings::default()).await;

    let mut alice = connect(addr, "alice").await;
    alice.expect("🔵 alice has joined the chat!").await;
    let mut bob = connect(addr, "bob").await;
    alice.expect("🔵 bob has joined the chat!").await;

    // Ten bytes promised, three delivered, then end of stream.
    let stream = bob.stream_mut();
    stream.write_all(&[0, 0, 0, 10, b'a', b'b', b'c']).await.unwrap();
    stream.shutdown().await.unwrap();

    alice.expect("🔴 bob has left the chat.").await;
    wait_for_population(&relay, 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_listener_stops_on_terminate() {
    let (addr, _relay, terminate) = start_relay(SessionSettings::default()).await;

    let mut alice = connect(addr, "alice").await;
    alice.expect("🔵 alice has joined the chat!").await;

    terminate.send(true).unwrap();
    // Existing sessions outlive the listener.
    alice.send("after").await;
    alice.expect("[alice] after").await;
}
