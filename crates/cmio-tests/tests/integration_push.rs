// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end scenarios for the TCP push server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use cmio_core::{GatewayCore, IoManager};
use cmio_modbus::FunctionCode;
use cmio_push::{PushConfig, PushServer};
use cmio_tests::common::mocks::{FakeBus, FakeCard};
use cmio_tests::common::test_io_config;

struct Harness {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
}

/// Starts a push server on an ephemeral port over a manager without a
/// cycle task, so every bus frame in the log is attributable to the test.
async fn start_push_server(bus: &FakeBus, slaves: &[(u8, &str)]) -> Harness {
    let manager = Arc::new(IoManager::new(test_io_config(bus)));
    for &(slave, module) in slaves {
        manager.add_card("/dev/x", slave, Some(module)).await.unwrap();
    }
    let core = GatewayCore {
        manager,
        cycle: None,
    }
    .shared();

    let server = PushServer::new(
        core,
        PushConfig {
            port: 0,
            serve_externally: false,
            version: "test".to_string(),
        },
    );
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.serve(listener, async move {
        let _ = stopped.await;
    }));

    Harness { addr, stop }
}

async fn connect(addr: SocketAddr) -> (BufReader<OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half), write_half)
}

async fn read_message(reader: &mut BufReader<OwnedReadHalf>) -> serde_json::Value {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("message within deadline")
        .expect("readable stream");
    serde_json::from_str(&line).expect("valid JSON line")
}

/// Reads messages until one of the given type arrives, skipping pushes of
/// other types.
async fn read_message_of_type(
    reader: &mut BufReader<OwnedReadHalf>,
    kind: &str,
) -> serde_json::Value {
    for _ in 0..10 {
        let message = read_message(reader).await;
        if message["type"] == kind {
            return message;
        }
    }
    panic!("no {kind} message received");
}

async fn wait_for_frames(bus: &FakeBus, function: FunctionCode, count: usize) {
    for _ in 0..100 {
        if bus.requests_for(function).len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} {function} frame(s), saw {:?}", bus.requests_for(function));
}

// =============================================================================
// Protocol flow
// =============================================================================

#[tokio::test]
async fn test_welcome_then_write_round_trip() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let harness = start_push_server(&bus, &[(1, "IO4040")]).await;

    let (mut reader, mut writer) = connect(harness.addr).await;

    let welcome = read_message(&mut reader).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["protocol"], "JSON");

    writer
        .write_all(
            b"{\"type\":\"write\",\"commands\":[\
              {\"type\":\"write-do\",\"cardId\":\"1\",\"index\":0,\"state\":true}]}\n",
        )
        .await
        .unwrap();

    let response = read_message_of_type(&mut reader, "write-response").await;
    assert_eq!(response["status"], "ok");
    assert_eq!(response["results"][0]["status"], "ok");
    assert_eq!(response["results"][0]["index"], 0);

    assert!(bus.card(1).unwrap().digital_out[0]);

    let _ = harness.stop.send(());
}

#[tokio::test]
async fn test_reboot_commands_processed_before_writes() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0404());
    let harness = start_push_server(&bus, &[(1, "IO0404")]).await;

    let (mut reader, mut writer) = connect(harness.addr).await;
    read_message(&mut reader).await; // welcome
    bus.clear_requests();

    writer
        .write_all(
            b"{\"type\":\"write\",\"commands\":[\
              {\"type\":\"write-ao\",\"cardId\":\"1\",\"index\":0,\"value\":2500},\
              {\"type\":\"reboot\",\"cardId\":\"1\",\"index\":0}]}\n",
        )
        .await
        .unwrap();

    let response = read_message_of_type(&mut reader, "write-response").await;
    assert_eq!(response["status"], "ok");
    assert_eq!(response["results"][1]["index"], 1);

    // The reboot frame went out before the AO write frame.
    let requests = bus.requests();
    let reboot_at = requests
        .iter()
        .position(|r| r.function == FunctionCode::WriteSingleRegister && r.address == 0x0010)
        .expect("reboot frame");
    let write_at = requests
        .iter()
        .position(|r| r.function == FunctionCode::WriteMultipleRegisters)
        .expect("AO write frame");
    assert!(reboot_at < write_at);

    let _ = harness.stop.send(());
}

#[tokio::test]
async fn test_periodic_card_updates() {
    let bus = FakeBus::new().with_card(1, FakeCard::io4040());
    let harness = start_push_server(&bus, &[(1, "IO4040")]).await;

    let (mut reader, _writer) = connect(harness.addr).await;
    read_message(&mut reader).await; // welcome

    let update = read_message_of_type(&mut reader, "card-update").await;
    let cards = update["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["module"], "IO4040");

    let _ = harness.stop.send(());
}

// =============================================================================
// Disconnect handling
// =============================================================================

#[tokio::test]
async fn test_disconnect_drives_safe_state_exactly_once() {
    let bus = FakeBus::new().with_card(1, {
        let mut card = FakeCard::io0080();
        card.digital_out = vec![true; 8];
        card
    });
    let harness = start_push_server(&bus, &[(1, "IO0080")]).await;

    let (mut reader, writer) = connect(harness.addr).await;
    read_message(&mut reader).await; // welcome
    bus.clear_requests();

    // Peer goes away.
    drop(writer);
    drop(reader);

    wait_for_frames(&bus, FunctionCode::WriteMultipleCoils, 1).await;

    let frames = bus.requests_for(FunctionCode::WriteMultipleCoils);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].quantity, 8);
    assert_eq!(frames[0].data, vec![0x00]);
    assert_eq!(bus.card(1).unwrap().digital_out, vec![false; 8]);

    // No second safe-state fires while no peer is attached.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bus.requests_for(FunctionCode::WriteMultipleCoils).len(), 1);

    let _ = harness.stop.send(());
}

#[tokio::test]
async fn test_second_client_is_rejected() {
    let bus = FakeBus::new().with_card(1, FakeCard::io0080());
    let harness = start_push_server(&bus, &[(1, "IO0080")]).await;

    let (mut reader1, _writer1) = connect(harness.addr).await;
    read_message(&mut reader1).await; // welcome

    // The second connection is closed without a welcome.
    let (mut reader2, _writer2) = connect(harness.addr).await;
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(2), reader2.read_line(&mut line))
        .await
        .expect("rejection within deadline")
        .expect("readable stream");
    assert_eq!(read, 0, "rejected client should see EOF, got {line:?}");

    // Rejecting the interloper did not touch the attached client's outputs.
    assert!(bus.requests_for(FunctionCode::WriteMultipleCoils).is_empty());

    let _ = harness.stop.send(());
}
