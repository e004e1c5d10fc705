//! End-to-end agent tests.
//!
//! Each test binds a real agent on an ephemeral port and drives it over
//! real sockets through the controller client, the same way an external
//! test harness would.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use fixmux::control::{frame, Controller};
use fixmux::{Agent, Config, FixMessage};

/// Bind an agent on an ephemeral control port and run it in the background.
async fn start_agent() -> (SocketAddr, JoinHandle<fixmux::Result<()>>) {
    let mut config = Config::default();
    config.control.port = 0;

    let agent = Agent::bind(config).await.unwrap();
    let addr = agent.local_addr().unwrap();
    let handle = tokio::spawn(agent.run());
    (addr, handle)
}

/// Poll until `pending_accept_count` reaches `expected` or give up.
async fn wait_for_pending(ctl: &mut Controller, server: &str, expected: usize) -> usize {
    let mut count = 0;
    for _ in 0..100 {
        count = ctl.server_pending_accept_count(server).await.unwrap();
        if count == expected {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    count
}

/// Poll until a client's connectivity flag reaches `expected` or give up.
async fn wait_for_client_connected(ctl: &mut Controller, name: &str, expected: bool) -> bool {
    let mut connected = !expected;
    for _ in 0..100 {
        connected = ctl.client_is_connected(name).await.unwrap();
        if connected == expected {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    connected
}

/// Poll until an accepted session's queue holds `expected` messages.
async fn wait_for_server_receive_count(
    ctl: &mut Controller,
    session: &str,
    expected: usize,
) -> usize {
    let mut count = 0;
    for _ in 0..100 {
        count = ctl.server_receive_count(session).await.unwrap();
        if count == expected {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    count
}

#[tokio::test]
async fn test_duplicate_names_rejected_per_kind() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.client_create("alpha").await.unwrap();
    let err = ctl.client_create("alpha").await.unwrap_err();
    assert!(err.to_string().contains("already in use"));

    // Server namespace is independent of the client namespace.
    ctl.server_create("alpha").await.unwrap();
    let err = ctl.server_create("alpha").await.unwrap_err();
    assert!(err.to_string().contains("already in use"));

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_pending_count_around_accept() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();
    assert_ne!(port, 0);

    // Nothing has connected yet.
    assert_eq!(ctl.server_pending_accept_count("s1").await.unwrap(), 0);

    ctl.client_create("c1").await.unwrap();
    ctl.client_connect("c1", "127.0.0.1", port).await.unwrap();

    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);

    // Accept drains the queue.
    ctl.server_accept("s1", "cs1").await.unwrap();
    assert_eq!(ctl.server_pending_accept_count("s1").await.unwrap(), 0);

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_accept_is_fifo() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();

    // Connect A, wait for it to be queued, then connect B - so arrival
    // order is known.
    ctl.client_create("a").await.unwrap();
    ctl.client_connect("a", "127.0.0.1", port).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);

    ctl.client_create("b").await.unwrap();
    ctl.client_connect("b", "127.0.0.1", port).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 2).await, 2);

    ctl.server_accept("s1", "cs_first").await.unwrap();
    ctl.server_accept("s1", "cs_second").await.unwrap();

    // Prove identity by traffic: a message sent from A lands on the first
    // accepted session, one from B on the second.
    let mut from_a = FixMessage::new();
    from_a.append_pair(35, "D");
    from_a.append_pair(11, "order-from-a");
    ctl.client_send("a", &from_a).await.unwrap();

    let mut from_b = FixMessage::new();
    from_b.append_pair(35, "D");
    from_b.append_pair(11, "order-from-b");
    ctl.client_send("b", &from_b).await.unwrap();

    assert_eq!(
        wait_for_server_receive_count(&mut ctl, "cs_first", 1).await,
        1
    );
    assert_eq!(
        wait_for_server_receive_count(&mut ctl, "cs_second", 1).await,
        1
    );

    let on_first = ctl.server_receive("cs_first").await.unwrap();
    assert!(on_first.contains("11=order-from-a\x01"));
    let on_second = ctl.server_receive("cs_second").await.unwrap();
    assert!(on_second.contains("11=order-from-b\x01"));

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_peer_close_flips_accepted_flag_without_request() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();
    ctl.client_create("c1").await.unwrap();
    ctl.client_connect("c1", "127.0.0.1", port).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);
    ctl.server_accept("s1", "cs1").await.unwrap();

    assert!(ctl.server_is_connected("cs1").await.unwrap());

    // The client hangs up; no request ever targets cs1 in between, yet
    // its flag must flip as the close is observed during I/O servicing.
    ctl.client_disconnect("c1").await.unwrap();

    let mut connected = true;
    for _ in 0..100 {
        connected = ctl.server_is_connected("cs1").await.unwrap();
        if !connected {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(!connected);

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fix_exchange_both_directions() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();
    ctl.client_create("c1").await.unwrap();
    ctl.client_connect("c1", "127.0.0.1", port).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);
    ctl.server_accept("s1", "cs1").await.unwrap();

    // Client to accepted session.
    let mut logon = FixMessage::new();
    logon.append_pair(35, "A");
    logon.append_pair(49, "CLIENT");
    logon.append_pair(56, "SERVER");
    ctl.client_send("c1", &logon).await.unwrap();

    assert_eq!(wait_for_server_receive_count(&mut ctl, "cs1", 1).await, 1);
    let received = ctl.server_receive("cs1").await.unwrap();
    assert!(received.contains("35=A\x01"));
    assert!(received.contains("49=CLIENT\x01"));
    // Queue is drained.
    assert_eq!(ctl.server_receive_count("cs1").await.unwrap(), 0);

    // Accepted session back to client.
    let mut ack = FixMessage::new();
    ack.append_pair(35, "A");
    ack.append_pair(49, "SERVER");
    ack.append_pair(56, "CLIENT");
    ctl.server_send("cs1", &ack).await.unwrap();

    let mut count = 0;
    for _ in 0..100 {
        count = ctl.client_receive_count("c1").await.unwrap();
        if count == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count, 1);
    let received = ctl.client_receive("c1").await.unwrap();
    assert!(received.contains("49=SERVER\x01"));

    // Receiving from an empty queue is an error, not a hang.
    let err = ctl.client_receive("c1").await.unwrap_err();
    assert!(err.to_string().contains("no message queued"));

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_destroy_cascades() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port_a = ctl.server_listen("s1", 0).await.unwrap();
    let port_b = ctl.server_listen("s1", 0).await.unwrap();
    assert_ne!(port_a, port_b);

    ctl.client_create("c1").await.unwrap();
    ctl.client_connect("c1", "127.0.0.1", port_a).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);
    ctl.server_accept("s1", "cs1").await.unwrap();
    assert!(ctl.server_is_connected("cs1").await.unwrap());

    ctl.server_destroy("s1").await.unwrap();

    // The server, its accepted session, and its ports are all gone.
    let err = ctl.server_pending_accept_count("s1").await.unwrap_err();
    assert!(err.to_string().contains("Not found"));
    let err = ctl.server_is_connected("cs1").await.unwrap_err();
    assert!(err.to_string().contains("Not found"));
    let err = ctl.server_destroy("s1").await.unwrap_err();
    assert!(err.to_string().contains("Already destroyed"));

    // The accepted side's socket was closed, so the client observes EOF.
    assert!(!wait_for_client_connected(&mut ctl, "c1", false).await);

    // The released port refuses new connections once the listener is gone.
    sleep(Duration::from_millis(50)).await;
    let refused = TcpStream::connect(("127.0.0.1", port_a)).await;
    assert!(refused.is_err());

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unlisten_releases_port() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();

    ctl.server_unlisten("s1", port).await.unwrap();
    let err = ctl.server_unlisten("s1", port).await.unwrap_err();
    assert!(err.to_string().contains("no listener"));

    sleep(Duration::from_millis(50)).await;
    let refused = TcpStream::connect(("127.0.0.1", port)).await;
    assert!(refused.is_err());

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connect_refused_reported_and_retryable() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    // Grab a port with no listener behind it.
    let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = unused.local_addr().unwrap().port();
    drop(unused);
    sleep(Duration::from_millis(20)).await;

    ctl.client_create("c1").await.unwrap();
    let err = ctl
        .client_connect("c1", "127.0.0.1", dead_port)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Connect error"));

    // Failure left the session at Created; retry against a live server.
    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();
    ctl.client_connect("c1", "127.0.0.1", port).await.unwrap();
    assert!(ctl.client_is_connected("c1").await.unwrap());

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_accept_without_pending_fails() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    ctl.server_listen("s1", 0).await.unwrap();

    let err = ctl.server_accept("s1", "cs1").await.unwrap_err();
    assert!(err.to_string().contains("No pending connection"));

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_type_keeps_connection_usable() {
    let (addr, handle) = start_agent().await;

    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(&frame::encode(br#"{"type":"warp_core_eject"}"#))
        .await
        .unwrap();

    // One generic error frame comes back...
    let mut header = [0u8; 4];
    raw.read_exact(&mut header).await.unwrap();
    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    raw.read_exact(&mut payload).await.unwrap();

    let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["result"], false);
    assert!(value["message"]
        .as_str()
        .unwrap()
        .contains("warp_core_eject"));

    // ...and the connection still answers well-formed requests.
    raw.write_all(&frame::encode(br#"{"type":"client_create","name":"c1"}"#))
        .await
        .unwrap();
    raw.read_exact(&mut header).await.unwrap();
    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    raw.read_exact(&mut payload).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(value["type"], "client_created");
    assert_eq!(value["result"], true);

    let mut ctl = Controller::connect(addr).await.unwrap();
    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_json_closes_connection_but_not_agent() {
    let (addr, handle) = start_agent().await;

    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(&frame::encode(b"{not json")).await.unwrap();

    // The agent closes this connection without answering.
    let mut buf = [0u8; 64];
    let n = raw.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);

    // Other connections and the agent itself are unaffected.
    let mut ctl = Controller::connect(addr).await.unwrap();
    ctl.client_create("c1").await.unwrap();
    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let (addr, handle) = start_agent().await;

    let mut raw = TcpStream::connect(addr).await.unwrap();
    // Announce a frame far beyond the 1 MiB default cap.
    raw.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

    let mut buf = [0u8; 64];
    let n = raw.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);

    let mut ctl = Controller::connect(addr).await.unwrap();
    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}

/// The full scenario a controller walks through: create server, listen,
/// create client, connect, accept, verify both ends, disconnect, observe
/// the other end notice.
#[tokio::test]
async fn test_end_to_end_session_lifecycle() {
    let (addr, handle) = start_agent().await;
    let mut ctl = Controller::connect(addr).await.unwrap();

    ctl.server_create("s1").await.unwrap();
    let port = ctl.server_listen("s1", 0).await.unwrap();
    assert_eq!(ctl.server_pending_accept_count("s1").await.unwrap(), 0);

    ctl.client_create("c1").await.unwrap();
    ctl.client_connect("c1", "localhost", port).await.unwrap();
    assert_eq!(wait_for_pending(&mut ctl, "s1", 1).await, 1);

    ctl.server_accept("s1", "cs1").await.unwrap();
    assert!(ctl.server_is_connected("cs1").await.unwrap());
    assert!(ctl.client_is_connected("c1").await.unwrap());

    ctl.server_disconnect("cs1").await.unwrap();
    assert!(!ctl.server_is_connected("cs1").await.unwrap());

    // After the next loop servicing, the client side observes the close.
    assert!(!wait_for_client_connected(&mut ctl, "c1", false).await);

    ctl.client_destroy("c1").await.unwrap();
    ctl.server_destroy("s1").await.unwrap();

    ctl.shutdown().await.unwrap();
    handle.await.unwrap().unwrap();
}
