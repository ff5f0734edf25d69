//! Integration tests: command round-trips, reply framing, reconnects,
//! connectivity and shutdown against scripted servers on localhost.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use amcp_core::{AmcpError, Connection, ConnectionOptions, ProtocolFailure, Version};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────

/// Listener on an OS-assigned port plus options pointing at it.
///
/// The reconnect timer is effectively off so tests control every
/// connect attempt themselves.
async fn ephemeral_listener() -> (TcpListener, ConnectionOptions) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut options = ConnectionOptions::new(addr.ip().to_string(), addr.port());
    options.reconnect_interval_ms = 60_000;
    options.receive_timeout_ms = 2_000;
    (listener, options)
}

/// Accept connections forever, passing each one and its index to
/// `handler`. Returns the number of accepted connections so far.
fn spawn_server<F, Fut>(listener: TcpListener, handler: F) -> Arc<AtomicUsize>
where
    F: Fn(usize, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let accepted = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handler(index, stream));
        }
    });
    accepted
}

/// Answer each expected request with its canned reply, in order.
async fn run_script(stream: TcpStream, script: Vec<(&'static str, &'static str)>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    for (request, reply) in script {
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, request);
        write.write_all(reply.as_bytes()).await.unwrap();
    }
    // Hold the socket open until the client goes away.
    while let Ok(Some(_)) = lines.next_line().await {}
}

async fn scripted(script: Vec<(&'static str, &'static str)>) -> (Connection, Arc<AtomicUsize>) {
    let (listener, options) = ephemeral_listener().await;
    let accepted = spawn_server(listener, move |_, stream| run_script(stream, script.clone()));
    (Connection::with_options(options), accepted)
}

async fn wait_for_connectivity(conn: &Connection, wanted: bool) {
    let mut states = conn.connectivity();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while let Some(state) = states.next().await {
            if state == wanted {
                return;
            }
        }
        panic!("connectivity stream ended");
    })
    .await
    .expect("timeout waiting for connectivity");
}

// ── Reply framing ────────────────────────────────────────────────

#[tokio::test]
async fn test_multi_line_reply_excludes_terminator() {
    let (conn, _) = scripted(vec![("TLS", "200 OK\r\nLINE1\r\nLINE2\r\n\r\n")]).await;
    let conn = Arc::new(conn);

    let blocking = Arc::clone(&conn);
    let lines = tokio::task::spawn_blocking(move || {
        blocking
            .send_blocking("TLS")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(lines, vec!["LINE1", "LINE2"]);
    conn.close().await;
}

#[tokio::test]
async fn test_single_line_reply() {
    let (conn, _) = scripted(vec![("INFO 1", "201 OK\r\nDATA\r\n")]).await;

    let mut reply = tokio::time::timeout(TEST_TIMEOUT, conn.send("INFO 1"))
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(reply.status().await.unwrap(), "201 OK");
    assert_eq!(reply.lines().await.unwrap(), vec!["DATA"]);
    conn.close().await;
}

#[tokio::test]
async fn test_error_code_fails_without_reset() {
    let (conn, accepted) = scripted(vec![
        ("FOO", "400 ERROR\r\n"),
        ("PLAY 1-10 MISSING", "404 PLAY FAILED\r\n"),
        ("CLEAR 1", "202 CLEAR OK\r\n"),
    ])
    .await;

    let err = conn.send("FOO").await.unwrap_err();
    assert_eq!(err.protocol_failure(), Some(ProtocolFailure::CommandNotUnderstood));

    let mut reply = conn.send_async("PLAY 1-10 MISSING");
    match reply.next().await {
        Some(Err(e)) => assert_eq!(e.protocol_failure(), Some(ProtocolFailure::MediaNotFound)),
        other => panic!("expected a protocol failure, got {other:?}"),
    }
    assert!(reply.next().await.is_none());

    // Same socket still serves the next command.
    let lines = conn.send("CLEAR 1").await.unwrap().lines().await.unwrap();
    assert!(lines.is_empty());
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    conn.close().await;
}

#[tokio::test]
async fn test_blocking_error_code_fails() {
    let (conn, accepted) = scripted(vec![("FOO", "400 ERROR\r\n"), ("X", "500 FAILED\r\n")]).await;
    let conn = Arc::new(conn);

    let blocking = Arc::clone(&conn);
    let (first, second) = tokio::task::spawn_blocking(move || {
        let first = blocking.send_blocking("FOO").map(|lines| lines.count());
        let second = blocking.send_blocking("X").map(|lines| lines.count());
        (first, second)
    })
    .await
    .unwrap();

    match first {
        Err(AmcpError::Protocol { failure, status }) => {
            assert_eq!(failure, ProtocolFailure::CommandNotUnderstood);
            assert_eq!(status, "400 ERROR");
        }
        other => panic!("expected a protocol failure, got {other:?}"),
    }
    assert!(matches!(
        second,
        Err(AmcpError::Protocol {
            failure: ProtocolFailure::InternalServerError,
            ..
        })
    ));
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    conn.close().await;
}

#[tokio::test]
async fn test_other_codes_are_status_only() {
    let (conn, _) = scripted(vec![("PLAY 1-10", "202 PLAY OK\r\n")]).await;

    let mut reply = conn.send("PLAY 1-10").await.unwrap();
    assert_eq!(reply.status().await.unwrap(), "202 PLAY OK");
    assert!(reply.lines().await.unwrap().is_empty());
    conn.close().await;
}

#[tokio::test]
async fn test_invalid_command_is_rejected_locally() {
    let (conn, _) = scripted(vec![("INFO", "201 OK\r\nx\r\n")]).await;

    let err = conn.send("INFO\r\nKILL").await.unwrap_err();
    assert!(matches!(err, AmcpError::InvalidCommand(_)));

    // Nothing reached the server, so the script is still at its first step.
    let lines = conn.send("INFO").await.unwrap().lines().await.unwrap();
    assert_eq!(lines, vec!["x"]);
    conn.close().await;
}

// ── Version ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_version_reply() {
    let (conn, _) = scripted(vec![("VERSION", "201 VERSION OK\r\n2.0.7.12345 Stable\r\n")]).await;

    let version = conn.version().await.unwrap();
    assert_eq!(
        version,
        Version {
            generation: 2,
            major: 0,
            minor: 7,
            revision: 12345,
            tag: "Stable".into(),
        }
    );
    conn.close().await;
}

#[tokio::test]
async fn test_malformed_version_reply() {
    let (conn, accepted) = scripted(vec![
        ("VERSION", "201 VERSION OK\r\nunknown build\r\n"),
        ("VERSION", "202 VERSION OK\r\n"),
    ])
    .await;

    assert!(matches!(conn.version().await, Err(AmcpError::MalformedResponse(_))));
    assert!(matches!(conn.version().await, Err(AmcpError::MalformedResponse(_))));
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    conn.close().await;
}

// ── Ordering ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_commands_run_in_submission_order() {
    let (listener, options) = ephemeral_listener().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    spawn_server(listener, move |_, stream| {
        let seen_tx = seen_tx.clone();
        async move {
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                seen_tx.send(line.trim_end().to_string()).unwrap();

                // The next request must not arrive while this reply is pending.
                let mut probe = [0u8; 1];
                let early = tokio::time::timeout(Duration::from_millis(100), reader.read(&mut probe)).await;
                assert!(early.is_err(), "request interleaved with a pending reply");

                write.write_all(b"200 OK\r\n").await.unwrap();
                write.write_all(line.trim_end().as_bytes()).await.unwrap();
                write.write_all(b"\r\n\r\n").await.unwrap();
            }
        }
    });

    let conn = Arc::new(Connection::with_options(options));

    // Two callers on separate tasks; the second submits only after the
    // first has queued its command.
    let (queued_tx, queued_rx) = oneshot::channel();
    let caller = Arc::clone(&conn);
    let a = tokio::spawn(async move {
        let reply = caller.send_async("INFO 1");
        queued_tx.send(()).unwrap();
        reply.collect::<Vec<_>>().await
    });
    let caller = Arc::clone(&conn);
    let b = tokio::spawn(async move {
        queued_rx.await.unwrap();
        caller.send_async("INFO 2").collect::<Vec<_>>().await
    });

    let a = tokio::time::timeout(TEST_TIMEOUT, a).await.expect("timeout").unwrap();
    let b = tokio::time::timeout(TEST_TIMEOUT, b).await.expect("timeout").unwrap();

    assert_eq!(a.into_iter().map(Result::unwrap).collect::<Vec<_>>(), vec!["INFO 1"]);
    assert_eq!(b.into_iter().map(Result::unwrap).collect::<Vec<_>>(), vec!["INFO 2"]);
    assert_eq!(seen_rx.recv().await.unwrap(), "INFO 1");
    assert_eq!(seen_rx.recv().await.unwrap(), "INFO 2");
    conn.close().await;
}

// ── Reconnect and connectivity ───────────────────────────────────

#[tokio::test]
async fn test_peer_close_reconnects_once_before_command() {
    let (listener, options) = ephemeral_listener().await;
    let accepted = spawn_server(listener, |index, stream| async move {
        if index == 0 {
            drop(stream);
        } else {
            run_script(stream, vec![("PING", "202 PING OK\r\n")]).await;
        }
    });

    let conn = Connection::with_options(options);
    wait_for_connectivity(&conn, true).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reply = tokio::time::timeout(TEST_TIMEOUT, conn.send("PING"))
        .await
        .expect("timeout")
        .unwrap();
    assert!(reply.lines().await.unwrap().is_empty());
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert!(conn.is_connected());
    conn.close().await;
}

#[tokio::test]
async fn test_transport_failure_mid_reply_resets() {
    let (listener, options) = ephemeral_listener().await;
    let accepted = spawn_server(listener, |index, stream| async move {
        if index == 0 {
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            lines.next_line().await.unwrap();
            write.write_all(b"200 OK\r\nA\r\n").await.unwrap();
            // Socket closes without the empty terminator line.
        } else {
            run_script(stream, vec![("CLS", "200 OK\r\nB\r\n\r\n")]).await;
        }
    });

    let conn = Connection::with_options(options);

    let mut reply = conn.send("CLS").await.unwrap();
    assert_eq!(reply.next().await.unwrap().unwrap(), "A");
    let err = reply.next().await.unwrap().unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert!(reply.next().await.is_none());

    let lines = conn.send("CLS").await.unwrap().lines().await.unwrap();
    assert_eq!(lines, vec!["B"]);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    conn.close().await;
}

#[tokio::test]
async fn test_unreachable_server_fails_command() {
    let (listener, options) = ephemeral_listener().await;
    drop(listener);

    let conn = Connection::with_options(options);
    let err = tokio::time::timeout(TEST_TIMEOUT, conn.send("INFO"))
        .await
        .expect("timeout")
        .unwrap_err();
    assert!(matches!(err, AmcpError::NotConnected(_)), "{err:?}");
    assert!(!conn.is_connected());
    conn.close().await;
}

#[tokio::test]
async fn test_connectivity_reports_transitions_only() {
    let (listener, mut options) = ephemeral_listener().await;
    options.reconnect_interval_ms = 50;

    // Serve exactly one connection, then stop listening.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(stream);
    });

    let conn = Connection::with_options(options);
    let states: Vec<bool> = tokio::time::timeout(TEST_TIMEOUT, conn.connectivity().take(3).collect())
        .await
        .expect("timeout");
    assert_eq!(states, vec![false, true, false]);
    server.await.unwrap();

    // Further failed reconnect ticks publish nothing new.
    let mut stream = conn.connectivity();
    assert_eq!(stream.next().await, Some(false));
    let next = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(next.is_err(), "unexpected item {next:?}");
    conn.close().await;
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_stops_reconnects_and_resets_once() {
    let (listener, mut options) = ephemeral_listener().await;
    options.reconnect_interval_ms = 50;
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    let accepted = spawn_server(listener, move |_, mut stream| {
        let closed_tx = closed_tx.clone();
        async move {
            let mut buf = [0u8; 64];
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
            let _ = closed_tx.send(());
        }
    });

    let conn = Connection::with_options(options);
    wait_for_connectivity(&conn, true).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    tokio::time::timeout(TEST_TIMEOUT, conn.close()).await.expect("timeout");
    tokio::time::timeout(TEST_TIMEOUT, closed_rx.recv())
        .await
        .expect("server never saw the socket close");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert!(closed_rx.try_recv().is_err());
    assert!(!conn.is_connected());
    assert!(conn.is_closed());

    // The worker is gone, so the stream ends after the current state.
    let states: Vec<bool> = tokio::time::timeout(TEST_TIMEOUT, conn.connectivity().collect())
        .await
        .expect("connectivity stream did not end");
    assert_eq!(states, vec![false]);

    // Closing twice is harmless; commands fail fast.
    conn.close().await;
    assert!(matches!(conn.send("INFO").await, Err(AmcpError::Disposed)));
}

#[tokio::test]
async fn test_goodbye_on_close() {
    let (listener, mut options) = ephemeral_listener().await;
    options.goodbye_on_close = true;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    spawn_server(listener, move |_, stream| {
        let seen_tx = seen_tx.clone();
        async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = seen_tx.send(line);
            }
        }
    });

    let conn = Connection::with_options(options);
    wait_for_connectivity(&conn, true).await;
    conn.close().await;

    let line = tokio::time::timeout(TEST_TIMEOUT, seen_rx.recv())
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(line, "BYE");
}

#[tokio::test]
async fn test_dropping_connection_closes_socket() {
    let (listener, options) = ephemeral_listener().await;
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    spawn_server(listener, move |_, mut stream| {
        let closed_tx = closed_tx.clone();
        async move {
            let mut buf = [0u8; 16];
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
            let _ = closed_tx.send(());
        }
    });

    let conn = Connection::with_options(options);
    wait_for_connectivity(&conn, true).await;
    drop(conn);

    tokio::time::timeout(TEST_TIMEOUT, closed_rx.recv())
        .await
        .expect("socket left open after drop");
}
