//! End-to-end scenarios driven against an in-process scripted TCP bookie
//! (there is no real bookie to dial in CI): a loopback listener whose
//! replies are scripted per test, scaled up from single-frame unit tests to
//! exercise the whole client façade.
//!
//! Timeouts in these tests are shortened relative to the scenarios' literal
//! wall-clock figures (e.g. S2's `read_timeout = 1s`) so the suite stays
//! fast; the behavior under test (which callback fires, with which
//! arguments, in which order) is unaffected by the absolute duration.

use bk_client::{PeerClient, PeerClientConfig};
use bk_proto::{
    decode_request, encode_frame, encode_response, try_decode_frame, ClientErrorKind, Header,
    OpType, PeerAddress, RequestBody, ResponseBody, StatusCode, LAST_ADD_CONFIRMED,
};
use bk_transport_tcp::TcpTransportFactory;
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// Spawns a one-shot scripted bookie: accepts exactly one connection, then
/// for every decoded request calls `respond` to decide what (if anything)
/// to write back. Returns the listening address and the live accept count
/// (bumped once the connection is accepted), so S6 can assert coalescing.
async fn spawn_mock_bookie<F>(respond: F) -> (PeerAddress, Arc<AtomicUsize>)
where
    F: Fn(Header, RequestBody) -> Option<ResponseBody> + Send + 'static,
{
    let accept_count = Arc::new(AtomicUsize::new(0));
    let accept_count_task = Arc::clone(&accept_count);
    let (addr_tx, addr_rx) = oneshot::channel();

    tokio::spawn(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock bookie");
        let local = listener.local_addr().expect("local addr");
        addr_tx.send(local).expect("send bound addr");

        let (mut stream, _) = listener.accept().await.expect("accept");
        accept_count_task.fetch_add(1, Ordering::SeqCst);

        let mut buf = BytesMut::new();
        let mut read_buf = [0u8; 4096];
        loop {
            use tokio::io::AsyncReadExt;
            let n = match stream.read(&mut read_buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&read_buf[..n]);
            while let Ok(Some(payload)) = try_decode_frame(&mut buf) {
                let (header, body) = match decode_request(payload) {
                    Ok(decoded) => decoded,
                    Err(_) => continue,
                };
                if let Some(response) = respond(header, body) {
                    let encoded = encode_response(header.txn_id, &response);
                    let framed = encode_frame(&encoded);
                    use tokio::io::AsyncWriteExt;
                    if stream.write_all(&framed).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    let addr = addr_rx.await.expect("mock bookie never bound");
    (PeerAddress::from(addr), accept_count)
}

fn fast_config() -> PeerClientConfig {
    PeerClientConfig::default()
        .with_request_timeout(Duration::from_millis(200))
        .with_read_timeout(Duration::from_millis(100))
        .with_timeout_task_interval(Duration::from_millis(20))
}

#[tokio::test(flavor = "multi_thread")]
async fn s1_happy_add() {
    let (addr, _accepts) = spawn_mock_bookie(|header, _body| {
        Some(ResponseBody::Add {
            status: StatusCode::Ok,
            ledger_id: 7,
            entry_id: 3,
        })
        .filter(|_| header.op == OpType::AddEntry)
    })
    .await;

    let client: PeerClient<()> =
        PeerClient::builder(addr, Arc::new(TcpTransportFactory)).build();

    let (tx, rx) = oneshot::channel();
    client
        .add_entry(
            7,
            Bytes::from_static(b"key"),
            3,
            Bytes::from_static(b"x"),
            false,
            Box::new(move |rc, ledger_id, entry_id, peer, _ctx| {
                let _ = tx.send((rc, ledger_id, entry_id, peer));
            }),
            (),
        )
        .expect("add_entry accepted");

    let (rc, ledger_id, entry_id, peer) = tokio::time::timeout(Duration::from_millis(500), rx)
        .await
        .expect("callback within budget")
        .expect("callback delivered");

    assert_eq!(rc, ClientErrorKind::Ok);
    assert_eq!(ledger_id, 7);
    assert_eq!(entry_id, 3);
    assert_eq!(peer, addr);
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s2_timeout_fires_request_timeout() {
    // Mock bookie accepts the connection but never replies to anything.
    let (addr, _accepts) = spawn_mock_bookie(|_header, _body| None).await;

    let client: PeerClient<()> = PeerClient::builder(addr, Arc::new(TcpTransportFactory))
        .with_config(fast_config())
        .build();

    let (tx, rx) = oneshot::channel();
    client
        .read_entry(
            1,
            42,
            Box::new(move |rc, ledger_id, entry_id, body, _ctx| {
                let _ = tx.send((rc, ledger_id, entry_id, body));
            }),
            (),
        )
        .expect("read_entry accepted");

    let (rc, ledger_id, entry_id, body) = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("callback eventually fires")
        .expect("callback delivered");

    assert_eq!(rc, ClientErrorKind::RequestTimeout);
    assert_eq!(ledger_id, 1);
    assert_eq!(entry_id, 42);
    assert!(body.is_none());
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s3_disconnect_fails_all_pending_in_submission_order() {
    // Accept the connection, then close it immediately without responding
    // to anything, simulating a mid-flight disconnect.
    let (addr_tx, addr_rx) = oneshot::channel();
    tokio::spawn(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        addr_tx.send(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().await.expect("accept");
        // Give the client a moment to enqueue all three writes, then drop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(stream);
    });
    let addr = PeerAddress::from(addr_rx.await.expect("bound addr"));

    let client: PeerClient<()> = PeerClient::builder(addr, Arc::new(TcpTransportFactory))
        .with_config(fast_config())
        .build();

    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    for i in 0..3u32 {
        let tx = tx.clone();
        let order = Arc::clone(&order);
        client
            .add_entry(
                5,
                Bytes::from_static(b"key"),
                i as i64,
                Bytes::from_static(b"x"),
                false,
                Box::new(move |rc, ledger_id, entry_id, _peer, _ctx| {
                    order.lock().unwrap().push(i);
                    let _ = tx.send((rc, ledger_id, entry_id));
                }),
                (),
            )
            .expect("add_entry accepted");
    }
    drop(tx);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let (rc, ledger_id, _entry_id) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("callback within budget")
            .expect("channel open");
        assert_eq!(rc, ClientErrorKind::PeerUnavailable);
        assert_eq!(ledger_id, 5);
        seen.push(rc);
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s4_lac_sentinel_resolves_to_reported_entry() {
    let (addr, _accepts) = spawn_mock_bookie(|header, body| match body {
        RequestBody::Read { ledger_id, .. } => Some(ResponseBody::Read {
            status: StatusCode::Ok,
            ledger_id,
            entry_id: 77,
            body: Bytes::from_static(b"entry-77"),
        })
        .filter(|_| header.op == OpType::ReadEntry),
        _ => None,
    })
    .await;

    let client: PeerClient<()> =
        PeerClient::builder(addr, Arc::new(TcpTransportFactory)).build();

    let (tx, rx) = oneshot::channel();
    client
        .read_entry(
            9,
            LAST_ADD_CONFIRMED,
            Box::new(move |rc, ledger_id, entry_id, body, _ctx| {
                let _ = tx.send((rc, ledger_id, entry_id, body));
            }),
            (),
        )
        .expect("read_entry accepted");

    let (rc, ledger_id, entry_id, body) = tokio::time::timeout(Duration::from_millis(500), rx)
        .await
        .expect("callback within budget")
        .expect("callback delivered");

    assert_eq!(rc, ClientErrorKind::Ok);
    assert_eq!(ledger_id, 9);
    assert_eq!(entry_id, 77);
    assert_eq!(body.as_deref(), Some(&b"entry-77"[..]));
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s5_fence_returns_ledger_fenced() {
    let (addr, _accepts) = spawn_mock_bookie(|header, _body| {
        Some(ResponseBody::Read {
            status: StatusCode::Fenced,
            ledger_id: 2,
            entry_id: 0,
            body: Bytes::new(),
        })
        .filter(|_| header.op == OpType::ReadEntry)
    })
    .await;

    let client: PeerClient<()> =
        PeerClient::builder(addr, Arc::new(TcpTransportFactory)).build();

    let (tx, rx) = oneshot::channel();
    client
        .read_entry_and_fence(
            2,
            Bytes::from_static(b"key"),
            0,
            Box::new(move |rc, ledger_id, entry_id, body, _ctx| {
                let _ = tx.send((rc, ledger_id, entry_id, body));
            }),
            (),
        )
        .expect("read_entry_and_fence accepted");

    let (rc, ledger_id, entry_id, body) = tokio::time::timeout(Duration::from_millis(500), rx)
        .await
        .expect("callback within budget")
        .expect("callback delivered");

    assert_eq!(rc, ClientErrorKind::LedgerFenced);
    assert_eq!(ledger_id, 2);
    assert_eq!(entry_id, 0);
    assert!(body.is_none());
    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s6_concurrent_adds_coalesce_into_one_connect() {
    let (addr, accepts) = spawn_mock_bookie(|header, body| match body {
        RequestBody::Add {
            ledger_id,
            entry_id,
            ..
        } => Some(ResponseBody::Add {
            status: StatusCode::Ok,
            ledger_id,
            entry_id,
        })
        .filter(|_| header.op == OpType::AddEntry),
        _ => None,
    })
    .await;

    let client: PeerClient<()> =
        PeerClient::builder(addr, Arc::new(TcpTransportFactory)).build();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for i in 0..5i64 {
        let tx = tx.clone();
        client
            .add_entry(
                11,
                Bytes::from_static(b"key"),
                i,
                Bytes::from_static(b"x"),
                false,
                Box::new(move |rc, ledger_id, entry_id, _peer, _ctx| {
                    let _ = tx.send((rc, ledger_id, entry_id));
                }),
                (),
            )
            .expect("add_entry accepted");
    }
    drop(tx);

    for _ in 0..5 {
        let (rc, ledger_id, _entry_id) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("callback within budget")
            .expect("channel open");
        assert_eq!(rc, ClientErrorKind::Ok);
        assert_eq!(ledger_id, 11);
    }

    assert_eq!(accepts.load(Ordering::SeqCst), 1);
    client.close().await;
}
