//! Tests for the dial/accept rendezvous.

use std::collections::HashSet;
use std::time::Duration;

use memnet::{Address, CancelToken, DialContext, ErrorKind, Provider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_ping_pong_between_named_endpoints() {
    let provider = Provider::new();
    let listener = provider.listen("memu", "svcA").await.unwrap();

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let peer = conn.remote_addr().unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        conn.write_all(b"pong").await.unwrap();
        peer
    });

    let mut client = provider.dial("memu", "svcA").await.unwrap();
    assert_eq!(client.remote_addr().unwrap().name(), "svcA");
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong");

    let peer = server.await.unwrap();
    assert_eq!(peer, client.local_addr().unwrap());
}

#[tokio::test]
async fn test_dial_unknown_name() {
    let provider = Provider::new();
    let _listener = provider.listen("memu", "svcA").await.unwrap();

    let err = provider.dial("memu", "nobody").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownAddress);
    assert_eq!(err.op(), "dial");
    assert_eq!(err.network(), "memu");
    assert_eq!(err.remote_addr().map(Address::name), Some("nobody"));

    let registry = provider.registry("memu").unwrap();
    assert_eq!(registry.names().await, vec!["svcA".to_string()]);
}

#[tokio::test]
async fn test_dial_with_explicit_local_name() {
    let provider = Provider::new();
    let listener = provider.listen_mem("memu", Some(Address::new("svcA"))).await.unwrap();

    let client = provider
        .dial_mem("memu", Some(Address::new("client-1")), Some(Address::new("svcA")))
        .await
        .unwrap();
    let server = listener.accept().await.unwrap();

    assert_eq!(client.local_addr().name(), "client-1");
    assert_eq!(client.remote_addr().name(), "svcA");
    assert_eq!(server.local_addr().name(), "svcA");
    assert_eq!(server.remote_addr().name(), "client-1");
    assert!(!client.is_remote());
    assert!(server.is_remote());
}

#[tokio::test]
async fn test_buffered_remote_is_rejected() {
    let provider = Provider::new();
    let _listener = provider.listen("memu", "svcA").await.unwrap();

    let err = provider
        .dial_mem("memu", None, Some(Address::buffered("svcA")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleAddress);
    assert!(err.to_string().ends_with("incompatible network & remote address"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dials_each_accepted_once() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    const DIALS: usize = 16;

    let provider = Provider::new();
    let listener = provider.listen_mem("memu", Some(Address::new("svc"))).await.unwrap();

    let dialers: Vec<_> = (0..DIALS)
        .map(|i| {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .dial_mem("memu", Some(Address::new(format!("c{i}"))), Some(Address::new("svc")))
                    .await
            })
        })
        .collect();

    let mut peers = HashSet::new();
    for _ in 0..DIALS {
        let conn = listener.accept().await.unwrap();
        assert!(peers.insert(conn.remote_addr().name().to_string()));
    }
    for dialer in dialers {
        dialer.await.unwrap().unwrap();
    }

    let expected: HashSet<String> = (0..DIALS).map(|i| format!("c{i}")).collect();
    assert_eq!(peers, expected);
}

#[tokio::test]
async fn test_cancelled_dial_leaves_listener_usable() {
    let provider = Provider::new();
    let listener = provider.listen("memu", "svcA").await.unwrap();

    let token = CancelToken::new();
    token.cancel();
    let ctx = DialContext::new().with_token(token);
    let err = provider.dial_context(&ctx, "memu", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!err.is_timeout());
    assert_eq!(err.to_string().rsplit(": ").next(), Some("context canceled"));

    let mut client = provider.dial("memu", "svcA").await.unwrap();
    let mut server = listener.accept().await.unwrap();
    client.write_all(b"ok").await.unwrap();
    let mut buf = [0u8; 2];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ok");
}

#[tokio::test]
async fn test_cancel_while_queued() {
    let provider = Provider::new();
    let listener = provider.listen("memu", "svcA").await.unwrap();
    let _first = provider.dial("memu", "svcA").await.unwrap();

    let token = CancelToken::new();
    let queued = tokio::spawn({
        let provider = provider.clone();
        let ctx = DialContext::new().with_token(token.clone());
        async move { provider.dial_context(&ctx, "memu", "svcA").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    token.cancel();

    let err = queued.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    // The first dial is still waiting in the slot.
    let _server = listener.accept().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dial_timeout_while_slot_full() {
    let provider = Provider::new();
    let _listener = provider.listen("memu", "svcA").await.unwrap();
    let _first = provider.dial("memu", "svcA").await.unwrap();

    let ctx = DialContext::new().with_timeout(Duration::from_millis(200));
    let err = provider.dial_context(&ctx, "memu", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(err.is_timeout());
}
