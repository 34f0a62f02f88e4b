//! Tests for listener close cascading to accepted connections.

use std::time::Duration;

use memnet::{Address, ErrorKind, Provider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_close_closes_accepted_connections() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let provider = Provider::new();
    let listener = provider.listen_mem("memu", Some(Address::new("svcA"))).await.unwrap();

    let mut client = provider
        .dial_mem("memu", None, Some(Address::new("svcA")))
        .await
        .unwrap();
    let mut server = listener.accept().await.unwrap();

    client.write_all(b"hello").await.unwrap();
    listener.close().await.unwrap();

    assert!(server.is_closed());
    let err = server.read(&mut [0u8; 8]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
    assert_eq!(err.local_addr().map(Address::name), Some("svcA"));

    // The dialer side is still open but sees end-of-stream.
    assert!(!client.is_closed());
    let n = client.read(&mut [0u8; 8]).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_close_wakes_pending_accept() {
    let provider = Provider::new();
    let listener = std::sync::Arc::new(
        provider
            .listen_mem("memu", Some(Address::new("svcA")))
            .await
            .unwrap(),
    );

    let acceptor = tokio::spawn({
        let listener = std::sync::Arc::clone(&listener);
        async move { listener.accept().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    listener.close().await.unwrap();

    let err = acceptor.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ListenerClosed);
    assert_eq!(err.op(), "accept");
    assert!(listener.is_closed());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let provider = Provider::new();
    let listener = provider.listen_mem("memu", Some(Address::new("svcA"))).await.unwrap();
    listener.close().await.unwrap();
    listener.close().await.unwrap();

    let err = listener.accept().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ListenerClosed);
}

#[tokio::test]
async fn test_dial_after_close_is_unknown_address() {
    let provider = Provider::new();
    let listener = provider.listen("memu", "svcA").await.unwrap();
    listener.close().await.unwrap();

    let err = provider.dial("memu", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownAddress);
}

#[tokio::test]
async fn test_close_does_not_affect_dialer_connections_elsewhere() {
    let provider = Provider::new();
    let a = provider.listen("memu", "svcA").await.unwrap();
    let b = provider.listen("memu", "svcB").await.unwrap();

    let mut to_b = provider.dial("memu", "svcB").await.unwrap();
    let mut from_b = b.accept().await.unwrap();
    a.close().await.unwrap();

    to_b.write_all(b"still here").await.unwrap();
    let mut buf = [0u8; 10];
    from_b.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"still here");
}
