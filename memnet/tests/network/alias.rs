//! Tests for network aliasing and the real-network fallback.

use memnet::{ErrorKind, Provider, ProviderConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_tcp_alias_routes_to_memory() {
    let provider = Provider::new();
    provider.map_network("tcp", "memu");
    assert_eq!(provider.resolve_network("tcp"), "memu");

    let listener = provider.listen("tcp", "svcA").await.unwrap();
    assert!(listener.as_memory().is_some());

    let mut client = provider.dial("tcp", "svcA").await.unwrap();
    let mut server = listener.accept().await.unwrap();
    let memory = client.as_memory().unwrap();
    assert_eq!(memory.network(), "tcp");
    assert_eq!(memory.remote_addr().name(), "svcA");

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // Both names reach the same registry.
    let err = provider.listen("memu", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AddressUnavailable);
}

#[tokio::test]
async fn test_cleared_alias_falls_back_to_real_network() {
    let provider = Provider::new();
    provider.map_network("tcp", "memu");
    let _listener = provider.listen("tcp", "svcA").await.unwrap();
    provider.map_network("tcp", "");

    let err = provider.dial("tcp", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.network(), "tcp");
}

#[tokio::test]
async fn test_isolated_provider_rejects_unknown_network() {
    let provider = Provider::with_config(ProviderConfig::isolated());
    let err = provider.dial("tcp", "svcA").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownNetwork);

    provider.map_network("tcp", "memu");
    let _listener = provider.listen("tcp", "svcA").await.unwrap();
    let _client = provider.dial("tcp", "svcA").await.unwrap();
}

#[tokio::test]
async fn test_unsupported_network_is_unknown() {
    let provider = Provider::new();
    let err = provider.listen("udp", "127.0.0.1:0").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownNetwork);
}

#[tokio::test]
async fn test_real_tcp_through_provider() {
    let provider = Provider::new();
    let listener = provider.listen("tcp", "127.0.0.1:0").await.unwrap();
    let addr = listener.addr().unwrap();
    assert_eq!(addr.network(), "tcp");
    assert!(listener.as_memory().is_none());

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        buf
    });

    let mut client = provider.dial("tcp", addr.name()).await.unwrap();
    client.write_all(b"real").await.unwrap();
    assert_eq!(&server.await.unwrap(), b"real");
}
