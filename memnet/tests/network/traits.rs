//! Tests for provider-generic code.

use memnet::{
    Address, ErrorKind, NetError, NetworkListener, NetworkProvider, Provider,
    TokioNetworkProvider,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Echo one message through `provider`, returning the peer the server saw.
async fn echo_once<P: NetworkProvider + 'static>(provider: P, addr: &str) -> Address {
    let listener = provider.bind(addr).await.unwrap();
    let bound = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, peer) = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(&buf).await.unwrap();
        peer
    });

    let mut client = provider.connect(bound.name()).await.unwrap();
    client.write_all(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");

    server.await.unwrap()
}

#[tokio::test]
async fn test_echo_on_memory_provider() {
    let provider = Provider::new();
    let network = provider.network_provider("memu");
    assert_eq!(network.network(), "memu");

    let peer = echo_once(network, "echo").await;
    assert_eq!(peer, Address::new("1"));
}

#[tokio::test]
async fn test_echo_on_tokio_provider() {
    let peer = echo_once(TokioNetworkProvider::new(), "127.0.0.1:0").await;
    assert_eq!(peer.network(), "tcp");
    assert!(peer.name().starts_with("127.0.0.1:"));
}

#[tokio::test]
async fn test_tokio_provider_family_filter() {
    let provider = TokioNetworkProvider::with_network("tcp6");
    let err = provider.bind("127.0.0.1:0").await.unwrap_err();
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<NetError>())
        .unwrap();
    assert_eq!(inner.kind(), ErrorKind::Io);
    assert_eq!(inner.network(), "tcp6");
}

#[tokio::test]
async fn test_trait_errors_carry_net_error() {
    let provider = Provider::new().network_provider("memu");
    let err = provider.connect("nobody").await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);

    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<NetError>())
        .unwrap();
    assert_eq!(inner.kind(), ErrorKind::UnknownAddress);
}
