use super::protocol::{HttpProtocolError, HttpStream};
use super::response::Response;
use crate::security::RequestLimits;
use http::{Method, StatusCode, Version};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

fn addrs() -> (SocketAddr, SocketAddr) {
    (
        "192.0.2.10:52000".parse().unwrap(),
        "127.0.0.1:8080".parse().unwrap(),
    )
}

/// Server-side stream fed with `input`, the client half closed for writing
async fn stream_with(input: &[u8]) -> (HttpStream<DuplexStream>, DuplexStream) {
    let (mut client, server) = duplex(64 * 1024);
    client.write_all(input).await.unwrap();
    client.shutdown().await.unwrap();
    let (peer, local) = addrs();
    (HttpStream::new(server, peer, local), client)
}

#[tokio::test]
async fn test_read_simple_get() {
    let (mut stream, _client) =
        stream_with(b"GET /get?a=1&a=2 HTTP/1.1\r\nHost: localhost\r\nX-Test: yes\r\n\r\n").await;

    let request = stream
        .read_request(&RequestLimits::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(request.method(), Method::GET);
    assert_eq!(request.path(), "/get");
    assert_eq!(request.query(), Some("a=1&a=2"));
    assert_eq!(request.version(), Version::HTTP_11);
    assert_eq!(request.header("x-test"), Some("yes"));
    assert_eq!(request.peer_addr(), addrs().0);
    assert!(request.body().is_empty());

    // Clean close between requests
    assert!(
        stream
            .read_request(&RequestLimits::default())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_read_sized_body_and_pipelining() {
    let (mut stream, _client) = stream_with(
        b"POST /post HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello\
GET /get HTTP/1.1\r\nHost: x\r\n\r\n",
    )
    .await;
    let limits = RequestLimits::default();

    let first = stream.read_request(&limits).await.unwrap().unwrap();
    assert_eq!(first.method(), Method::POST);
    assert_eq!(&first.body()[..], b"hello");

    let second = stream.read_request(&limits).await.unwrap().unwrap();
    assert_eq!(second.path(), "/get");
}

#[tokio::test]
async fn test_read_chunked_body() {
    let (mut stream, _client) = stream_with(
        b"POST /post HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n\
5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n",
    )
    .await;

    let request = stream
        .read_request(&RequestLimits::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&request.body()[..], b"hello world");
}

#[tokio::test]
async fn test_body_too_large() {
    let (mut stream, _client) =
        stream_with(b"POST /post HTTP/1.1\r\nContent-Length: 100\r\n\r\n").await;
    let limits = RequestLimits {
        max_body_size: 10,
        ..Default::default()
    };

    let err = stream.read_request(&limits).await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::BodyTooLarge(_)));
    assert_eq!(
        err.to_response().unwrap().status(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
}

#[tokio::test]
async fn test_chunked_body_too_large() {
    let (mut stream, _client) = stream_with(
        b"POST /post HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n8\r\n12345678\r\n8\r\n12345678\r\n0\r\n\r\n",
    )
    .await;
    let limits = RequestLimits {
        max_body_size: 10,
        ..Default::default()
    };

    assert!(matches!(
        stream.read_request(&limits).await,
        Err(HttpProtocolError::BodyTooLarge(_))
    ));
}

#[tokio::test]
async fn test_head_too_large() {
    let mut input = b"GET /get HTTP/1.1\r\nX-Big: ".to_vec();
    input.extend(std::iter::repeat_n(b'a', 2048));
    let (mut stream, _client) = stream_with(&input).await;
    let limits = RequestLimits {
        max_head_size: 1024,
        ..Default::default()
    };

    let err = stream.read_request(&limits).await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::HeadTooLarge { max: 1024 }));
    assert_eq!(
        err.to_response().unwrap().status(),
        StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
    );
}

#[tokio::test]
async fn test_malformed_request_line() {
    let (mut stream, _client) = stream_with(b"NOT A REQUEST\r\n\r\n").await;

    let err = stream
        .read_request(&RequestLimits::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_response().unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_truncated_body_is_incomplete() {
    let (mut stream, _client) =
        stream_with(b"POST /post HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await;

    let err = stream
        .read_request(&RequestLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpProtocolError::IncompleteRequest));
    assert!(err.to_response().is_none());
}

#[tokio::test]
async fn test_expect_continue() {
    let mock = tokio_test::io::Builder::new()
        .read(b"PUT /put HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\n")
        .write(b"HTTP/1.1 100 Continue\r\n\r\n")
        .read(b"abc")
        .build();
    let (peer, local) = addrs();
    let mut stream = HttpStream::new(mock, peer, local);

    let request = stream
        .read_request(&RequestLimits::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&request.body()[..], b"abc");
}

#[tokio::test]
async fn test_write_response() {
    let (mut client, server) = duplex(64 * 1024);
    let (peer, local) = addrs();
    let mut stream = HttpStream::new(server, peer, local);

    let response = Response::error(StatusCode::BAD_REQUEST, "bad");
    stream
        .write_response(&response, Version::HTTP_11, false, false)
        .await
        .unwrap();
    drop(stream);

    let mut written = String::new();
    client.read_to_string(&mut written).await.unwrap();
    assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(written.ends_with("{\"error\":\"bad\"}"));
}
