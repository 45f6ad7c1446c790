use crate::common::spawn_test_server;
use crate::http::{ClientRequest, HttpClient};
use crate::server::{HttpServer, ServerConfig};
use http::{Method, StatusCode};
use std::time::Duration;

#[tokio::test]
async fn test_keep_alive_serves_multiple_requests() {
    let server = spawn_test_server(ServerConfig::default()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    for i in 0..3 {
        let response = client
            .send(&ClientRequest::get(format!("/get?i={i}")))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json().unwrap()["searchParams"]["i"], i.to_string());
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_header_and_head() {
    let server = spawn_test_server(ServerConfig::default()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let response = client
        .send(&ClientRequest::new(Method::HEAD, "/get"))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert!(response.header("content-length").is_some());
    assert!(response.header("server").unwrap().starts_with("echobin/"));

    // The connection is still usable after a bodiless response
    let response = client.send(&ClientRequest::get("/ip")).await.unwrap();
    assert_eq!(response.json().unwrap()["origin"], "127.0.0.1");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_declared_body_too_large() {
    let mut config = ServerConfig::default();
    config.limits.max_body_size = 16;
    let server = spawn_test_server(config).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let request = ClientRequest::new(Method::POST, "/post").header("content-length", "1024");
    let response = client.send(&request).await.unwrap();
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.header("connection"), Some("close"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_connection_limit_refuses_extra_clients() {
    let config = ServerConfig {
        max_connections: 1,
        ..Default::default()
    };
    let server = spawn_test_server(config).await.unwrap();

    let mut first = HttpClient::connect(server.addr).await.unwrap();
    let response = first.send(&ClientRequest::get("/get")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let mut second = HttpClient::connect(server.addr).await.unwrap();
    assert!(second.send(&ClientRequest::get("/get")).await.is_err());

    // The held connection keeps working
    let response = first.send(&ClientRequest::get("/headers")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_read_timeout_closes_idle_connection() {
    let config = ServerConfig {
        read_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let server = spawn_test_server(config).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.send(&ClientRequest::get("/get")).await.is_err());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_signal_stops_server() {
    let server = HttpServer::new(ServerConfig::default());
    let shutdown = crate::common::EchoServerTrait::shutdown_signal(&server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let handle = tokio::spawn(async move { server.serve(listener).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(result.unwrap().unwrap().is_ok());
}
