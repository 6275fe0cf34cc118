use super::*;

use axum::Router;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws;
use axum::response::Response;
use axum::routing::any;

async fn echo_handler(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(|mut socket| async move {
        while let Some(Ok(message)) = socket.recv().await {
            if let ws::Message::Text(text) = message {
                if socket.send(ws::Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    })
}

async fn start_echo_server() -> String {
    let app = Router::new().route("/api/estimation/room/{id}/{role}", any(echo_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/api/estimation/room/r1/developer?name=ann")
}

#[test]
fn ws_url_maps_http_to_ws() {
    let url = ws_url("http://localhost:3000", "Test", "product-owner", "ABC").expect("url");
    assert_eq!(url, "ws://localhost:3000/api/estimation/room/Test/product-owner?name=ABC");
}

#[test]
fn ws_url_maps_https_to_wss() {
    let url = ws_url("https://example.com", "R1", "developer", "Ann").expect("url");
    assert_eq!(url, "wss://example.com/api/estimation/room/R1/developer?name=Ann");
}

#[test]
fn ws_url_trims_trailing_slash() {
    let url = ws_url("http://localhost:3000/", "R1", "developer", "Ann").expect("url");
    assert_eq!(url, "ws://localhost:3000/api/estimation/room/R1/developer?name=Ann");
}

#[test]
fn ws_url_rejects_unknown_scheme() {
    let err = ws_url("ftp://example.com", "R1", "developer", "Ann").expect_err("scheme");
    assert!(matches!(err, TransportError::InvalidBaseUrl(url) if url == "ftp://example.com"));
}

#[tokio::test]
async fn open_resolves_only_after_handshake_and_round_trips_text() {
    let url = start_echo_server().await;
    let connection = Connection::open(&url).await.expect("connect");
    let (mut writer, mut reader) = connection.split();

    writer.send_text("{\"type\":\"skip\"}".to_owned()).await.expect("send");
    let echoed = reader.next_text().await.expect("frame").expect("text");
    assert_eq!(echoed, "{\"type\":\"skip\"}");
}

#[tokio::test]
async fn open_fails_against_closed_port() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let url = format!("ws://{addr}/api/estimation/room/r1/developer?name=ann");
    let err = Connection::open(&url).await.expect_err("handshake should fail");
    assert!(matches!(err, TransportError::Connect(_)));
}

#[tokio::test]
async fn close_is_idempotent() {
    let url = start_echo_server().await;
    let connection = Connection::open(&url).await.expect("connect");
    let (mut writer, mut reader) = connection.split();

    writer.close().await;
    writer.close().await;
    assert!(reader.next_text().await.is_none());
}
