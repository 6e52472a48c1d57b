//! End-to-end checks over real TCP connections.

use std::net::SocketAddr;

use greenlight::middleware::{self, Pipeline};
use greenlight::{health, serve_with_shutdown, BoxedHandler, Request, Response, Router, Server};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn always_panics(_req: Request) -> Response {
    panic!("something went wrong")
}

async fn echo(req: Request) -> Response {
    Response::json(req.body().to_vec())
}

fn app() -> BoxedHandler {
    let router = Router::new()
        .get("/test", always_panics)
        .post("/echo", echo)
        .get("/v1/healthcheck", health::healthcheck("development", "0.1.0"));
    Pipeline::new()
        .layer(middleware::recover_panic)
        .wrap(router.into_handler())
}

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), greenlight::Error>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_with_shutdown(listener, app(), async {
            let _ = rx.await;
        }));

        Self { addr, shutdown, handle }
    }

    /// Like [`TestServer::start`], with request bodies capped at `limit` bytes.
    async fn start_with_body_limit(limit: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();
        let server = Server::bind(&addr.to_string()).unwrap().max_body_bytes(limit);
        let handle = tokio::spawn(server.serve_on(listener, app(), async {
            let _ = rx.await;
        }));

        Self { addr, shutdown, handle }
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

/// Sends one raw HTTP/1.1 request and reads until the server closes the
/// connection.
async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

fn split(response: &str) -> (&str, &str) {
    response.split_once("\r\n\r\n").expect("response has a header block")
}

#[tokio::test]
async fn panic_is_answered_and_connection_closed() {
    let server = TestServer::start().await;

    // No `connection: close` from the client: the server must close on its own.
    let response = roundtrip(server.addr, "GET /test HTTP/1.1\r\nhost: localhost\r\n\r\n").await;

    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 500 Internal Server Error"), "{head}");
    assert!(head.to_ascii_lowercase().contains("connection: close"), "{head}");
    let body: Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(
        body,
        json!({"error": "the server encountered a problem and could not process your request"})
    );

    server.stop().await;
}

#[tokio::test]
async fn server_keeps_serving_after_a_panic() {
    let server = TestServer::start().await;

    for _ in 0..3 {
        let failed = roundtrip(server.addr, "GET /test HTTP/1.1\r\nhost: localhost\r\n\r\n").await;
        assert!(failed.starts_with("HTTP/1.1 500"), "{failed}");

        let healthy = roundtrip(
            server.addr,
            "GET /v1/healthcheck HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        let (head, body) = split(&healthy);
        assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["status"], "available");
    }

    server.stop().await;
}

#[tokio::test]
async fn request_body_reaches_handler() {
    let server = TestServer::start().await;

    let response = roundtrip(
        server.addr,
        "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 13\r\nconnection: close\r\n\r\n{\"title\":\"x\"}",
    )
    .await;

    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert_eq!(body, r#"{"title":"x"}"#);

    server.stop().await;
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let server = TestServer::start().await;

    let response = roundtrip(
        server.addr,
        "GET /v1/nothing HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
    )
    .await;

    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 404 Not Found"), "{head}");
    let body: Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(body, json!({"error": "the requested resource could not be found"}));

    server.stop().await;
}

#[tokio::test]
async fn malformed_body_is_400() {
    let server = TestServer::start().await;

    // `ZZ` is not a hex chunk size, so reading the body fails.
    let response = roundtrip(
        server.addr,
        "POST /echo HTTP/1.1\r\nhost: localhost\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\nZZ\r\nhello\r\n0\r\n\r\n",
    )
    .await;

    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");
    let body: Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(body, json!({"error": "the request body could not be read"}));

    server.stop().await;
}

#[tokio::test]
async fn oversized_body_is_413() {
    let server = TestServer::start_with_body_limit(16).await;

    let payload = "x".repeat(64);
    let response = roundtrip(
        server.addr,
        &format!(
            "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
            payload.len()
        ),
    )
    .await;

    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 413 Payload Too Large"), "{head}");
    let body: Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(body, json!({"error": "the request body must not be larger than 16 bytes"}));

    // A body within the cap still gets through.
    let response = roundtrip(
        server.addr,
        "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
    )
    .await;
    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert_eq!(body, "ok");

    server.stop().await;
}
