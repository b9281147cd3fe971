//! Connection-level tests over an in-memory duplex transport.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use kiln_http::config::HttpConfig;
use kiln_http::connection::HttpConnection;
use kiln_http::handler::{make_handler, Handler};
use kiln_http::protocol::ParseError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn hello_handler() -> impl Handler<RespBody = Full<Bytes>, Error = Infallible> {
    make_handler(|_req| async move { Ok(Response::new(Full::new(Bytes::from_static(b"hi")))) })
}

fn echo_path_handler() -> impl Handler<RespBody = Full<Bytes>, Error = Infallible> {
    make_handler(|req: http::Request<kiln_http::protocol::body::ReqBody>| async move {
        let path = req.uri().path().to_string();
        Ok(Response::new(Full::new(Bytes::from(path))))
    })
}

fn echo_body_handler() -> impl Handler<RespBody = Full<Bytes>, Error = ParseError> {
    make_handler(|req: http::Request<kiln_http::protocol::body::ReqBody>| async move {
        let body = req.into_body().buffer(1 << 20).await?;
        Ok(Response::new(Full::new(body)))
    })
}

/// Feeds `input`, half-closes the client side, and returns everything the
/// server wrote until it closed the connection.
async fn exchange<H>(handler: H, input: &[u8]) -> Vec<u8>
where
    H: Handler + 'static,
    H::Error: Send,
    H::RespBody: http_body::Body<Data = Bytes> + Unpin + Send,
    <H::RespBody as http_body::Body>::Error: std::fmt::Display + Send,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);

    let connection = HttpConnection::new(Arc::new(HttpConfig::default()), server_read, server_write);
    let task = tokio::spawn(connection.process(Arc::new(handler)));

    let (mut client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(input).await.unwrap();
    client_write.shutdown().await.unwrap();

    let mut output = Vec::new();
    client_read.read_to_end(&mut output).await.unwrap();
    let _ = task.await.unwrap();
    output
}

fn text(output: &[u8]) -> &str {
    std::str::from_utf8(output).unwrap()
}

#[tokio::test]
async fn simple_get() {
    let output = exchange(hello_handler(), b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let wire = text(&output);

    assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"), "got: {wire}");
    assert!(wire.contains("content-length: 2\r\n"));
    assert!(wire.contains("date: "));
    assert!(wire.ends_with("\r\n\r\nhi"));
}

#[tokio::test]
async fn pipelined_requests_answered_in_order() {
    let input = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n";
    let output = exchange(echo_path_handler(), input).await;
    let wire = text(&output);

    let first = wire.find("\r\n\r\n/a").expect("first response body");
    let second = wire.find("\r\n\r\n/b").expect("second response body");
    assert!(first < second);
    assert_eq!(wire.matches("HTTP/1.1 200 OK\r\n").count(), 2);
}

#[tokio::test]
async fn chunked_upload_is_reassembled() {
    let input =
        b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
    let output = exchange(echo_body_handler(), input).await;
    let wire = text(&output);

    assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(wire.contains("content-length: 11\r\n"));
    assert!(wire.ends_with("\r\n\r\nhello world"));
}

#[tokio::test]
async fn content_length_upload_is_buffered() {
    let input = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
    let output = exchange(echo_body_handler(), input).await;
    let wire = text(&output);
    assert!(wire.ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn oversized_request_target_is_414() {
    let path = format!("/{}", "a".repeat(2048));
    let input = format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n");
    let output = exchange(hello_handler(), input.as_bytes()).await;
    let wire = text(&output);

    assert!(wire.starts_with("HTTP/1.1 414 URI Too Long\r\n"), "got: {wire}");
    assert!(wire.contains("connection: close\r\n"));
    assert!(wire.contains("<h1>414 URI Too Long</h1>"));
}

#[tokio::test]
async fn malformed_request_is_400() {
    let output = exchange(hello_handler(), b"NOT A REQUEST\r\n\r\n").await;
    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {wire}");
}

#[tokio::test]
async fn unknown_transfer_coding_is_501() {
    let input = b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: gzip\r\n\r\n";
    let output = exchange(hello_handler(), input).await;
    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.1 501 Not Implemented\r\n"), "got: {wire}");
}

#[tokio::test]
async fn connection_close_is_honored_on_http11() {
    let input = b"GET /a HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n";
    let output = exchange(echo_path_handler(), input).await;
    let wire = text(&output);

    // only the first request is answered, with an explicit close
    assert_eq!(wire.matches("HTTP/1.1 200 OK\r\n").count(), 1);
    assert!(wire.contains("connection: close\r\n"));
    assert!(wire.contains("\r\n\r\n/a"));
    assert!(!wire.contains("/b"));
}

#[tokio::test]
async fn http10_defaults_to_close() {
    let output = exchange(hello_handler(), b"GET / HTTP/1.0\r\n\r\n").await;
    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.0 200 OK\r\n"), "got: {wire}");
    assert!(wire.contains("connection: close\r\n"));
}

#[tokio::test]
async fn http10_keep_alive_stays_open() {
    let input = b"GET /a HTTP/1.0\r\nConnection: keep-alive\r\n\r\nGET /b HTTP/1.0\r\nConnection: keep-alive\r\n\r\n";
    let output = exchange(echo_path_handler(), input).await;
    let wire = text(&output);

    assert_eq!(wire.matches("HTTP/1.0 200 OK\r\n").count(), 2);
    assert!(wire.contains("connection: keep-alive\r\n"));
    assert!(wire.contains("\r\n\r\n/a"));
    assert!(wire.contains("\r\n\r\n/b"));
}

#[tokio::test]
async fn head_response_has_headers_but_no_body() {
    let output = exchange(hello_handler(), b"HEAD /hello HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let wire = text(&output);

    assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(wire.contains("content-length: 2\r\n"));
    assert!(wire.ends_with("\r\n\r\n"), "body must be suppressed, got: {wire}");
}

#[tokio::test]
async fn expect_100_continue_is_answered_before_the_body() {
    let input = b"POST /u HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\nhello";
    let output = exchange(echo_body_handler(), input).await;
    let wire = text(&output);

    let interim = wire.find("HTTP/1.1 100 Continue\r\n\r\n").expect("interim response");
    let final_response = wire.find("HTTP/1.1 200 OK\r\n").expect("final response");
    assert!(interim < final_response);
    assert!(wire.ends_with("\r\n\r\nhello"));
}

#[tokio::test(start_paused = true)]
async fn idle_connection_times_out_with_408() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);

    let connection = HttpConnection::new(Arc::new(HttpConfig::default()), server_read, server_write);
    let task = tokio::spawn(connection.process(Arc::new(hello_handler())));

    // keep the write half open: the server must close on its own
    let (mut client_read, _client_write) = tokio::io::split(client);
    let mut output = Vec::new();
    client_read.read_to_end(&mut output).await.unwrap();
    task.await.unwrap().unwrap();

    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.1 408 Request Timeout\r\n"), "got: {wire}");
    assert!(wire.contains("connection: close\r\n"));
}

#[tokio::test]
async fn eof_inside_a_request_is_400() {
    let input = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\nabc";
    let output = exchange(echo_body_handler(), input).await;
    let wire = text(&output);
    assert!(wire.contains("HTTP/1.1 400 Bad Request\r\n"), "got: {wire}");
}

#[tokio::test]
async fn body_at_exactly_the_limit_is_served() {
    let mut config = HttpConfig::default();
    config.max_content_length = 5;

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let connection = HttpConnection::new(Arc::new(config), server_read, server_write);
    let task = tokio::spawn(connection.process(Arc::new(echo_body_handler())));

    let (mut client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello").await.unwrap();
    client_write.shutdown().await.unwrap();

    let mut output = Vec::new();
    client_read.read_to_end(&mut output).await.unwrap();
    let _ = task.await.unwrap();

    assert!(text(&output).ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn body_one_byte_over_the_limit_is_413() {
    let mut config = HttpConfig::default();
    config.max_content_length = 5;

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let connection = HttpConnection::new(Arc::new(config), server_read, server_write);
    let task = tokio::spawn(connection.process(Arc::new(echo_body_handler())));

    let (mut client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 6\r\n\r\nhello!").await.unwrap();
    client_write.shutdown().await.unwrap();

    let mut output = Vec::new();
    client_read.read_to_end(&mut output).await.unwrap();
    let _ = task.await;

    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "got: {wire}");
}

#[tokio::test]
async fn handler_error_becomes_500() {
    let handler = make_handler(|_req| async move {
        Err::<Response<Full<Bytes>>, ParseError>(ParseError::invalid_body("boom"))
    });
    let output = exchange(handler, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let wire = text(&output);
    assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "got: {wire}");
}
