//! Serialize-then-reparse equivalence for messages that parse cleanly.

use bytes::BytesMut;
use http::{Method, Request, Response, StatusCode, Version};
use kiln_http::codec::{RequestDecoder, RequestEncoder, ResponseDecoder, ResponseEncoder};
use kiln_http::config::DecodeLimits;
use kiln_http::protocol::{Message, PayloadItem, PayloadSize};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn request_roundtrip_preserves_semantics() {
    let head = Request::builder()
        .method(Method::POST)
        .uri("/submit?a=1&b=two")
        .header("host", "example.com")
        .header("x-tag", "one")
        .header("x-tag", "two")
        .body(())
        .unwrap();

    let mut wire = BytesMut::new();
    let mut encoder = RequestEncoder::new();
    encoder.encode(Message::<_, bytes::Bytes>::Header((head, PayloadSize::Length(5))), &mut wire).unwrap();
    encoder
        .encode(Message::<(Request<()>, PayloadSize)>::Payload(PayloadItem::Chunk(bytes::Bytes::from_static(b"hello"))), &mut wire)
        .unwrap();
    encoder.encode(Message::<(Request<()>, PayloadSize)>::Payload(PayloadItem::Eof), &mut wire).unwrap();

    let mut decoder = RequestDecoder::new(DecodeLimits::default());
    let Message::Header((header, payload_size)) = decoder.decode(&mut wire).unwrap().unwrap() else {
        panic!("expected a head")
    };

    assert_eq!(header.method(), &Method::POST);
    assert_eq!(header.version(), Version::HTTP_11);
    assert_eq!(header.uri().path(), "/submit");
    assert_eq!(header.uri().query(), Some("a=1&b=two"));
    assert_eq!(payload_size, PayloadSize::Length(5));

    // duplicate names survive with order preserved
    let tags: Vec<_> = header.headers().get_all("x-tag").iter().collect();
    assert_eq!(tags, vec!["one", "two"]);
    assert_eq!(header.headers().get("host").unwrap(), "example.com");

    let mut body = Vec::new();
    loop {
        match decoder.decode(&mut wire).unwrap().unwrap().into_payload_item().unwrap() {
            PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
            PayloadItem::Eof => break,
        }
    }
    assert_eq!(body, b"hello");
    assert!(wire.is_empty());
}

#[test]
fn response_roundtrip_preserves_semantics() {
    let head = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .body(())
        .unwrap();

    let mut wire = BytesMut::new();
    let mut encoder = ResponseEncoder::new();
    encoder.encode(Message::<_, bytes::Bytes>::Header((head, PayloadSize::Length(2))), &mut wire).unwrap();
    encoder
        .encode(Message::<(Response<()>, PayloadSize)>::Payload(PayloadItem::Chunk(bytes::Bytes::from_static(b"hi"))), &mut wire)
        .unwrap();
    encoder.encode(Message::<(Response<()>, PayloadSize)>::Payload(PayloadItem::Eof), &mut wire).unwrap();

    let mut decoder = ResponseDecoder::new(DecodeLimits::default());
    let Message::Header((header, payload_size)) = decoder.decode(&mut wire).unwrap().unwrap() else {
        panic!("expected a head")
    };

    assert_eq!(header.status(), StatusCode::OK);
    assert_eq!(header.reason_phrase(), "OK");
    assert_eq!(header.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(payload_size, PayloadSize::Length(2));

    let chunk = decoder.decode(&mut wire).unwrap().unwrap().into_payload_item().unwrap();
    assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"hi");
    assert!(decoder.decode(&mut wire).unwrap().unwrap().into_payload_item().unwrap().is_eof());
    assert!(wire.is_empty());
}

#[test]
fn chunked_roundtrip() {
    let head = Response::builder().status(StatusCode::OK).body(()).unwrap();

    let mut wire = BytesMut::new();
    let mut encoder = ResponseEncoder::new();
    encoder.encode(Message::<_, bytes::Bytes>::Header((head, PayloadSize::Chunked)), &mut wire).unwrap();
    for piece in [&b"hello"[..], &b" "[..], &b"world"[..]] {
        encoder
            .encode(
                Message::<(Response<()>, PayloadSize)>::Payload(PayloadItem::Chunk(bytes::Bytes::copy_from_slice(piece))),
                &mut wire,
            )
            .unwrap();
    }
    encoder.encode(Message::<(Response<()>, PayloadSize)>::Payload(PayloadItem::Eof), &mut wire).unwrap();

    let mut decoder = ResponseDecoder::new(DecodeLimits::default());
    let Message::Header((_, payload_size)) = decoder.decode(&mut wire).unwrap().unwrap() else {
        panic!("expected a head")
    };
    assert!(payload_size.is_chunked());

    let mut body = Vec::new();
    loop {
        match decoder.decode(&mut wire).unwrap().unwrap().into_payload_item().unwrap() {
            PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
            PayloadItem::Eof => break,
        }
    }
    assert_eq!(body, b"hello world");
    assert!(wire.is_empty());
}
