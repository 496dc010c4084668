#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::Read;

use axum::http::{header, HeaderValue, Method, StatusCode};

use httpmeter_middleware::transport::{
    BufferedResponse, InboundRequest, MetricsResponseWriter, ResponseWriter,
};

#[test]
fn first_header_wins() {
    let mut w = MetricsResponseWriter::new(BufferedResponse::new());
    w.write_header(StatusCode::NOT_FOUND);
    let first = w.header_time();
    w.write_header(StatusCode::OK);

    assert_eq!(w.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(w.header_time(), first);
    assert_eq!(w.into_inner().status(), Some(StatusCode::NOT_FOUND));
}

#[test]
fn write_implies_200_and_first_byte() {
    let mut w = MetricsResponseWriter::new(BufferedResponse::new());
    assert_eq!(w.final_status(), StatusCode::OK);
    assert!(w.header_time().is_none());
    assert!(w.first_byte_time().is_none());

    w.write(b"abc").unwrap();
    let first_byte = w.first_byte_time();
    w.write(b"de").unwrap();

    assert_eq!(w.status(), Some(StatusCode::OK));
    assert!(w.header_time().is_some());
    assert!(first_byte.is_some());
    assert_eq!(w.first_byte_time(), first_byte);
    assert!(w.header_time() <= w.first_byte_time());
    assert_eq!(w.byte_count(), 5);
}

#[test]
fn empty_write_commits_without_first_byte() {
    let mut w = MetricsResponseWriter::new(BufferedResponse::new());
    w.write(b"").unwrap();

    assert!(w.is_committed());
    assert!(w.header_time().is_some());
    assert!(w.first_byte_time().is_none());
    assert_eq!(w.byte_count(), 0);
}

#[test]
fn headers_after_commit_are_dropped() {
    let mut w = BufferedResponse::new();
    w.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    w.write_header(StatusCode::ACCEPTED);
    w.insert_header(header::ETAG, HeaderValue::from_static("\"x\""));

    assert_eq!(w.headers().len(), 1);
    let res = w.into_response();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
}

#[test]
fn request_body_counts_consumption() {
    let mut req = InboundRequest::from_http(
        axum::http::Request::builder()
            .method(Method::POST)
            .uri("/x")
            .body(bytes::Bytes::from_static(b"0123456789"))
            .unwrap(),
    );
    assert_eq!(req.body().consumed(), 0);

    let mut buf = [0u8; 4];
    req.body_mut().read_exact(&mut buf).unwrap();
    assert_eq!(req.body().consumed(), 4);

    let rest = req.body_mut().read_all();
    assert_eq!(&rest[..], b"456789");
    assert_eq!(req.body().consumed(), 10);
    assert_eq!(req.body().len(), 10);
}
