#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, Method, StatusCode};

use httpmeter_core::labels::{PanicLabels, ServerActiveLabels, ServerLabels, ServerTotalLabels};
use httpmeter_core::HandlerError;
use httpmeter_middleware::obs::HttpMetrics;
use httpmeter_middleware::server::ServerInstrumentation;
use httpmeter_middleware::transport::BufferedResponse;

mod fixtures;
use fixtures::*;

fn setup() -> (Arc<HttpMetrics>, ServerInstrumentation) {
    let metrics = Arc::new(HttpMetrics::default());
    (Arc::clone(&metrics), ServerInstrumentation::new(metrics))
}

fn active(m: &HttpMetrics, method: &str, endpoint: &str) -> i64 {
    m.server_active_requests
        .get(&ServerActiveLabels { method, endpoint }.pairs())
}

fn total(m: &HttpMetrics, method: &str, success: bool, code: &str, endpoint: &str) -> u64 {
    m.server_requests_total.get(
        &ServerTotalLabels { method, success, code, endpoint }.pairs(),
    )
}

#[tokio::test]
async fn get_without_output_counts_as_200() {
    let (m, inst) = setup();
    let h = inst.instrument("test", [Method::GET], Noop);

    let (out, res) = call(&h, "test", request(Method::GET, "/test", b"")).await;
    assert!(res.is_ok());
    assert_eq!(out.status(), None);

    let labels = ServerLabels { method: "GET", success: true, endpoint: "test" }.pairs();
    assert_eq!(m.server_latency.sample_count(&labels), 1);
    assert_eq!(m.server_request_size.sample_sum(&labels), 0.0);
    assert_eq!(m.server_response_size.sample_sum(&labels), 0.0);
    assert_eq!(total(&m, "GET", true, "200", "test"), 1);
    assert_eq!(active(&m, "GET", "test"), 0);

    // nothing was written, so no timing samples
    assert_eq!(m.server_time_to_write_header.sample_count(&labels), 0);
    assert_eq!(m.server_time_to_first_byte.sample_count(&labels), 0);
}

#[tokio::test]
async fn unauthorized_post_records_sizes() {
    let (m, inst) = setup();
    let h = inst.instrument("error2", [Method::POST], Unauthorized);
    let body = example_body();
    assert_eq!(body.len(), 16);

    let (out, res) = call(&h, "error2", request(Method::POST, "/error2", &body)).await;
    assert!(res.is_ok());
    assert_eq!(out.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(out.body().len(), 29);

    let labels = ServerLabels { method: "POST", success: false, endpoint: "error2" }.pairs();
    assert_eq!(m.server_request_size.sample_sum(&labels), 16.0);
    assert_eq!(m.server_response_size.sample_sum(&labels), 29.0);
    assert_eq!(m.server_time_to_write_header.sample_count(&labels), 1);
    assert_eq!(m.server_time_to_first_byte.sample_count(&labels), 1);
    assert_eq!(total(&m, "POST", false, "401", "error2"), 1);
    assert_eq!(active(&m, "POST", "error2"), 0);
}

#[tokio::test]
async fn unread_body_counts_as_zero() {
    let (m, inst) = setup();
    let h = inst.instrument("test", [Method::POST], Noop);

    call(&h, "test", request(Method::POST, "/test", b"ignored body")).await;

    let labels = ServerLabels { method: "POST", success: true, endpoint: "test" }.pairs();
    assert_eq!(m.server_request_size.sample_count(&labels), 1);
    assert_eq!(m.server_request_size.sample_sum(&labels), 0.0);
}

#[tokio::test]
async fn plain_error_defaults_to_500() {
    let (m, inst) = setup();
    let h = inst.instrument("error", [Method::GET], Fails);

    let (out, res) = call(&h, "error", request(Method::GET, "/error", b"")).await;
    assert!(matches!(res, Err(HandlerError::Internal(_))));
    // mapping the error to a response is the caller's job
    assert_eq!(out.status(), None);

    assert_eq!(total(&m, "GET", false, "500", "error"), 1);
    assert_eq!(total(&m, "GET", false, "200", "error"), 0);
    assert_eq!(active(&m, "GET", "error"), 0);
}

#[tokio::test]
async fn panic_is_recovered_and_counted_once() {
    let (m, inst) = setup();
    let h = inst.instrument("boom", [Method::GET], Panics);

    let (out, res) = call(&h, "boom", request(Method::GET, "/boom", b"")).await;
    match res {
        Err(HandlerError::Recovered(msg)) => assert_eq!(msg, "boom"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(out.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    assert_eq!(m.panic_recover_total.get(&PanicLabels { method: "GET" }.pairs()), 1);
    assert_eq!(total(&m, "GET", false, "500", "boom"), 1);
    assert_eq!(active(&m, "GET", "boom"), 0);

    // still serving afterwards
    call(&h, "boom", request(Method::GET, "/boom", b"")).await;
    assert_eq!(m.panic_recover_total.get(&PanicLabels { method: "GET" }.pairs()), 2);
    assert_eq!(active(&m, "GET", "boom"), 0);
}

#[tokio::test]
async fn panic_after_commit_keeps_written_status() {
    let (m, inst) = setup();
    let h = inst.instrument("late", [Method::GET], PanicsAfterWrite);

    let (out, res) = call(&h, "late", request(Method::GET, "/late", b"")).await;
    assert!(res.unwrap_err().is_recovered());
    assert_eq!(out.status(), Some(StatusCode::CREATED));
    assert_eq!(out.body(), b"part");

    let labels = ServerLabels { method: "GET", success: false, endpoint: "late" }.pairs();
    assert_eq!(m.server_response_size.sample_sum(&labels), 4.0);
    assert_eq!(total(&m, "GET", false, "201", "late"), 1);
}

#[tokio::test]
async fn disallowed_method_gets_405() {
    let (m, inst) = setup();
    let h = inst.instrument("test", [Method::GET, Method::HEAD], Noop);

    let (out, res) = call(&h, "test", request(Method::PUT, "/test", b"")).await;
    assert!(matches!(res, Err(HandlerError::MethodNotAllowed(_))));
    assert_eq!(out.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
    assert_eq!(out.headers()[header::ALLOW], "GET, HEAD");

    assert_eq!(total(&m, "PUT", false, "405", "test"), 1);
    assert_eq!(active(&m, "PUT", "test"), 0);
}

#[tokio::test]
async fn streamed_body_is_timed_and_sized() {
    let (m, inst) = setup();
    let h = inst.instrument("stream", [Method::GET], Streams);

    let (out, _) = call(&h, "stream", request(Method::GET, "/stream", b"")).await;
    assert_eq!(out.body(), b"helloworld");

    let labels = ServerLabels { method: "GET", success: true, endpoint: "stream" }.pairs();
    assert_eq!(m.server_response_size.sample_sum(&labels), 10.0);
    assert_eq!(m.server_time_to_write_header.sample_count(&labels), 1);
    assert_eq!(m.server_time_to_first_byte.sample_count(&labels), 1);
    assert!(
        m.server_time_to_first_byte.sample_sum(&labels)
            >= m.server_time_to_write_header.sample_sum(&labels)
    );
}

#[tokio::test]
async fn gauge_is_held_while_handler_runs() {
    let (m, inst) = setup();
    let probe = Arc::new(Probe { metrics: Arc::clone(&m), seen: Mutex::new(None) });
    let h = inst.instrument("probe", [Method::GET], Arc::clone(&probe));

    call(&h, "probe", request(Method::GET, "/probe", b"")).await;

    assert_eq!(*probe.seen.lock().unwrap(), Some(1));
    assert_eq!(active(&m, "GET", "probe"), 0);
}

#[tokio::test]
async fn cancelled_request_still_emits_and_releases() {
    let (m, inst) = setup();
    let h = inst.instrument("hang", [Method::GET], Hangs);

    let elapsed = tokio::time::timeout(
        Duration::from_millis(20),
        call(&h, "hang", request(Method::GET, "/hang", b"")),
    )
    .await;
    assert!(elapsed.is_err());

    let labels = ServerLabels { method: "GET", success: false, endpoint: "hang" }.pairs();
    assert_eq!(m.server_latency.sample_count(&labels), 1);
    assert_eq!(total(&m, "GET", false, "499", "hang"), 1);
    assert_eq!(active(&m, "GET", "hang"), 0);
}

#[tokio::test]
async fn extension_methods_share_one_label() {
    let (m, inst) = setup();
    let h = inst.instrument("test", [Method::GET], Noop);
    let propfind = Method::from_bytes(b"PROPFIND").unwrap();

    call(&h, "test", request(propfind, "/test", b"")).await;
    assert_eq!(total(&m, "OTHER", false, "405", "test"), 1);
}

#[test]
fn rejected_request_is_recorded_without_running_handler() {
    let (m, inst) = setup();
    let h = inst.instrument("upload", [Method::POST], Panics);

    let mut out = BufferedResponse::new();
    let mut req = request(Method::POST, "/upload", b"");
    let err = h.reject(&mut out, &mut req, HandlerError::BadRequest("truncated body".into()));
    assert!(matches!(err, HandlerError::BadRequest(_)));

    assert_eq!(out.status(), Some(StatusCode::BAD_REQUEST));
    let body: serde_json::Value = serde_json::from_slice(out.body()).unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");

    let labels = ServerLabels { method: "POST", success: false, endpoint: "upload" }.pairs();
    assert_eq!(total(&m, "POST", false, "400", "upload"), 1);
    assert_eq!(m.server_latency.sample_count(&labels), 1);
    assert_eq!(m.server_response_size.sample_sum(&labels), out.body().len() as f64);
    assert_eq!(active(&m, "POST", "upload"), 0);
    assert_eq!(m.panic_recover_total.get(&PanicLabels { method: "POST" }.pairs()), 0);
}
