#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use httpmeter_core::labels::{ServerActiveLabels, ServerTotalLabels};
use httpmeter_middleware::obs::HttpMetrics;
use httpmeter_middleware::server::{Handler, ServerInstrumentation};

mod fixtures;
use fixtures::*;

const PER_ROUTE: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_series_apart() {
    let m = Arc::new(HttpMetrics::default());
    let inst = ServerInstrumentation::new(Arc::clone(&m));

    let routes: Vec<(&'static str, Method, &'static str, Arc<dyn Handler>)> = vec![
        (
            "ok",
            Method::GET,
            "200",
            Arc::new(inst.instrument("ok", [Method::GET], Replies(StatusCode::OK))),
        ),
        (
            "created",
            Method::POST,
            "201",
            Arc::new(inst.instrument("created", [Method::POST], Replies(StatusCode::CREATED))),
        ),
        (
            "missing",
            Method::GET,
            "404",
            Arc::new(inst.instrument("missing", [Method::GET], Replies(StatusCode::NOT_FOUND))),
        ),
        (
            "boom",
            Method::DELETE,
            "500",
            Arc::new(inst.instrument("boom", [Method::DELETE], Panics)),
        ),
    ];

    let mut tasks = Vec::new();
    for _ in 0..PER_ROUTE {
        for (endpoint, method, _, h) in &routes {
            let h = Arc::clone(h);
            let method = method.clone();
            let endpoint = *endpoint;
            tasks.push(tokio::spawn(async move {
                call(&h, endpoint, request(method, "/", b"")).await;
            }));
        }
    }
    for t in tasks {
        t.await.unwrap();
    }

    for (endpoint, method, code, _) in &routes {
        let method = method.as_str();
        let success = code.starts_with('2');
        let got = m.server_requests_total.get(
            &ServerTotalLabels { method, success, code, endpoint }.pairs(),
        );
        assert_eq!(got, PER_ROUTE as u64, "{endpoint}");
        assert_eq!(
            m.server_active_requests
                .get(&ServerActiveLabels { method, endpoint }.pairs()),
            0,
            "{endpoint}"
        );
    }
    assert_eq!(
        m.panic_recover_total.get(&[("http_method", "DELETE")]),
        PER_ROUTE as u64
    );
}
