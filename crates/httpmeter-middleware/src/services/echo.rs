use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use httpmeter_core::HandlerError;

use crate::server::Handler;
use crate::transport::{write_json, InboundRequest, RequestContext, ResponseWriter};

/// Replies to `{"input": ...}` with `{"message": "Input: \"...\""}`.
#[derive(Default)]
pub struct EchoService;

impl EchoService {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct EchoReq {
    input: String,
}

#[derive(Debug, Serialize)]
struct EchoResp {
    message: String,
}

#[async_trait]
impl Handler for EchoService {
    async fn process(
        &self,
        _ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        let body: EchoReq = serde_json::from_reader(req.body_mut())
            .map_err(|e| HandlerError::BadRequest(format!("echo: invalid body: {e}")))?;

        let resp = EchoResp { message: format!("Input: {:?}", body.input) };
        write_json(w, StatusCode::OK, &resp)
    }
}
