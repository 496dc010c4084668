use async_trait::async_trait;

use httpmeter_core::HandlerError;

use crate::server::Handler;
use crate::transport::{InboundRequest, RequestContext, ResponseWriter};

/// Empty `200 OK`; the status is implied by writing nothing.
#[derive(Default)]
pub struct OkService;

impl OkService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Handler for OkService {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}
