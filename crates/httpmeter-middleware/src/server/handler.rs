use std::sync::Arc;

use async_trait::async_trait;

use httpmeter_core::HandlerError;

use crate::transport::{InboundRequest, RequestContext, ResponseWriter};

/// Endpoint logic. Writes its response through `w` and returns an error for
/// the hosting adapter to map when it has nothing better to say.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn process(
        &self,
        ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn process(
        &self,
        ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        (**self).process(ctx, w, req).await
    }
}
