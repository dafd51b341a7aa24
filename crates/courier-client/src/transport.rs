use async_trait::async_trait;
use courier_core::{BatchEnvelope, RawResponse, RequestContext, RequestDescriptor};

use crate::TransportError;

/// Wire access used by the batcher.
///
/// `dispatch` answers with one item per envelope request; items are matched
/// back by their `index`. Errors fail every request in the call.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn dispatch(
        &self,
        envelope: &BatchEnvelope,
        context: &RequestContext,
    ) -> Result<RawResponse, TransportError>;

    async fn dispatch_single(
        &self,
        descriptor: &RequestDescriptor,
        context: &RequestContext,
    ) -> Result<RawResponse, TransportError>;
}
