//! Chat-provider seam.
//!
//! The provider SDK glue is a thin collaborator: it turns provider
//! events into [`MsgRequest`]s and posts reply content back to the
//! originating channel. The dispatch core never sees provider types.

use async_trait::async_trait;

use shunt_fabric::msg::{MsgRequest, MsgResponse};

use crate::error::EndpointError;

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// The next user message, or `None` when the provider stream ends.
    async fn next_event(&mut self) -> Result<Option<MsgRequest>, EndpointError>;

    /// Post `reply.reply_content()` back to the originating chat.
    async fn send_reply(
        &self,
        request: &MsgRequest,
        reply: &MsgResponse,
    ) -> Result<(), EndpointError>;
}
