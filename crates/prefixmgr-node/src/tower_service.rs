//! Tower `Service` adapters for [`PrefixManagerHandle`].
//!
//! Lets prefix sources and RIB feeds be composed with tower middleware
//! (buffering, rate limiting, timeouts) in front of the executor.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;

use prefixmgr_core::RibUpdate;
use prefixmgr_engine::PrefixEvent;

use crate::error::NodeError;
use crate::handle::PrefixManagerHandle;

/// Wraps a handle as a `Service<PrefixEvent>`. Responds with whether the
/// prefix store changed.
#[derive(Clone)]
pub struct PrefixEventService {
    handle: PrefixManagerHandle,
}

impl PrefixEventService {
    pub fn new(handle: PrefixManagerHandle) -> Self {
        Self { handle }
    }
}

impl Service<PrefixEvent> for PrefixEventService {
    type Response = bool;
    type Error = NodeError;
    type Future = Pin<Box<dyn Future<Output = Result<bool, NodeError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.handle.is_closed() {
            Poll::Ready(Err(NodeError::ChannelClosed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, event: PrefixEvent) -> Self::Future {
        let handle = self.handle.clone();
        Box::pin(async move { handle.send_event(event).await })
    }
}

impl From<PrefixManagerHandle> for PrefixEventService {
    fn from(handle: PrefixManagerHandle) -> Self {
        Self::new(handle)
    }
}

/// Wraps a handle as a `Service<RibUpdate>`.
#[derive(Clone)]
pub struct RibUpdateService {
    handle: PrefixManagerHandle,
}

impl RibUpdateService {
    pub fn new(handle: PrefixManagerHandle) -> Self {
        Self { handle }
    }
}

impl Service<RibUpdate> for RibUpdateService {
    type Response = ();
    type Error = NodeError;
    type Future = Pin<Box<dyn Future<Output = Result<(), NodeError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.handle.is_closed() {
            Poll::Ready(Err(NodeError::ChannelClosed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, update: RibUpdate) -> Self::Future {
        let handle = self.handle.clone();
        Box::pin(async move { handle.rib_update(update).await })
    }
}

impl From<PrefixManagerHandle> for RibUpdateService {
    fn from(handle: PrefixManagerHandle) -> Self {
        Self::new(handle)
    }
}
