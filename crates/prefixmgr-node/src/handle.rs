//! Client handle for a running [`crate::PrefixManagerNode`].
//!
//! Every call is a message to the executor. Commands and queries share one
//! queue, so a query sent after a command always observes its effect.

use tokio::sync::{mpsc, oneshot};

use prefixmgr_core::{AreaId, PrefixEntry, RibUpdate, SourceType};
use prefixmgr_engine::{
    AdvertisedRouteDetail, AdvertisedRouteFilter, OriginatedRouteView, PrefixEvent, RouteStage,
};

use crate::error::NodeError;
use crate::node::{Query, Request};

#[derive(Debug, Clone)]
pub struct PrefixManagerHandle {
    api_tx: mpsc::Sender<Request>,
    rib_tx: mpsc::Sender<RibUpdate>,
}

impl PrefixManagerHandle {
    pub(crate) fn new(api_tx: mpsc::Sender<Request>, rib_tx: mpsc::Sender<RibUpdate>) -> Self {
        Self { api_tx, rib_tx }
    }

    /// Whether the executor has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.api_tx.is_closed()
    }

    // -- Prefix commands --

    /// Apply a prefix event and wait for the result. `Ok(true)` means the
    /// store changed.
    pub async fn send_event(&self, event: PrefixEvent) -> Result<bool, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.api_tx
            .send(Request::Prefix {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| NodeError::ChannelClosed)?;
        let changed = rx.await.map_err(|_| NodeError::ChannelClosed)??;
        Ok(changed)
    }

    /// Queue a prefix event without waiting for the outcome.
    pub async fn post_event(&self, event: PrefixEvent) -> Result<(), NodeError> {
        self.api_tx
            .send(Request::Prefix { event, reply: None })
            .await
            .map_err(|_| NodeError::ChannelClosed)
    }

    pub async fn advertise(&self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, NodeError> {
        self.send_event(PrefixEvent::add(source_type, entries)).await
    }

    pub async fn withdraw(&self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, NodeError> {
        self.send_event(PrefixEvent::withdraw(source_type, entries)).await
    }

    pub async fn withdraw_by_type(&self, source_type: SourceType) -> Result<bool, NodeError> {
        self.send_event(PrefixEvent::withdraw_by_type(source_type)).await
    }

    pub async fn sync_by_type(&self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, NodeError> {
        self.send_event(PrefixEvent::sync_by_type(source_type, entries)).await
    }

    // -- RIB input --

    pub async fn rib_update(&self, update: RibUpdate) -> Result<(), NodeError> {
        self.rib_tx
            .send(update)
            .await
            .map_err(|_| NodeError::ChannelClosed)
    }

    // -- Queries --

    async fn query<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Query) -> Result<T, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.api_tx
            .send(Request::Query(build(reply)))
            .await
            .map_err(|_| NodeError::ChannelClosed)?;
        rx.await.map_err(|_| NodeError::ChannelClosed)
    }

    pub async fn get_prefixes(&self) -> Result<Vec<PrefixEntry>, NodeError> {
        self.query(|reply| Query::Prefixes {
            source_type: None,
            reply,
        })
        .await
    }

    pub async fn get_prefixes_by_type(&self, source_type: SourceType) -> Result<Vec<PrefixEntry>, NodeError> {
        self.query(|reply| Query::Prefixes {
            source_type: Some(source_type),
            reply,
        })
        .await
    }

    pub async fn get_advertised_routes_filtered(
        &self,
        filter: AdvertisedRouteFilter,
    ) -> Result<Vec<AdvertisedRouteDetail>, NodeError> {
        self.query(|reply| Query::AdvertisedRoutes { filter, reply }).await
    }

    pub async fn get_area_advertised_routes(
        &self,
        area: AreaId,
        stage: RouteStage,
        filter: AdvertisedRouteFilter,
    ) -> Result<Vec<PrefixEntry>, NodeError> {
        self.query(|reply| Query::AreaAdvertisedRoutes {
            area,
            stage,
            filter,
            reply,
        })
        .await
    }

    pub async fn get_originated_prefixes(&self) -> Result<Vec<OriginatedRouteView>, NodeError> {
        self.query(|reply| Query::OriginatedPrefixes { reply }).await
    }
}
