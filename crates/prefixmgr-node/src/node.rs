//! The single-writer executor.
//!
//! [`PrefixManagerNode`] owns the [`PrefixEngine`] and is the only task that
//! mutates it. Prefix commands, queries, RIB updates and flooding-store
//! notifications arrive on their own channels and are applied in arrival
//! order per channel. Publications go to a separate publisher task so a slow
//! store never stalls event processing.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use prefixmgr_core::key::PREFIX_KEY_MARKER;
use prefixmgr_core::{
    AreaId, CoreError, PrefixEntry, PrefixRecord, RibUpdate, SourceType, StaticRouteUpdate,
};
use prefixmgr_engine::{
    AdvertisedRouteDetail, AdvertisedRouteFilter, Debounce, OriginatedRouteView, PrefixEngine,
    PrefixEvent, Publication, RouteStage,
};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::flooding::{FloodingStore, StoreEvent};
use crate::handle::PrefixManagerHandle;

const API_QUEUE_DEPTH: usize = 1024;
const RIB_QUEUE_DEPTH: usize = 1024;

/// Read-only requests served from the executor.
#[derive(Debug)]
pub(crate) enum Query {
    Prefixes {
        source_type: Option<SourceType>,
        reply: oneshot::Sender<Vec<PrefixEntry>>,
    },
    AdvertisedRoutes {
        filter: AdvertisedRouteFilter,
        reply: oneshot::Sender<Vec<AdvertisedRouteDetail>>,
    },
    AreaAdvertisedRoutes {
        area: AreaId,
        stage: RouteStage,
        filter: AdvertisedRouteFilter,
        reply: oneshot::Sender<Vec<PrefixEntry>>,
    },
    OriginatedPrefixes {
        reply: oneshot::Sender<Vec<OriginatedRouteView>>,
    },
}

/// Requests from the command/query API, served in the order sent.
#[derive(Debug)]
pub(crate) enum Request {
    Prefix {
        event: PrefixEvent,
        reply: Option<oneshot::Sender<Result<bool, CoreError>>>,
    },
    Query(Query),
}

/// Cloneable handle that stops a running node.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// A receiver that changes once shutdown is requested.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Prefix manager runtime over a flooding store `S`.
pub struct PrefixManagerNode<S: FloodingStore> {
    config: NodeConfig,
    engine: PrefixEngine,
    store: Arc<S>,
    debounce: Debounce,
    api_tx: mpsc::Sender<Request>,
    api_rx: mpsc::Receiver<Request>,
    rib_tx: mpsc::Sender<RibUpdate>,
    rib_rx: mpsc::Receiver<RibUpdate>,
    store_rx: Option<mpsc::UnboundedReceiver<StoreEvent>>,
    publish_tx: mpsc::UnboundedSender<Publication>,
    publish_rx: Option<mpsc::UnboundedReceiver<Publication>>,
    route_tx: mpsc::UnboundedSender<StaticRouteUpdate>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    publisher: Option<JoinHandle<()>>,
}

impl<S: FloodingStore> PrefixManagerNode<S> {
    /// Create a node. The returned receiver carries static routes for the
    /// decision engine to program.
    pub fn new(config: NodeConfig, store: Arc<S>) -> (Self, mpsc::UnboundedReceiver<StaticRouteUpdate>) {
        let engine = PrefixEngine::new(config.engine_config());
        let debounce = Debounce::new(config.sync_throttle());

        let (api_tx, api_rx) = mpsc::channel(API_QUEUE_DEPTH);
        let (rib_tx, rib_rx) = mpsc::channel(RIB_QUEUE_DEPTH);
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        let (route_tx, route_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let node = Self {
            config,
            engine,
            store,
            debounce,
            api_tx,
            api_rx,
            rib_tx,
            rib_rx,
            store_rx: None,
            publish_tx,
            publish_rx: Some(publish_rx),
            route_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            publisher: None,
        };
        (node, route_rx)
    }

    pub fn handle(&self) -> PrefixManagerHandle {
        PrefixManagerHandle::new(self.api_tx.clone(), self.rib_tx.clone())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Subscribe to the store, start the publisher and install aggregates
    /// that need no supporting routes.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let Some(publish_rx) = self.publish_rx.take() else {
            return Err(NodeError::AlreadyRunning);
        };

        self.store_rx = Some(self.store.subscribe(PREFIX_KEY_MARKER).await);
        self.publisher = Some(spawn_publisher(
            Arc::clone(&self.store),
            publish_rx,
            self.shutdown_rx.clone(),
        ));

        let routes = self.engine.start();
        self.send_routes(routes);
        self.schedule_flush();

        let engine_config = self.engine.config();
        tracing::info!(
            node = %engine_config.node_name,
            areas = engine_config.areas.len(),
            originated = engine_config.originated_prefixes.len(),
            "prefix manager started"
        );
        Ok(())
    }

    /// Run the event loop. Returns when shutdown is signalled.
    pub async fn run(&mut self) {
        let mut refresh_interval = tokio::time::interval(self.config.ttl_refresh());
        // Don't fire immediately
        refresh_interval.tick().await;

        let mut store_rx = self.store_rx.take();

        tracing::info!("entering event loop");

        loop {
            let deadline = self.debounce.deadline().map(Instant::from_std);

            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                _ = sleep_until(deadline) => {
                    self.flush();
                }

                Some(update) = self.rib_rx.recv() => {
                    self.handle_rib_update(&update);
                }

                Some(event) = recv_store(&mut store_rx) => {
                    self.handle_store_event(event);
                }

                Some(request) = self.api_rx.recv() => {
                    self.handle_request(request);
                }

                _ = refresh_interval.tick() => {
                    self.refresh_records();
                }
            }
        }

        self.store_rx = store_rx;
    }

    /// Signal the node to shut down.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the node and wait for the publisher to finish.
    pub async fn shutdown(mut self) {
        tracing::info!("shutting down prefix manager");
        self.trigger_shutdown();
        if let Some(handle) = self.publisher.take() {
            let _ = handle.await;
        }
    }

    // -- Event handling --

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Prefix { event, reply } => {
                let result = self.engine.handle_prefix_event(&event);
                if let Err(e) = &result {
                    tracing::warn!(kind = ?event.kind, source = %event.source_type, "dropping prefix event: {e}");
                }
                self.schedule_flush();
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Request::Query(query) => self.handle_query(query),
        }
    }

    fn handle_query(&self, query: Query) {
        match query {
            Query::Prefixes { source_type, reply } => {
                let entries = match source_type {
                    Some(t) => self.engine.get_prefixes_by_type(t),
                    None => self.engine.get_prefixes(),
                };
                let _ = reply.send(entries);
            }
            Query::AdvertisedRoutes { filter, reply } => {
                let _ = reply.send(self.engine.get_advertised_routes_filtered(&filter));
            }
            Query::AreaAdvertisedRoutes {
                area,
                stage,
                filter,
                reply,
            } => {
                let _ = reply.send(self.engine.get_area_advertised_routes(&area, stage, &filter));
            }
            Query::OriginatedPrefixes { reply } => {
                let _ = reply.send(self.engine.get_originated_prefixes());
            }
        }
    }

    fn handle_rib_update(&mut self, update: &RibUpdate) {
        tracing::debug!(
            full_sync = update.is_full_sync(),
            upserts = update.unicast_upserts.len(),
            deletes = update.unicast_deletes.len(),
            label_upserts = update.label_upserts.len(),
            label_deletes = update.label_deletes.len(),
            "RIB update"
        );
        let routes = self.engine.handle_rib_update(update);
        self.send_routes(routes);
        self.schedule_flush();
    }

    fn handle_store_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Synced => self.engine.mark_store_synced(),
            StoreEvent::Changed { area, key, value } => {
                let record = match value.as_deref().map(PrefixRecord::decode).transpose() {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(%area, %key, "undecodable record: {e}");
                        return;
                    }
                };
                if let Err(e) = self.engine.handle_store_change(&area, &key, record.as_ref()) {
                    tracing::warn!(%area, "ignoring store notification: {e}");
                    return;
                }
            }
        }
        self.schedule_flush();
    }

    fn send_routes(&self, routes: StaticRouteUpdate) {
        if routes.is_empty() {
            return;
        }
        tracing::debug!(
            upserts = routes.upserts.len(),
            deletes = routes.deletes.len(),
            "static route update"
        );
        if self.route_tx.send(routes).is_err() {
            tracing::debug!("no route consumer, dropping static route update");
        }
    }

    // -- Publication --

    fn schedule_flush(&mut self) {
        if self.engine.has_pending() {
            self.debounce.arm(Instant::now().into_std());
        }
    }

    fn flush(&mut self) {
        if !self.debounce.fire(Instant::now().into_std()) {
            return;
        }
        for publication in self.engine.flush() {
            if self.publish_tx.send(publication).is_err() {
                tracing::warn!("publisher stopped, dropping publication");
                break;
            }
        }
    }

    fn refresh_records(&self) {
        let records = self.engine.refresh();
        if records.is_empty() {
            return;
        }
        tracing::debug!(count = records.len(), "refreshing record TTLs");
        for publication in records {
            if self.publish_tx.send(publication).is_err() {
                break;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_store(rx: &mut Option<mpsc::UnboundedReceiver<StoreEvent>>) -> Option<StoreEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drain publications into the store one at a time, so puts for a key
/// reach the store in the order they were produced.
fn spawn_publisher<S: FloodingStore>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<Publication>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    tracing::debug!("publisher shutting down");
                    break;
                }
                publication = rx.recv() => {
                    let Some(Publication { area, key, record }) = publication else {
                        break;
                    };
                    if let Err(e) = store.put(&area, &key, &record).await {
                        tracing::warn!(%area, key = %key, version = record.version, "put failed: {e}");
                    }
                }
            }
        }
    })
}
