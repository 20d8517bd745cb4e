use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::{AutoDispatchConfig, Config};
use crate::engine::pricing::PricingEngine;
use crate::engine::service::DeliveryService;
use crate::models::order::OrderId;
use crate::notify::BroadcastNotifier;
use crate::observability::metrics::Metrics;
use crate::store::InMemoryStore;

pub struct AppState {
    pub service: DeliveryService,
    pub store: Arc<InMemoryStore>,
    pub notifier: BroadcastNotifier,
    pub dispatch_tx: mpsc::Sender<OrderId>,
    pub auto_dispatch: AutoDispatchConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> (Self, mpsc::Receiver<OrderId>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let store = Arc::new(InMemoryStore::new());
        let notifier = BroadcastNotifier::new(events_tx);
        let metrics = Metrics::new();
        let service = DeliveryService::new(
            store.clone(),
            PricingEngine::new(config.pricing.clone()),
            Arc::new(notifier.clone()),
            metrics.clone(),
        );

        (
            Self {
                service,
                store,
                notifier,
                dispatch_tx,
                auto_dispatch: config.auto_dispatch.clone(),
                metrics,
            },
            dispatch_rx,
        )
    }
}
