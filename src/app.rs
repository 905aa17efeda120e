//! Application state and router composition.

use crate::catalog::handlers::*;
use crate::config::AppConfig;
use crate::events::dispatcher::{register_delivery_handler, EventDispatcher};
use crate::events::handlers::*;
use crate::events::notifier::{Notifier, QueuedNotifier};
use crate::executor::handlers::handle_get_task_status;
use crate::executor::protocol::ENDPOINT_TASK_STATUS;
use crate::executor::queue::TaskQueue;
use crate::executor::registry::TaskHandlerRegistry;
use crate::ingestion::types::IngestSettings;
use crate::operations::handlers::*;
use crate::operations::tasks::register_pipeline_handlers;
use crate::relay::broker::TopicBroker;
use crate::relay::handlers::*;
use crate::relay::inbound::InboundRelay;
use crate::relay::stream::StreamGateway;
use crate::storage::inbound::MemoryInboundStore;
use crate::storage::ledger::MemoryLedger;
use crate::storage::progress::MemoryProgressStore;
use crate::storage::records::MemoryRecordStore;
use crate::storage::subscriptions::MemorySubscriptionStore;
use crate::storage::{InboundStore, OperationLedger, ProgressStore, RecordStore, SubscriptionStore};

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Everything a handler or task can reach. Cloning is cheap: every store is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub ledger: Arc<dyn OperationLedger>,
    pub progress: Arc<dyn ProgressStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub inbound: Arc<dyn InboundStore>,
    pub queue: Arc<TaskQueue>,
    pub notifier: Arc<dyn Notifier>,
    pub dispatcher: Arc<EventDispatcher>,
    pub broker: Arc<TopicBroker>,
    pub relay: Arc<InboundRelay>,
    pub gateway: Arc<StreamGateway>,
    pub upload_dir: PathBuf,
    pub settings: IngestSettings,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires every store to its in-memory implementation.
    pub fn in_memory(config: &AppConfig) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let subscriptions: Arc<dyn SubscriptionStore> = Arc::new(MemorySubscriptionStore::new());
        let inbound: Arc<dyn InboundStore> = Arc::new(MemoryInboundStore::new());
        let broker = Arc::new(TopicBroker::default());

        Self {
            records: Arc::new(MemoryRecordStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
            progress: Arc::new(MemoryProgressStore::new(config.progress_ttl)),
            dispatcher: Arc::new(EventDispatcher::new(
                subscriptions.clone(),
                config.webhook_timeout,
            )),
            subscriptions,
            relay: Arc::new(InboundRelay::new(inbound.clone(), broker.clone())),
            inbound,
            notifier: Arc::new(QueuedNotifier::new(queue.clone())),
            queue,
            gateway: Arc::new(StreamGateway::new(broker.clone(), config.stream_keepalive)),
            broker,
            upload_dir: config.upload_dir.clone(),
            settings: IngestSettings {
                batch_size: config.batch_size,
                progress_every: config.progress_every,
            },
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Registry with the pipeline and delivery handlers bound to this state.
    pub fn task_handlers(&self) -> Arc<TaskHandlerRegistry> {
        let registry = TaskHandlerRegistry::new();
        register_pipeline_handlers(&registry, self);
        register_delivery_handler(&registry, self.dispatcher.clone());
        registry
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route(ENDPOINT_TASK_STATUS, get(handle_get_task_status))
        // Catalog page
        .route("/products/", get(handle_list_records))
        .route("/products/create/", post(handle_create_record))
        .route("/products/:id/update/", post(handle_update_record))
        .route("/products/:id/delete/", post(handle_delete_record))
        // Bulk operations
        .route("/products/upload/", post(handle_upload))
        .route("/products/upload/progress/:task_id", get(handle_upload_progress))
        .route("/products/delete-all/", post(handle_delete_all))
        .route("/products/delete/progress/:task_id", get(handle_delete_progress))
        .route("/products/active-operation/", get(handle_active_operation))
        .route("/products/operations/", get(handle_list_operations))
        // Outbound subscriptions
        .route("/webhooks/", get(handle_list_subscriptions))
        .route("/webhooks/create/", post(handle_create_subscription))
        .route("/webhooks/update/:id/", post(handle_update_subscription))
        .route("/webhooks/delete/:id/", post(handle_delete_subscription))
        // Tester
        .route("/webhooks/tester/create/", post(handle_create_tester))
        .route("/webhooks/tester/:token/", get(handle_tester_detail))
        .route("/webhooks/tester/:token/stream", get(handle_tester_stream))
        .route("/webhooks/inbound/:token/", any(handle_inbound))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
