use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use admissions::config::AdmissionsConfig;
use admissions::workflows::admissions::{
    AdmissionsService, ApplicationId, DeliveryStats, DeliveryWorker, FeeKind,
    InMemoryApplicationRepository, InMemoryDocumentStore, InMemoryPaymentLedger,
    LogNotificationSink, NotificationQueue,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryAdmissionsService = AdmissionsService<
    InMemoryApplicationRepository,
    InMemoryDocumentStore,
    InMemoryPaymentLedger,
    NotificationQueue,
>;

/// Payment-provider callback confirming that a fee has settled.
#[derive(Debug, Deserialize)]
pub(crate) struct PaymentConfirmation {
    pub(crate) application_id: ApplicationId,
    #[serde(default = "application_fee")]
    pub(crate) fee_kind: FeeKind,
}

fn application_fee() -> FeeKind {
    FeeKind::Application
}

/// Process-local wiring: in-memory stores, the payment ledger and a log-backed delivery worker.
pub(crate) struct AdmissionsRuntime {
    pub(crate) service: Arc<InMemoryAdmissionsService>,
    pub(crate) ledger: Arc<InMemoryPaymentLedger>,
    pub(crate) delivery: JoinHandle<DeliveryStats>,
}

/// Must be called from inside a tokio runtime; the delivery worker is spawned immediately.
pub(crate) fn in_memory_runtime(config: &AdmissionsConfig) -> AdmissionsRuntime {
    let (queue, receiver) = NotificationQueue::bounded(config.notifications.queue_capacity);
    let delivery = DeliveryWorker::new(
        receiver,
        Arc::new(LogNotificationSink),
        config.notifications.retry_policy(),
    )
    .spawn();

    let ledger = Arc::new(InMemoryPaymentLedger::default());
    let repository = InMemoryApplicationRepository::default();
    let documents = repository.document_store();
    let service = Arc::new(AdmissionsService::new(
        Arc::new(repository),
        Arc::new(documents),
        ledger.clone(),
        Arc::new(queue),
        config,
    ));

    AdmissionsRuntime {
        service,
        ledger,
        delivery,
    }
}
