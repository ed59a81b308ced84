use crate::infra::{AppState, InMemoryAdmissionsService, PaymentConfirmation};
use admissions::error::AppError;
use admissions::workflows::admissions::lifecycle::valid_transitions;
use admissions::workflows::admissions::{
    application_router, ApplicationStatus, InMemoryPaymentLedger,
};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct TransitionEntry {
    pub(crate) from: ApplicationStatus,
    pub(crate) to: Vec<ApplicationStatus>,
}

pub(crate) fn with_admission_routes(
    service: Arc<InMemoryAdmissionsService>,
    ledger: Arc<InMemoryPaymentLedger>,
) -> axum::Router {
    application_router(service.clone())
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/lifecycle/transitions",
            axum::routing::get(transitions_endpoint),
        )
        .route(
            "/api/v1/payments/confirmations",
            axum::routing::post(payment_confirmation_endpoint),
        )
        .layer(Extension(service))
        .layer(Extension(ledger))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn transitions_endpoint() -> Json<Vec<TransitionEntry>> {
    Json(
        ApplicationStatus::ALL
            .iter()
            .map(|status| TransitionEntry {
                from: *status,
                to: valid_transitions(*status),
            })
            .collect(),
    )
}

/// Records a settled fee. Confirmations for unknown applications are refused.
pub(crate) async fn payment_confirmation_endpoint(
    Extension(service): Extension<Arc<InMemoryAdmissionsService>>,
    Extension(ledger): Extension<Arc<InMemoryPaymentLedger>>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let PaymentConfirmation {
        application_id,
        fee_kind,
    } = confirmation;

    service.get(&application_id)?;
    ledger.record_payment(application_id.clone(), fee_kind)?;
    info!(%application_id, fee = %fee_kind, "fee payment confirmed");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "application_id": application_id,
            "fee_kind": fee_kind,
            "status": "recorded",
        })),
    ))
}
