use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Actor, ActorRole, ApplicationDetails, ApplicationId, ApplicationStatus, ApplicationUpdate,
    DocumentDecision, DocumentId, DocumentUpload, ProgramId, UserId,
};
use super::fees::PaymentLedger;
use super::notifications::NotificationPublisher;
use super::repository::{ApplicationRepository, DocumentStore, RepositoryError};
use super::service::{AdmissionsService, ApplicationServiceError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type SharedService<R, D, L, N> = Arc<AdmissionsService<R, D, L, N>>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateApplicationRequest {
    pub(crate) program_id: String,
    #[serde(default)]
    pub(crate) details: ApplicationDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    pub(crate) status: ApplicationStatus,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotesRequest {
    pub(crate) notes: String,
}

/// Router builder exposing the application lifecycle over HTTP.
pub fn application_router<R, D, L, N>(service: SharedService<R, D, L, N>) -> Router
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<R, D, L, N>)
                .patch(update_handler::<R, D, L, N>)
                .delete(destroy_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/readiness",
            get(readiness_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            post(transition_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/notes",
            put(notes_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/history",
            get(history_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            get(list_documents_handler::<R, D, L, N>).post(upload_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:document_id",
            axum::routing::delete(remove_document_handler::<R, D, L, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:document_id/review",
            post(review_document_handler::<R, D, L, N>),
        )
        .with_state(service)
}

/// Resolve the caller from upstream-authenticated headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let role = headers
        .get(ACTOR_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase());

    let role = match role.as_deref() {
        None | Some("student") => ActorRole::Student,
        Some("admin") => ActorRole::Admin,
        Some(other) => {
            let payload = json!({ "error": format!("unknown actor role '{other}'") });
            return Err((StatusCode::BAD_REQUEST, axum::Json(payload)).into_response());
        }
    };

    match id {
        Some(id) => Ok(Actor {
            id: UserId(id.to_string()),
            role,
        }),
        None => {
            let payload = json!({ "error": format!("missing {ACTOR_ID_HEADER} header") });
            Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response())
        }
    }
}

/// Map a service error onto its HTTP status and JSON body.
pub fn error_response(error: ApplicationServiceError) -> Response {
    let status = match &error {
        ApplicationServiceError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        ApplicationServiceError::NotFound(_) | ApplicationServiceError::DocumentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ApplicationServiceError::InvalidState { .. }
        | ApplicationServiceError::NotEditable { .. }
        | ApplicationServiceError::ConcurrentModification => StatusCode::CONFLICT,
        ApplicationServiceError::MissingDocuments(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::FeeUnpaid { .. } => StatusCode::PAYMENT_REQUIRED,
        ApplicationServiceError::MissingProgram
        | ApplicationServiceError::EmptyUpdate
        | ApplicationServiceError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        ApplicationServiceError::Repository(RepositoryError::Unavailable(_))
        | ApplicationServiceError::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
        ApplicationServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match &error {
        ApplicationServiceError::MissingDocuments(missing) => json!({
            "error": error.to_string(),
            "missing_documents": missing,
        }),
        ApplicationServiceError::FeeUnpaid { kind } => json!({
            "error": error.to_string(),
            "fee_kind": kind,
        }),
        _ => json!({ "error": error.to_string() }),
    };

    (status, axum::Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, ApplicationServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateApplicationRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.create_draft(&actor, ProgramId(request.program_id), request.details),
    )
}

pub(crate) async fn get_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.get(&ApplicationId(application_id)))
}

pub(crate) async fn update_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(update): axum::Json<ApplicationUpdate>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update_draft(&ApplicationId(application_id), &actor, update),
    )
}

pub(crate) async fn destroy_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.destroy(&ApplicationId(application_id), &actor) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.submit(&ApplicationId(application_id), &actor),
    )
}

pub(crate) async fn readiness_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.can_submit(&ApplicationId(application_id)),
    )
}

pub(crate) async fn transition_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.transition(
            &ApplicationId(application_id),
            &actor,
            request.status,
            request.comment,
        ),
    )
}

pub(crate) async fn notes_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NotesRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.annotate(&ApplicationId(application_id), &actor, request.notes),
    )
}

pub(crate) async fn history_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.history(&ApplicationId(application_id)),
    )
}

pub(crate) async fn list_documents_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.documents(&ApplicationId(application_id)),
    )
}

pub(crate) async fn upload_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(upload): axum::Json<DocumentUpload>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.upload_document(&ApplicationId(application_id), &actor, upload),
    )
}

pub(crate) async fn remove_document_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path((application_id, document_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.remove_document(
            &ApplicationId(application_id),
            &DocumentId(document_id),
            &actor,
        ),
    )
}

pub(crate) async fn review_document_handler<R, D, L, N>(
    State(service): State<SharedService<R, D, L, N>>,
    Path((application_id, document_id)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(decision): axum::Json<DocumentDecision>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.review_document(
            &ApplicationId(application_id),
            &DocumentId(document_id),
            &actor,
            decision,
        ),
    )
}
