use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::admissions::domain::{ApplicationStatus, DocumentType};
use crate::workflows::admissions::router::{application_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};

fn router_for(harness: Harness) -> axum::Router {
    application_router(Arc::new(harness.service))
}

fn request(
    method: &str,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = actor {
        builder = builder
            .header(ACTOR_ID_HEADER, id)
            .header(ACTOR_ROLE_HEADER, role);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

const STUDENT: Option<(&str, &str)> = Some(("student-ada", "student"));
const ADMIN: Option<(&str, &str)> = Some(("admin-turing", "admin"));

#[tokio::test]
async fn create_route_opens_a_draft() {
    let router = router_for(build_harness());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/applications",
            STUDENT,
            Some(json!({
                "program_id": "msc-computer-science",
                "details": { "intended_start_term": "2027-fall" }
            })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("draft"));
    assert_eq!(payload["owner_id"], json!("student-ada"));
    assert!(payload["submitted_at"].is_null());
}

#[tokio::test]
async fn missing_actor_header_is_unauthorized() {
    let router = router_for(build_harness());

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/applications",
            None,
            Some(json!({ "program_id": "msc-computer-science" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_actor_role_is_a_bad_request() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/submit", application.id),
            Some(("student-ada", "registrar")),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_route_lists_missing_documents() {
    let harness = build_harness();
    let application = harness.draft();
    harness.attach(&application, &[DocumentType::Passport, DocumentType::Transcript]);
    harness.pay(&application);
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/submit", application.id),
            STUDENT,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["missing_documents"], json!(["diploma"]));
    assert!(payload["error"].as_str().unwrap_or_default().contains("diploma"));
}

#[tokio::test]
async fn submit_route_reports_unpaid_fee_as_payment_required() {
    let harness = build_harness();
    let application = harness.draft();
    harness.attach(
        &application,
        &[
            DocumentType::Passport,
            DocumentType::Transcript,
            DocumentType::Diploma,
        ],
    );
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/submit", application.id),
            STUDENT,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["fee_kind"], json!("application"));
}

#[tokio::test]
async fn submit_route_returns_submitted_application() {
    let harness = build_harness();
    let application = harness.ready_draft();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/submit", application.id),
            STUDENT,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!(ApplicationStatus::Submitted.label()));
    assert!(payload["submitted_at"].is_string());
}

#[tokio::test]
async fn readiness_route_previews_gates() {
    let harness = build_harness();
    let application = harness.draft();
    harness.pay(&application);
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "GET",
            &format!("/api/v1/applications/{}/readiness", application.id),
            None,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["satisfied"], json!(false));
    assert_eq!(payload["fee_paid"], json!(true));
    assert_eq!(
        payload["missing_documents"],
        json!(["passport", "transcript", "diploma"])
    );
}

#[tokio::test]
async fn delete_route_conflicts_outside_draft() {
    let harness = build_harness();
    let application = harness.submitted();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/applications/{}", application.id),
            STUDENT,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_route_removes_drafts() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/applications/{}", application.id),
            STUDENT,
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(request(
            "GET",
            &format!("/api/v1/applications/{}", application.id),
            None,
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_route_forbids_other_students() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/applications/{}", application.id),
            Some(("student-grace", "student")),
            Some(json!({ "personal_statement": "mine now" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patch_route_rejects_an_empty_update() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/applications/{}", application.id),
            STUDENT,
            Some(json!({})),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "an update must change at least one field");
}

#[tokio::test]
async fn status_route_drives_admin_review_and_history() {
    let harness = build_harness();
    let application = harness.submitted();
    let router = router_for(harness);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/status", application.id),
            ADMIN,
            Some(json!({ "status": "under_review", "comment": "Assigned to committee" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/status", application.id),
            ADMIN,
            Some(json!({ "status": "submitted" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .oneshot(request(
            "GET",
            &format!("/api/v1/applications/{}/history", application.id),
            None,
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let entries = payload.as_array().expect("history array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["from"], json!("submitted"));
    assert_eq!(entries[1]["to"], json!("under_review"));
    assert_eq!(entries[1]["comment"], json!("Assigned to committee"));
}

#[tokio::test]
async fn document_routes_upload_and_review() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/documents", application.id),
            STUDENT,
            Some(json!({
                "document_type": "passport",
                "storage_key": "uploads/student-ada/passport.pdf",
                "size_bytes": 2048,
                "mime_type": "application/pdf"
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let uploaded = read_json_body(response).await;
    let document_id = uploaded["id"].as_str().expect("document id").to_string();
    assert_eq!(uploaded["verification"], json!("pending"));

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!(
                "/api/v1/applications/{}/documents/{document_id}/review",
                application.id
            ),
            ADMIN,
            Some(json!({ "decision": "reject", "reason": "Photo page cropped" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let reviewed = read_json_body(response).await;
    assert_eq!(reviewed["verification"], json!("rejected"));
    assert_eq!(reviewed["rejection_reason"], json!("Photo page cropped"));

    let response = router
        .oneshot(request(
            "GET",
            &format!("/api/v1/applications/{}/documents", application.id),
            None,
            None,
        ))
        .await
        .expect("route executes");
    let listed = read_json_body(response).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn upload_route_rejects_unsupported_files() {
    let harness = build_harness();
    let application = harness.draft();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            "POST",
            &format!("/api/v1/applications/{}/documents", application.id),
            STUDENT,
            Some(json!({
                "document_type": "cv",
                "storage_key": "uploads/student-ada/cv.exe",
                "size_bytes": 2048,
                "mime_type": "application/x-msdownload"
            })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
