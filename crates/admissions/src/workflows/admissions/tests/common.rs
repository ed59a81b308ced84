use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::AdmissionsConfig;
use crate::workflows::admissions::domain::{
    Actor, Application, ApplicationDetails, ApplicationId, ApplicationUpdate, Document,
    DocumentId, DocumentType, DocumentUpload, FeeKind, ProgramId, UserId,
};
use crate::workflows::admissions::fees::{LedgerError, PaymentLedger};
use crate::workflows::admissions::history::StatusHistoryEntry;
use crate::workflows::admissions::memory::{
    InMemoryApplicationRepository, InMemoryDocumentStore, InMemoryPaymentLedger,
};
use crate::workflows::admissions::notifications::{
    NotificationError, NotificationPublisher, StatusChangeNotice,
};
use crate::workflows::admissions::repository::{
    ApplicationRepository, RemovedDraft, RepositoryError, StatusChange,
};
use crate::workflows::admissions::service::AdmissionsService;

pub(super) type MemoryService = AdmissionsService<
    InMemoryApplicationRepository,
    InMemoryDocumentStore,
    InMemoryPaymentLedger,
    MemoryNotifier,
>;

pub(super) struct Harness {
    pub(super) service: MemoryService,
    pub(super) repository: Arc<InMemoryApplicationRepository>,
    pub(super) documents: Arc<InMemoryDocumentStore>,
    pub(super) ledger: Arc<InMemoryPaymentLedger>,
    pub(super) notifier: Arc<MemoryNotifier>,
}

pub(super) fn student() -> Actor {
    Actor::student("student-ada")
}

pub(super) fn other_student() -> Actor {
    Actor::student("student-grace")
}

pub(super) fn admin() -> Actor {
    Actor::admin("admin-turing")
}

pub(super) fn program() -> ProgramId {
    ProgramId("msc-computer-science".to_string())
}

pub(super) fn details() -> ApplicationDetails {
    ApplicationDetails {
        personal_statement: Some("I want to study distributed systems.".to_string()),
        intended_start_term: Some("2027-fall".to_string()),
        previous_institution: Some("University of Tartu".to_string()),
    }
}

pub(super) fn upload(document_type: DocumentType) -> DocumentUpload {
    DocumentUpload {
        document_type,
        storage_key: format!("uploads/student-ada/{}.pdf", document_type.label()),
        size_bytes: 48_213,
        mime_type: "application/pdf".to_string(),
    }
}

pub(super) fn build_harness() -> Harness {
    build_harness_with(&AdmissionsConfig::default())
}

pub(super) fn build_harness_with(config: &AdmissionsConfig) -> Harness {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let documents = Arc::new(repository.document_store());
    let ledger = Arc::new(InMemoryPaymentLedger::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = AdmissionsService::new(
        repository.clone(),
        documents.clone(),
        ledger.clone(),
        notifier.clone(),
        config,
    );
    Harness {
        service,
        repository,
        documents,
        ledger,
        notifier,
    }
}

impl Harness {
    pub(super) fn draft(&self) -> Application {
        self.service
            .create_draft(&student(), program(), details())
            .expect("draft created")
    }

    pub(super) fn attach(&self, application: &Application, types: &[DocumentType]) {
        for document_type in types {
            self.service
                .upload_document(&application.id, &student(), upload(*document_type))
                .expect("document uploaded");
        }
    }

    pub(super) fn pay(&self, application: &Application) {
        self.ledger
            .record_payment(application.id.clone(), FeeKind::Application)
            .expect("payment recorded");
    }

    /// Draft with every default-required document and the application fee paid.
    pub(super) fn ready_draft(&self) -> Application {
        let application = self.draft();
        self.attach(
            &application,
            &[
                DocumentType::Passport,
                DocumentType::Transcript,
                DocumentType::Diploma,
            ],
        );
        self.pay(&application);
        application
    }

    pub(super) fn submitted(&self) -> Application {
        let application = self.ready_draft();
        self.service
            .submit(&application.id, &student())
            .expect("submission succeeds")
    }

    pub(super) fn stored(&self, id: &ApplicationId) -> Application {
        self.repository
            .fetch(id)
            .expect("fetch succeeds")
            .expect("application present")
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<StatusChangeNotice>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<StatusChangeNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn publish(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct ClosedNotifier;

impl NotificationPublisher for ClosedNotifier {
    fn publish(&self, _notice: StatusChangeNotice) -> Result<(), NotificationError> {
        Err(NotificationError::QueueClosed)
    }
}

pub(super) struct UnavailableLedger;

impl PaymentLedger for UnavailableLedger {
    fn is_fee_paid(
        &self,
        _application_id: &ApplicationId,
        _kind: FeeKind,
    ) -> Result<bool, LedgerError> {
        Err(LedgerError::Unavailable("provider timeout".to_string()))
    }
}

/// Repository that serves a stale draft on reads while the stored copy has already moved on,
/// reproducing the losing side of a submission race.
pub(super) struct StaleReadRepository {
    pub(super) inner: InMemoryApplicationRepository,
    pub(super) stale: Application,
}

impl ApplicationRepository for StaleReadRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        self.inner.insert(application)
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(Some(self.stale.clone()))
    }

    fn update_draft(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        self.inner.update_draft(id, update, at)
    }

    fn delete_draft(&self, id: &ApplicationId) -> Result<RemovedDraft, RepositoryError> {
        self.inner.delete_draft(id)
    }

    fn transition(
        &self,
        id: &ApplicationId,
        change: StatusChange,
        entry: StatusHistoryEntry,
    ) -> Result<Application, RepositoryError> {
        self.inner.transition(id, change, entry)
    }

    fn annotate(
        &self,
        id: &ApplicationId,
        reviewer_id: UserId,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        self.inner.annotate(id, reviewer_id, notes, at)
    }

    fn history(&self, id: &ApplicationId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        self.inner.history(id)
    }
}

pub(super) fn present(types: &[DocumentType]) -> BTreeSet<DocumentType> {
    types.iter().copied().collect()
}

pub(super) fn document(
    application_id: &ApplicationId,
    suffix: &str,
    document_type: DocumentType,
) -> Document {
    Document {
        id: DocumentId(format!("doc-{suffix}")),
        application_id: application_id.clone(),
        document_type,
        verification: crate::workflows::admissions::domain::VerificationStatus::Pending,
        rejection_reason: None,
        storage_key: format!("uploads/{suffix}.pdf"),
        size_bytes: 1024,
        mime_type: "application/pdf".to_string(),
        uploaded_at: Utc::now(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
