use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationUpdate, Document, DocumentId,
    DocumentType, UserId,
};
use super::history::StatusHistoryEntry;
use super::lifecycle::StatusTransition;

/// Status write guarded by the status the caller observed.
///
/// Implementations apply it only if the stored status still equals `expected` and every type
/// in `required_documents` is on file for the application, and append the accompanying history
/// entry in the same operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected: ApplicationStatus,
    pub next: ApplicationStatus,
    pub at: DateTime<Utc>,
    pub reviewer_id: Option<UserId>,
    pub required_documents: BTreeSet<DocumentType>,
}

impl StatusChange {
    pub fn new(transition: StatusTransition, at: DateTime<Utc>) -> Self {
        Self {
            expected: transition.from_status(),
            next: transition.to_status(),
            at,
            reviewer_id: None,
            required_documents: BTreeSet::new(),
        }
    }

    pub fn reviewed_by(mut self, reviewer_id: UserId) -> Self {
        self.reviewer_id = Some(reviewer_id);
        self
    }

    pub fn requiring_documents(mut self, required: BTreeSet<DocumentType>) -> Self {
        self.required_documents = required;
        self
    }

    pub fn apply(&self, application: &mut Application) {
        application.status = self.next;
        application.updated_at = self.at;
        if self.next == ApplicationStatus::Submitted {
            application.submitted_at = Some(self.at);
        }
        if let Some(reviewer) = &self.reviewer_id {
            application.reviewer_id = Some(reviewer.clone());
            application.reviewed_at = Some(self.at);
        }
    }
}

/// Outcome of deleting a draft together with its document metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedDraft {
    pub application: Application,
    pub documents_removed: usize,
}

/// Storage for applications and their status history.
///
/// Implementations share their guard with the paired [`DocumentStore`], so status writes, draft
/// deletion and document edits for one application are serialized.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Apply an applicant edit only while the stored application is still a draft.
    fn update_draft(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;
    /// Remove a draft and its documents in one step.
    fn delete_draft(&self, id: &ApplicationId) -> Result<RemovedDraft, RepositoryError>;
    /// Compare-and-swap on status (and required documents) plus history append, all or nothing.
    fn transition(
        &self,
        id: &ApplicationId,
        change: StatusChange,
        entry: StatusHistoryEntry,
    ) -> Result<Application, RepositoryError>;
    fn annotate(
        &self,
        id: &ApplicationId,
        reviewer_id: UserId,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;
    fn history(&self, id: &ApplicationId) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;
}

/// Metadata store for uploaded documents. Every query is scoped to one application.
pub trait DocumentStore: Send + Sync {
    /// Refused with `NotFound` for unknown applications and `DocumentsLocked` once the
    /// application no longer accepts uploads (anything but draft or documents requested).
    fn insert(&self, document: Document) -> Result<Document, RepositoryError>;
    fn fetch(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
    ) -> Result<Option<Document>, RepositoryError>;
    fn list(&self, application_id: &ApplicationId) -> Result<Vec<Document>, RepositoryError>;
    fn update(&self, document: Document) -> Result<(), RepositoryError>;
    /// Only while the application is a draft; `DocumentsLocked` otherwise.
    fn remove(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
    ) -> Result<Document, RepositoryError>;

    fn list_document_types(
        &self,
        application_id: &ApplicationId,
    ) -> Result<BTreeSet<DocumentType>, RepositoryError> {
        Ok(self
            .list(application_id)?
            .into_iter()
            .filter(|document| &document.application_id == application_id)
            .map(|document| document.document_type)
            .collect())
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("status guard failed (expected {expected}, found {found})")]
    StatusMismatch {
        expected: ApplicationStatus,
        found: ApplicationStatus,
    },
    #[error("application is {status} and its documents are locked")]
    DocumentsLocked { status: ApplicationStatus },
    #[error("required documents not on file: {0:?}")]
    MissingDocuments(Vec<DocumentType>),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
