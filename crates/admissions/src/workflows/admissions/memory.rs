//! Process-local adapters for every storage and ledger seam.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationUpdate, Document, DocumentId,
    DocumentType, FeeKind, UserId,
};
use super::fees::{LedgerError, PaymentLedger};
use super::history::StatusHistoryEntry;
use super::repository::{
    ApplicationRepository, DocumentStore, RemovedDraft, RepositoryError, StatusChange,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default)]
struct AdmissionsTables {
    applications: HashMap<ApplicationId, Application>,
    history: Vec<StatusHistoryEntry>,
    documents: HashMap<ApplicationId, Vec<Document>>,
}

impl AdmissionsTables {
    fn draft_mut(&mut self, id: &ApplicationId) -> Result<&mut Application, RepositoryError> {
        let application = self
            .applications
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if application.status != ApplicationStatus::Draft {
            return Err(RepositoryError::StatusMismatch {
                expected: ApplicationStatus::Draft,
                found: application.status,
            });
        }
        Ok(application)
    }

    fn status_of(&self, id: &ApplicationId) -> Result<ApplicationStatus, RepositoryError> {
        self.applications
            .get(id)
            .map(|application| application.status)
            .ok_or(RepositoryError::NotFound)
    }
}

fn missing_documents(
    documents: &HashMap<ApplicationId, Vec<Document>>,
    id: &ApplicationId,
    required: &BTreeSet<DocumentType>,
) -> Vec<DocumentType> {
    let present: BTreeSet<DocumentType> = documents
        .get(id)
        .map(|documents| documents.iter().map(|document| document.document_type).collect())
        .unwrap_or_default();
    required.difference(&present).copied().collect()
}

/// Applications, history and documents share one lock so status writes, audit rows and
/// document edits for an application commit in a single order.
#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<AdmissionsTables>>,
}

impl InMemoryApplicationRepository {
    /// Document store backed by the same tables as this repository.
    pub fn document_store(&self) -> InMemoryDocumentStore {
        InMemoryDocumentStore {
            tables: self.tables.clone(),
        }
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        tables
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables.applications.get(id).cloned())
    }

    fn update_draft(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let application = tables.draft_mut(id)?;
        update.apply_to(&mut application.details);
        application.updated_at = at;
        Ok(application.clone())
    }

    fn delete_draft(&self, id: &ApplicationId) -> Result<RemovedDraft, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        tables.draft_mut(id)?;
        let application = tables
            .applications
            .remove(id)
            .ok_or(RepositoryError::NotFound)?;
        let documents_removed = tables
            .documents
            .remove(id)
            .map(|documents| documents.len())
            .unwrap_or(0);
        Ok(RemovedDraft {
            application,
            documents_removed,
        })
    }

    fn transition(
        &self,
        id: &ApplicationId,
        change: StatusChange,
        entry: StatusHistoryEntry,
    ) -> Result<Application, RepositoryError> {
        let mut guard = lock(&self.tables)?;
        let tables = &mut *guard;
        let application = tables
            .applications
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if application.status != change.expected {
            return Err(RepositoryError::StatusMismatch {
                expected: change.expected,
                found: application.status,
            });
        }
        let missing = missing_documents(&tables.documents, id, &change.required_documents);
        if !missing.is_empty() {
            return Err(RepositoryError::MissingDocuments(missing));
        }

        change.apply(application);
        let updated = application.clone();
        tables.history.push(entry);
        Ok(updated)
    }

    fn annotate(
        &self,
        id: &ApplicationId,
        reviewer_id: UserId,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let application = tables
            .applications
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        application.review_notes = Some(notes);
        application.reviewer_id = Some(reviewer_id);
        application.updated_at = at;
        Ok(application.clone())
    }

    fn history(&self, id: &ApplicationId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .history
            .iter()
            .filter(|entry| &entry.application_id == id)
            .cloned()
            .collect())
    }
}

/// Obtained from [`InMemoryApplicationRepository::document_store`].
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    tables: Arc<Mutex<AdmissionsTables>>,
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let status = tables.status_of(&document.application_id)?;
        if !matches!(
            status,
            ApplicationStatus::Draft | ApplicationStatus::DocumentsRequested
        ) {
            return Err(RepositoryError::DocumentsLocked { status });
        }

        let documents = tables
            .documents
            .entry(document.application_id.clone())
            .or_default();
        if documents.iter().any(|existing| existing.id == document.id) {
            return Err(RepositoryError::Conflict);
        }
        documents.push(document.clone());
        Ok(document)
    }

    fn fetch(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
    ) -> Result<Option<Document>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables.documents.get(application_id).and_then(|documents| {
            documents
                .iter()
                .find(|document| &document.id == document_id)
                .cloned()
        }))
    }

    fn list(&self, application_id: &ApplicationId) -> Result<Vec<Document>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .documents
            .get(application_id)
            .cloned()
            .unwrap_or_default())
    }

    fn update(&self, document: Document) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let slot = tables
            .documents
            .get_mut(&document.application_id)
            .and_then(|documents| documents.iter_mut().find(|existing| existing.id == document.id))
            .ok_or(RepositoryError::NotFound)?;
        *slot = document;
        Ok(())
    }

    fn remove(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
    ) -> Result<Document, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let status = tables.status_of(application_id)?;
        if status != ApplicationStatus::Draft {
            return Err(RepositoryError::DocumentsLocked { status });
        }

        let documents = tables
            .documents
            .get_mut(application_id)
            .ok_or(RepositoryError::NotFound)?;
        let index = documents
            .iter()
            .position(|document| &document.id == document_id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(documents.remove(index))
    }
}

/// Ledger of confirmed payments, fed by payment-provider confirmations.
#[derive(Default, Clone)]
pub struct InMemoryPaymentLedger {
    paid: Arc<Mutex<HashSet<(ApplicationId, FeeKind)>>>,
}

impl InMemoryPaymentLedger {
    pub fn record_payment(
        &self,
        application_id: ApplicationId,
        kind: FeeKind,
    ) -> Result<(), LedgerError> {
        self.paid
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger mutex poisoned".to_string()))?
            .insert((application_id, kind));
        Ok(())
    }
}

impl PaymentLedger for InMemoryPaymentLedger {
    fn is_fee_paid(
        &self,
        application_id: &ApplicationId,
        kind: FeeKind,
    ) -> Result<bool, LedgerError> {
        let guard = self
            .paid
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger mutex poisoned".to_string()))?;
        Ok(guard.contains(&(application_id.clone(), kind)))
    }
}
