use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AdmissionsConfig;

use super::documents::{DocumentRequirementChecker, UploadLimits};
use super::domain::{
    Actor, ActorRole, Application, ApplicationDetails, ApplicationId, ApplicationStatus,
    ApplicationUpdate, Document, DocumentDecision, DocumentId, DocumentType, DocumentUpload,
    FeeKind, ProgramId, VerificationStatus,
};
use super::fees::{FeePaymentGate, LedgerError, PaymentLedger};
use super::history::StatusHistoryEntry;
use super::lifecycle::{self, StatusTransition};
use super::notifications::{NotificationPublisher, StatusChangeNotice};
use super::repository::{ApplicationRepository, DocumentStore, RepositoryError, StatusChange};

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// Read-only preview of whether a submission would pass both gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReadiness {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub satisfied: bool,
    pub missing_documents: Vec<DocumentType>,
    pub fee_paid: bool,
}

/// Service composing the document gate, fee gate, lifecycle table, storage and notifications.
pub struct AdmissionsService<R, D, L, N> {
    repository: Arc<R>,
    documents: Arc<D>,
    fee_gate: FeePaymentGate<L>,
    checker: DocumentRequirementChecker,
    upload_limits: UploadLimits,
    notifier: Arc<N>,
}

impl<R, D, L, N> AdmissionsService<R, D, L, N>
where
    R: ApplicationRepository + 'static,
    D: DocumentStore + 'static,
    L: PaymentLedger + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        documents: Arc<D>,
        ledger: Arc<L>,
        notifier: Arc<N>,
        config: &AdmissionsConfig,
    ) -> Self {
        Self {
            repository,
            documents,
            fee_gate: FeePaymentGate::new(ledger),
            checker: DocumentRequirementChecker::new(config.requirements.clone()),
            upload_limits: UploadLimits::new(config.max_document_bytes),
            notifier,
        }
    }

    /// Open a new draft owned by the calling student.
    pub fn create_draft(
        &self,
        actor: &Actor,
        program_id: ProgramId,
        details: ApplicationDetails,
    ) -> Result<Application, ApplicationServiceError> {
        if actor.role != ActorRole::Student {
            return Err(ApplicationServiceError::Unauthorized {
                action: "create applications",
            });
        }
        if program_id.0.trim().is_empty() {
            return Err(ApplicationServiceError::MissingProgram);
        }

        let application = Application::new_draft(
            next_application_id(),
            actor.id.clone(),
            program_id,
            details,
            Utc::now(),
        );
        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id,
            owner_id = %stored.owner_id,
            "draft application created"
        );
        Ok(stored)
    }

    /// Edit applicant fields. Only the owner, only while draft, all fields or none.
    pub fn update_draft(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        update: ApplicationUpdate,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self.load(application_id)?;
        if application.status != ApplicationStatus::Draft {
            return Err(ApplicationServiceError::NotEditable {
                status: application.status,
            });
        }
        ensure_owner(&application, actor, "edit")?;
        if update.is_empty() {
            return Err(ApplicationServiceError::EmptyUpdate);
        }

        self.repository
            .update_draft(application_id, update, Utc::now())
            .map_err(|err| guard_error(err, application_id))
    }

    /// Delete a draft and its documents in one step. Anything past draft is kept for the record.
    pub fn destroy(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<(), ApplicationServiceError> {
        let application = self.load(application_id)?;
        if application.status != ApplicationStatus::Draft {
            return Err(ApplicationServiceError::InvalidState {
                status: application.status,
                action: "delete".to_string(),
            });
        }
        ensure_owner(&application, actor, "delete")?;

        let removed = self
            .repository
            .delete_draft(application_id)
            .map_err(|err| guard_error(err, application_id))?;
        info!(
            %application_id,
            documents_removed = removed.documents_removed,
            "draft application deleted"
        );
        Ok(())
    }

    /// Move a draft to submitted once both gates pass.
    ///
    /// Gates run in order (documents, then fee) and the first failure aborts with no write.
    /// The status write and its history row commit together behind a draft guard that also
    /// re-checks the required documents, so only one of several racing submissions can win and
    /// a document removed mid-submission blocks the commit.
    pub fn submit(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self.load(application_id)?;
        if actor.role != StatusTransition::Submit.performed_by() {
            return Err(ApplicationServiceError::Unauthorized { action: "submit" });
        }
        ensure_owner(&application, actor, "submit")?;

        let transition = lifecycle::validate_transition(
            application.status,
            ApplicationStatus::Submitted,
        )
        .map_err(|_| ApplicationServiceError::InvalidState {
            status: application.status,
            action: "submit".to_string(),
        })?;

        let present = self.documents.list_document_types(application_id)?;
        let check = self.checker.check(&application.program_id, &present);
        if !check.satisfied() {
            warn!(%application_id, missing = ?check.missing, "submission blocked on documents");
            return Err(ApplicationServiceError::MissingDocuments(check.missing));
        }

        if !self.fee_gate.application_fee_paid(application_id)? {
            warn!(%application_id, "submission blocked on unpaid application fee");
            return Err(ApplicationServiceError::FeeUnpaid {
                kind: FeeKind::Application,
            });
        }

        let required = self
            .checker
            .requirements()
            .required_for(&application.program_id)
            .clone();
        let change = StatusChange::new(transition, Utc::now()).requiring_documents(required);
        self.commit(&application, transition, actor, None, Some(change))
    }

    /// Preview the submission gates without touching state.
    pub fn can_submit(
        &self,
        application_id: &ApplicationId,
    ) -> Result<SubmissionReadiness, ApplicationServiceError> {
        let application = self.load(application_id)?;
        let present = self.documents.list_document_types(application_id)?;
        let check = self.checker.check(&application.program_id, &present);
        let fee_paid = self.fee_gate.application_fee_paid(application_id)?;

        debug!(%application_id, missing = ?check.missing, fee_paid, "submission readiness");
        Ok(SubmissionReadiness {
            application_id: application.id,
            status: application.status,
            satisfied: check.satisfied() && fee_paid,
            missing_documents: check.missing,
            fee_paid,
        })
    }

    /// Admin-driven move along the review branch of the lifecycle graph.
    pub fn transition(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        target: ApplicationStatus,
        comment: Option<String>,
    ) -> Result<Application, ApplicationServiceError> {
        if !actor.is_admin() {
            return Err(ApplicationServiceError::Unauthorized {
                action: "change application status",
            });
        }
        let application = self.load(application_id)?;
        let transition = lifecycle::validate_transition(application.status, target).map_err(
            |_| ApplicationServiceError::InvalidState {
                status: application.status,
                action: format!("move to {target}"),
            },
        )?;
        if transition.performed_by() != ActorRole::Admin {
            return Err(ApplicationServiceError::Unauthorized {
                action: "submit on behalf of the applicant",
            });
        }

        self.commit(
            &application,
            transition,
            actor,
            comment,
            Some(StatusChange::new(transition, Utc::now()).reviewed_by(actor.id.clone())),
        )
    }

    /// Record reviewer notes on an application already in review territory.
    pub fn annotate(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        notes: String,
    ) -> Result<Application, ApplicationServiceError> {
        if !actor.is_admin() {
            return Err(ApplicationServiceError::Unauthorized {
                action: "annotate applications",
            });
        }
        let application = self.load(application_id)?;
        if application.status == ApplicationStatus::Draft {
            return Err(ApplicationServiceError::InvalidState {
                status: application.status,
                action: "annotate".to_string(),
            });
        }

        let stored = self
            .repository
            .annotate(application_id, actor.id.clone(), notes, Utc::now())
            .map_err(|err| guard_error(err, application_id))?;
        Ok(stored)
    }

    /// Attach document metadata. Allowed while drafting and while documents are requested.
    pub fn upload_document(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        upload: DocumentUpload,
    ) -> Result<Document, ApplicationServiceError> {
        let application = self.load(application_id)?;
        if !matches!(
            application.status,
            ApplicationStatus::Draft | ApplicationStatus::DocumentsRequested
        ) {
            return Err(ApplicationServiceError::NotEditable {
                status: application.status,
            });
        }
        ensure_owner(&application, actor, "upload documents to")?;
        self.upload_limits
            .validate(&upload)
            .map_err(|err| ApplicationServiceError::InvalidDocument(err.to_string()))?;

        let document = Document {
            id: next_document_id(),
            application_id: application.id.clone(),
            document_type: upload.document_type,
            verification: VerificationStatus::Pending,
            rejection_reason: None,
            storage_key: upload.storage_key,
            size_bytes: upload.size_bytes,
            mime_type: upload.mime_type,
            uploaded_at: Utc::now(),
        };
        let stored = self.documents.insert(document).map_err(|err| match err {
            RepositoryError::NotFound => ApplicationServiceError::NotFound(application_id.clone()),
            RepositoryError::DocumentsLocked { status } => {
                ApplicationServiceError::NotEditable { status }
            }
            other => ApplicationServiceError::Repository(other),
        })?;
        info!(
            %application_id,
            document_id = %stored.id,
            document_type = %stored.document_type,
            "document uploaded"
        );
        Ok(stored)
    }

    pub fn remove_document(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
        actor: &Actor,
    ) -> Result<Document, ApplicationServiceError> {
        let application = self.load(application_id)?;
        if application.status != ApplicationStatus::Draft {
            return Err(ApplicationServiceError::InvalidState {
                status: application.status,
                action: "remove documents from".to_string(),
            });
        }
        ensure_owner(&application, actor, "remove documents from")?;

        self.documents
            .remove(application_id, document_id)
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    ApplicationServiceError::DocumentNotFound(document_id.clone())
                }
                RepositoryError::DocumentsLocked { status } => {
                    ApplicationServiceError::InvalidState {
                        status,
                        action: "remove documents from".to_string(),
                    }
                }
                other => ApplicationServiceError::Repository(other),
            })
    }

    /// Verify or reject an uploaded document. Rejections must carry a reason.
    pub fn review_document(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
        actor: &Actor,
        decision: DocumentDecision,
    ) -> Result<Document, ApplicationServiceError> {
        if !actor.is_admin() {
            return Err(ApplicationServiceError::Unauthorized {
                action: "review documents",
            });
        }
        self.load(application_id)?;
        let mut document = self
            .documents
            .fetch(application_id, document_id)?
            .ok_or_else(|| ApplicationServiceError::DocumentNotFound(document_id.clone()))?;

        match decision {
            DocumentDecision::Verify => {
                document.verification = VerificationStatus::Verified;
                document.rejection_reason = None;
            }
            DocumentDecision::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(ApplicationServiceError::InvalidDocument(
                        "a rejection reason is required".to_string(),
                    ));
                }
                document.verification = VerificationStatus::Rejected;
                document.rejection_reason = Some(reason.to_string());
            }
        }

        self.documents.update(document.clone())?;
        info!(
            %application_id,
            %document_id,
            verification = ?document.verification,
            reviewer_id = %actor.id,
            "document reviewed"
        );
        Ok(document)
    }

    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        self.load(application_id)
    }

    pub fn documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<Document>, ApplicationServiceError> {
        self.load(application_id)?;
        Ok(self.documents.list(application_id)?)
    }

    pub fn history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApplicationServiceError> {
        self.load(application_id)?;
        Ok(self.repository.history(application_id)?)
    }

    fn load(&self, application_id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.repository
            .fetch(application_id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(application_id.clone()))
    }

    fn commit(
        &self,
        application: &Application,
        transition: StatusTransition,
        actor: &Actor,
        comment: Option<String>,
        change: Option<StatusChange>,
    ) -> Result<Application, ApplicationServiceError> {
        let change = change.unwrap_or_else(|| StatusChange::new(transition, Utc::now()));
        let entry = StatusHistoryEntry::for_transition(
            application.id.clone(),
            transition,
            actor.id.clone(),
            comment,
            change.at,
        );

        let updated = self
            .repository
            .transition(&application.id, change, entry.clone())
            .map_err(|err| guard_error(err, &application.id))?;

        info!(
            application_id = %updated.id,
            from = %entry.from,
            to = %entry.to,
            actor_id = %actor.id,
            "application status changed"
        );
        self.announce(&updated, entry);
        Ok(updated)
    }

    fn announce(&self, application: &Application, entry: StatusHistoryEntry) {
        let notice = StatusChangeNotice {
            application_id: application.id.clone(),
            owner_id: application.owner_id.clone(),
            from: entry.from,
            to: entry.to,
            comment: entry.comment,
            occurred_at: entry.recorded_at,
        };

        if let Err(err) = self.notifier.publish(notice) {
            warn!(application_id = %application.id, error = %err, "status notice not queued");
        }
    }
}

fn ensure_owner(
    application: &Application,
    actor: &Actor,
    action: &'static str,
) -> Result<(), ApplicationServiceError> {
    if application.is_owned_by(actor) {
        Ok(())
    } else {
        warn!(
            application_id = %application.id,
            actor_id = %actor.id,
            action,
            "actor does not own application"
        );
        Err(ApplicationServiceError::Unauthorized { action })
    }
}

fn guard_error(err: RepositoryError, application_id: &ApplicationId) -> ApplicationServiceError {
    match err {
        RepositoryError::StatusMismatch { .. } => ApplicationServiceError::ConcurrentModification,
        RepositoryError::NotFound => ApplicationServiceError::NotFound(application_id.clone()),
        RepositoryError::MissingDocuments(missing) => {
            ApplicationServiceError::MissingDocuments(missing)
        }
        other => ApplicationServiceError::Repository(other),
    }
}

fn join_types(types: &[DocumentType]) -> String {
    types
        .iter()
        .map(|document_type| document_type.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error raised by the admissions service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("not permitted to {action} this application")]
    Unauthorized { action: &'static str },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("cannot {action} an application that is {status}")]
    InvalidState {
        status: ApplicationStatus,
        action: String,
    },
    #[error("application is {status} and can no longer be edited")]
    NotEditable { status: ApplicationStatus },
    #[error("missing required documents: {}", join_types(.0))]
    MissingDocuments(Vec<DocumentType>),
    #[error("the {kind} fee has not been paid")]
    FeeUnpaid { kind: FeeKind },
    #[error("application was modified concurrently; reload and try again")]
    ConcurrentModification,
    #[error("a program must be selected")]
    MissingProgram,
    #[error("an update must change at least one field")]
    EmptyUpdate,
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
