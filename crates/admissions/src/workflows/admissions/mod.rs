//! Admission application lifecycle: drafting, document and fee gating, submission, review.

pub mod documents;
pub mod domain;
pub mod fees;
pub mod history;
pub mod lifecycle;
pub mod memory;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use documents::{DocumentCheck, DocumentRequirementChecker, DocumentRequirements, UploadLimits};
pub use domain::{
    Actor, ActorRole, Application, ApplicationDetails, ApplicationId, ApplicationStatus,
    ApplicationUpdate, Document, DocumentDecision, DocumentId, DocumentType, DocumentUpload,
    FeeKind, ProgramId, UserId, VerificationStatus,
};
pub use fees::{FeePaymentGate, LedgerError, PaymentLedger};
pub use history::StatusHistoryEntry;
pub use lifecycle::StatusTransition;
pub use memory::{InMemoryApplicationRepository, InMemoryDocumentStore, InMemoryPaymentLedger};
pub use notifications::{
    DeliveryStats, DeliveryWorker, LogNotificationSink, NotificationError, NotificationPublisher,
    NotificationQueue, NotificationSink, RetryPolicy, StatusChangeNotice,
};
pub use repository::{ApplicationRepository, DocumentStore, RepositoryError, StatusChange};
pub use router::application_router;
pub use service::{AdmissionsService, ApplicationServiceError, SubmissionReadiness};
