use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for admission applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role the caller acts in. Authentication happens upstream; the core only trusts this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Student,
    Admin,
}

/// Caller context passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn student(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            role: ActorRole::Student,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    DocumentsRequested,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::DocumentsRequested,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::DocumentsRequested => "documents_requested",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Enumerated kinds of supporting documents an applicant can upload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    Transcript,
    Diploma,
    LanguageCertificate,
    Cv,
    RecommendationLetter,
    Other,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Passport => "passport",
            DocumentType::Transcript => "transcript",
            DocumentType::Diploma => "diploma",
            DocumentType::LanguageCertificate => "language_certificate",
            DocumentType::Cv => "cv",
            DocumentType::RecommendationLetter => "recommendation_letter",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document type '{0}'")]
pub struct UnknownDocumentType(pub String);

impl FromStr for DocumentType {
    type Err = UnknownDocumentType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "passport" => Ok(DocumentType::Passport),
            "transcript" => Ok(DocumentType::Transcript),
            "diploma" => Ok(DocumentType::Diploma),
            "language_certificate" => Ok(DocumentType::LanguageCertificate),
            "cv" => Ok(DocumentType::Cv),
            "recommendation_letter" => Ok(DocumentType::RecommendationLetter),
            "other" => Ok(DocumentType::Other),
            other => Err(UnknownDocumentType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// Uploaded artifact belonging to exactly one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub document_type: DocumentType,
    pub verification: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub storage_key: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Metadata for an upload; the bytes themselves live in the external storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub storage_key: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// Admin verdict on an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DocumentDecision {
    Verify,
    Reject { reason: String },
}

/// Applicant-owned fields. Frozen once the application leaves draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDetails {
    #[serde(default)]
    pub personal_statement: Option<String>,
    #[serde(default)]
    pub intended_start_term: Option<String>,
    #[serde(default)]
    pub previous_institution: Option<String>,
}

/// Partial update of applicant fields; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationUpdate {
    #[serde(default)]
    pub personal_statement: Option<String>,
    #[serde(default)]
    pub intended_start_term: Option<String>,
    #[serde(default)]
    pub previous_institution: Option<String>,
}

impl ApplicationUpdate {
    pub fn is_empty(&self) -> bool {
        self.personal_statement.is_none()
            && self.intended_start_term.is_none()
            && self.previous_institution.is_none()
    }

    pub fn apply_to(self, details: &mut ApplicationDetails) {
        if let Some(statement) = self.personal_statement {
            details.personal_statement = Some(statement);
        }
        if let Some(term) = self.intended_start_term {
            details.intended_start_term = Some(term);
        }
        if let Some(institution) = self.previous_institution {
            details.previous_institution = Some(institution);
        }
    }
}

/// One student's request to join one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub owner_id: UserId,
    pub program_id: ProgramId,
    pub status: ApplicationStatus,
    pub details: ApplicationDetails,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub reviewer_id: Option<UserId>,
    pub review_notes: Option<String>,
}

impl Application {
    pub fn new_draft(
        id: ApplicationId,
        owner_id: UserId,
        program_id: ProgramId,
        details: ApplicationDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            program_id,
            status: ApplicationStatus::Draft,
            details,
            created_at: now,
            submitted_at: None,
            reviewed_at: None,
            updated_at: now,
            reviewer_id: None,
            review_notes: None,
        }
    }

    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        self.owner_id == actor.id
    }
}

/// Monetary obligations tracked by the payment ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Application,
    Commitment,
}

impl FeeKind {
    pub const fn label(self) -> &'static str {
        match self {
            FeeKind::Application => "application",
            FeeKind::Commitment => "commitment",
        }
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
