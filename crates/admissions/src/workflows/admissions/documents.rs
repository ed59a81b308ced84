use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{DocumentType, DocumentUpload, ProgramId};

pub const DEFAULT_REQUIRED_DOCUMENTS: [DocumentType; 3] = [
    DocumentType::Passport,
    DocumentType::Transcript,
    DocumentType::Diploma,
];

pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Required document types, with optional per-program overrides of the global default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequirements {
    default: BTreeSet<DocumentType>,
    per_program: BTreeMap<ProgramId, BTreeSet<DocumentType>>,
}

impl DocumentRequirements {
    pub fn new(default: impl IntoIterator<Item = DocumentType>) -> Self {
        Self {
            default: default.into_iter().collect(),
            per_program: BTreeMap::new(),
        }
    }

    pub fn with_program(
        mut self,
        program: ProgramId,
        required: impl IntoIterator<Item = DocumentType>,
    ) -> Self {
        self.per_program
            .insert(program, required.into_iter().collect());
        self
    }

    pub fn required_for(&self, program: &ProgramId) -> &BTreeSet<DocumentType> {
        self.per_program.get(program).unwrap_or(&self.default)
    }

    pub fn default_required(&self) -> &BTreeSet<DocumentType> {
        &self.default
    }
}

impl Default for DocumentRequirements {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_DOCUMENTS)
    }
}

/// Result of comparing present document types against the required set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCheck {
    pub missing: Vec<DocumentType>,
}

impl DocumentCheck {
    pub fn satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Presence gate for submission. Verification status is irrelevant here.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequirementChecker {
    requirements: DocumentRequirements,
}

impl DocumentRequirementChecker {
    pub fn new(requirements: DocumentRequirements) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &DocumentRequirements {
        &self.requirements
    }

    pub fn check(&self, program: &ProgramId, present: &BTreeSet<DocumentType>) -> DocumentCheck {
        let missing = self
            .requirements
            .required_for(program)
            .difference(present)
            .copied()
            .collect();
        DocumentCheck { missing }
    }

    pub fn required_documents_satisfied(
        &self,
        program: &ProgramId,
        present: &BTreeSet<DocumentType>,
    ) -> bool {
        self.check(program, present).satisfied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("document is empty")]
    Empty,
    #[error("document exceeds {max} bytes (found {found})")]
    TooLarge { max: u64, found: u64 },
    #[error("mime type '{0}' is not accepted")]
    UnsupportedMime(String),
    #[error("storage key is missing")]
    MissingStorageKey,
}

/// Size and content-type limits applied to upload metadata.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    max_bytes: u64,
}

impl UploadLimits {
    pub fn new(max_bytes: u64) -> Self {
        let max_bytes = if max_bytes == 0 {
            DEFAULT_MAX_DOCUMENT_BYTES
        } else {
            max_bytes
        };
        Self { max_bytes }
    }

    pub fn validate(&self, upload: &DocumentUpload) -> Result<(), UploadRejection> {
        if upload.storage_key.trim().is_empty() {
            return Err(UploadRejection::MissingStorageKey);
        }
        if upload.size_bytes == 0 {
            return Err(UploadRejection::Empty);
        }
        if upload.size_bytes > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                max: self.max_bytes,
                found: upload.size_bytes,
            });
        }

        let parsed: mime::Mime = upload
            .mime_type
            .parse()
            .map_err(|_| UploadRejection::UnsupportedMime(upload.mime_type.clone()))?;
        let accepted = parsed.essence_str() == mime::APPLICATION_PDF.essence_str()
            || parsed.type_() == mime::IMAGE
                && (parsed.subtype() == mime::JPEG || parsed.subtype() == mime::PNG);
        if !accepted {
            return Err(UploadRejection::UnsupportedMime(upload.mime_type.clone()));
        }

        Ok(())
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_BYTES)
    }
}
