//! Application status graph.
//!
//! `draft → submitted → under_review → {approved, rejected}` with the side branch
//! `under_review ⇄ documents_requested`. Every legal edge is a named [`StatusTransition`];
//! anything not in the table is rejected.

use serde::{Deserialize, Serialize};

use super::domain::{ActorRole, ApplicationStatus};

/// Named edges of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTransition {
    Submit,
    StartReview,
    RequestDocuments,
    ResumeReview,
    Approve,
    Reject,
}

impl StatusTransition {
    pub const fn from_status(self) -> ApplicationStatus {
        match self {
            StatusTransition::Submit => ApplicationStatus::Draft,
            StatusTransition::StartReview => ApplicationStatus::Submitted,
            StatusTransition::RequestDocuments => ApplicationStatus::UnderReview,
            StatusTransition::ResumeReview => ApplicationStatus::DocumentsRequested,
            StatusTransition::Approve | StatusTransition::Reject => ApplicationStatus::UnderReview,
        }
    }

    pub const fn to_status(self) -> ApplicationStatus {
        match self {
            StatusTransition::Submit => ApplicationStatus::Submitted,
            StatusTransition::StartReview | StatusTransition::ResumeReview => {
                ApplicationStatus::UnderReview
            }
            StatusTransition::RequestDocuments => ApplicationStatus::DocumentsRequested,
            StatusTransition::Approve => ApplicationStatus::Approved,
            StatusTransition::Reject => ApplicationStatus::Rejected,
        }
    }

    /// Role permitted to drive this edge.
    pub const fn performed_by(self) -> ActorRole {
        match self {
            StatusTransition::Submit => ActorRole::Student,
            _ => ActorRole::Admin,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            StatusTransition::Submit => "submit",
            StatusTransition::StartReview => "start_review",
            StatusTransition::RequestDocuments => "request_documents",
            StatusTransition::ResumeReview => "resume_review",
            StatusTransition::Approve => "approve",
            StatusTransition::Reject => "reject",
        }
    }
}

const TRANSITIONS: [StatusTransition; 6] = [
    StatusTransition::Submit,
    StatusTransition::StartReview,
    StatusTransition::RequestDocuments,
    StatusTransition::ResumeReview,
    StatusTransition::Approve,
    StatusTransition::Reject,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

/// Targets reachable from `from`. Terminal statuses return an empty list.
pub fn valid_transitions(from: ApplicationStatus) -> Vec<ApplicationStatus> {
    TRANSITIONS
        .iter()
        .filter(|transition| transition.from_status() == from)
        .map(|transition| transition.to_status())
        .collect()
}

pub fn can_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    find_transition(from, to).is_some()
}

/// Resolve the named edge for `from -> to`, or explain why it is not allowed.
pub fn validate_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<StatusTransition, IllegalTransition> {
    find_transition(from, to).ok_or(IllegalTransition { from, to })
}

fn find_transition(from: ApplicationStatus, to: ApplicationStatus) -> Option<StatusTransition> {
    TRANSITIONS
        .iter()
        .copied()
        .find(|transition| transition.from_status() == from && transition.to_status() == to)
}
