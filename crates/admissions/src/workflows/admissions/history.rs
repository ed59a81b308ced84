use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus, UserId};
use super::lifecycle::StatusTransition;

pub const SUBMISSION_COMMENT: &str = "Application submitted by applicant";

/// Append-only audit row for one status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub application_id: ApplicationId,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub comment: String,
    pub actor_id: UserId,
    pub recorded_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn for_transition(
        application_id: ApplicationId,
        transition: StatusTransition,
        actor_id: UserId,
        comment: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let comment = comment
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| default_comment(transition).to_string());

        Self {
            application_id,
            from: transition.from_status(),
            to: transition.to_status(),
            comment,
            actor_id,
            recorded_at,
        }
    }
}

fn default_comment(transition: StatusTransition) -> &'static str {
    match transition {
        StatusTransition::Submit => SUBMISSION_COMMENT,
        StatusTransition::StartReview => "Review started",
        StatusTransition::RequestDocuments => "Additional documents requested",
        StatusTransition::ResumeReview => "Review resumed",
        StatusTransition::Approve => "Application approved",
        StatusTransition::Reject => "Application rejected",
    }
}
