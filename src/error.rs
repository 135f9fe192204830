use thiserror::Error;

use crate::slack::PlatformError;

/// Run-level failures. Path-local platform errors never reach this type.
#[derive(Debug, Error)]
pub enum KetchupError {
    #[error("no installation for user {user_id} in team {team_id}")]
    MissingInstallation { user_id: String, team_id: String },
    #[error("no settings for user {user_id}")]
    MissingSettings { user_id: String },
    #[error("malformed summary output: {reason}")]
    MalformedSummaryOutput { reason: String, payload: String },
    #[error("summarization failed: {0}")]
    Summarization(String),
    #[error("digest delivery failed: {0}")]
    Delivery(#[source] PlatformError),
    #[error("workspace directory unavailable: {0}")]
    Directory(#[source] PlatformError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E001MissingInstallation,
    E002MissingSettings,
    E003MalformedSummary,
    E004Summarization,
    E005Delivery,
    E006Directory,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001MissingInstallation => "E001_MISSING_INSTALLATION",
            Self::E002MissingSettings => "E002_MISSING_SETTINGS",
            Self::E003MalformedSummary => "E003_MALFORMED_SUMMARY",
            Self::E004Summarization => "E004_SUMMARIZATION",
            Self::E005Delivery => "E005_DELIVERY",
            Self::E006Directory => "E006_DIRECTORY",
        }
    }
}

impl KetchupError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingInstallation { .. } => ErrorCode::E001MissingInstallation,
            Self::MissingSettings { .. } => ErrorCode::E002MissingSettings,
            Self::MalformedSummaryOutput { .. } => ErrorCode::E003MalformedSummary,
            Self::Summarization(_) => ErrorCode::E004Summarization,
            Self::Delivery(_) => ErrorCode::E005Delivery,
            Self::Directory(_) => ErrorCode::E006Directory,
        }
    }
}
