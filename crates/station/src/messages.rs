#![forbid(unsafe_code)]

//! User-facing classification of everything that can go wrong at a
//! station. Conflicts are expected and retryable; structural errors point
//! the judge at re-registration; connection hiccups ask for a retry. The
//! presentation layer shows these verbatim and never decides retry policy
//! itself.

use crate::support::ts_ms_to_rfc3339;
use crate::view::ValidationError;
use hm_core::outline::OutlineError;
use hm_storage::StoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum StationError {
    Store(StoreError),
    Outline(OutlineError),
    View(ValidationError),
    NoActiveChecklist,
}

impl std::fmt::Display for StationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store: {err}"),
            Self::Outline(err) => write!(f, "outline: {err}"),
            Self::View(err) => write!(f, "view: {err}"),
            Self::NoActiveChecklist => write!(f, "no checklist is open"),
        }
    }
}

impl std::error::Error for StationError {}

impl From<StoreError> for StationError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<OutlineError> for StationError {
    fn from(value: OutlineError) -> Self {
        Self::Outline(value)
    }
}

impl From<ValidationError> for StationError {
    fn from(value: ValidationError) -> Self {
        Self::View(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message ready for a modal dialog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub retryable: bool,
}

pub(crate) fn conflict_message(err: &StoreError) -> UserMessage {
    if let StoreError::TeamLocked {
        holder_station,
        expires_at_ms,
        ..
    } = err
    {
        return UserMessage {
            title: "Team busy".to_string(),
            body: format!(
                "The team is being edited at station {holder_station} \
                 (lock held until {}). Wait until it finishes to continue.",
                ts_ms_to_rfc3339(*expires_at_ms)
            ),
            severity: Severity::Warning,
            retryable: true,
        };
    }
    UserMessage {
        title: "Team busy".to_string(),
        body: "The team is being edited at another station. \
               Wait until it finishes to continue."
            .to_string(),
        severity: Severity::Warning,
        retryable: true,
    }
}

impl StationError {
    pub fn user_message(&self) -> UserMessage {
        match self {
            Self::Store(err @ StoreError::TeamLocked { .. }) => conflict_message(err),
            Self::Store(StoreError::LeaseNotHeld { .. }) => UserMessage {
                title: "Edit session expired".to_string(),
                body: "The edit lock on this team lapsed. \
                       Reopen the checklist and apply the changes again."
                    .to_string(),
                severity: Severity::Warning,
                retryable: true,
            },
            Self::Store(StoreError::Integrity { .. }) | Self::Outline(_) => UserMessage {
                title: "Data error".to_string(),
                body: "The team's checklist data is inconsistent. \
                       Re-register the team to continue."
                    .to_string(),
                severity: Severity::Error,
                retryable: false,
            },
            Self::Store(StoreError::NotRegistered { .. }) => UserMessage {
                title: "Team not registered".to_string(),
                body: "Register the team before reviewing its checklist.".to_string(),
                severity: Severity::Info,
                retryable: false,
            },
            Self::Store(StoreError::StaleRow { .. }) => UserMessage {
                title: "List changed".to_string(),
                body: "The team list changed under you. Pick the row again.".to_string(),
                severity: Severity::Warning,
                retryable: true,
            },
            Self::Store(StoreError::Sql(_)) | Self::Store(StoreError::Io(_)) => UserMessage {
                title: "Connection problem".to_string(),
                body: "The operation could not reach the database. Try again.".to_string(),
                severity: Severity::Warning,
                retryable: true,
            },
            Self::Store(_) | Self::View(_) => UserMessage {
                title: "Operation failed".to_string(),
                body: self.to_string(),
                severity: Severity::Error,
                retryable: false,
            },
            Self::NoActiveChecklist => UserMessage {
                title: "No checklist open".to_string(),
                body: "Open a team's checklist first.".to_string(),
                severity: Severity::Warning,
                retryable: false,
            },
        }
    }
}
