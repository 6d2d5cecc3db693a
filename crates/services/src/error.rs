//! Shared error types for the services crate.
//!
//! Every server-facing operation resolves to `Result<Outcome, OperationError>`
//! where the error carries a machine-readable kind, a plain-language message
//! and, for consistency faults, the computed repair hint. Raw collaborator
//! error text never reaches the user; it is only inspected to refine the kind.

use thiserror::Error;

use coach_core::validation::{FaultKind, RepairAction};
use storage::StorageError;

/// Machine-readable error classification for the operation envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    NoActiveProgram,
    NotFound,
    Validation,
    AlreadyAssigned,
    CorruptedProgress,
    MilestoneIndexInvalid,
    DayIndexInvalid,
    ProgramStructureChanged,
    SystemError,
}

impl ErrorKind {
    /// Stable snake_case token for transport and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::NoActiveProgram => "no_active_program",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::AlreadyAssigned => "already_assigned",
            ErrorKind::CorruptedProgress => "corrupted_progress",
            ErrorKind::MilestoneIndexInvalid => "milestone_index_invalid",
            ErrorKind::DayIndexInvalid => "day_index_invalid",
            ErrorKind::ProgramStructureChanged => "program_structure_changed",
            ErrorKind::SystemError => "system_error",
        }
    }

    /// True for consistency faults the repair engine can usually fix.
    #[must_use]
    pub fn is_consistency(self) -> bool {
        matches!(
            self,
            ErrorKind::CorruptedProgress
                | ErrorKind::MilestoneIndexInvalid
                | ErrorKind::DayIndexInvalid
                | ErrorKind::ProgramStructureChanged
        )
    }
}

impl From<FaultKind> for ErrorKind {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::CorruptedProgress => ErrorKind::CorruptedProgress,
            FaultKind::MilestoneIndexInvalid => ErrorKind::MilestoneIndexInvalid,
            FaultKind::DayIndexInvalid => ErrorKind::DayIndexInvalid,
            FaultKind::ProgramStructureChanged => ErrorKind::ProgramStructureChanged,
        }
    }
}

/// Classify a raw collaborator error message without surfacing it.
///
/// The message is matched for well-known substrings only; the text itself is
/// discarded in favour of our own wording.
#[must_use]
pub fn classify_server_message(raw: &str) -> ErrorKind {
    let lowered = raw.to_lowercase();
    if lowered.contains("unauthorized") || lowered.contains("unauthenticated") {
        ErrorKind::Authentication
    } else if lowered.contains("duplicate") {
        ErrorKind::AlreadyAssigned
    } else if lowered.contains("not found") {
        ErrorKind::NotFound
    } else {
        ErrorKind::SystemError
    }
}

/// Failure envelope for a server-facing operation.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
    /// Repair guidance, attached when a consistency fault was diagnosed.
    pub repair: Option<RepairAction>,
}

impl OperationError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            repair: None,
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn no_active_program() -> Self {
        Self::new(
            ErrorKind::NoActiveProgram,
            "You have no active program. Pick one to start training.",
        )
    }

    #[must_use]
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SystemError, message)
    }

    #[must_use]
    pub fn with_repair(mut self, repair: RepairAction) -> Self {
        self.repair = Some(repair);
        self
    }
}

impl From<StorageError> for OperationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => OperationError::new(
                ErrorKind::NotFound,
                "The requested program or record could not be found.",
            ),
            StorageError::Conflict => OperationError::new(
                ErrorKind::AlreadyAssigned,
                "That change was already recorded.",
            ),
            // backend text is inspected to refine the kind but never shown
            // verbatim to the user
            StorageError::Unavailable(raw) => {
                let kind = classify_server_message(&raw);
                tracing::debug!(error = %raw, "storage backend unavailable");
                let message = match kind {
                    ErrorKind::Authentication => "Your session has expired. Please sign in again.",
                    ErrorKind::AlreadyAssigned => "That change was already recorded.",
                    ErrorKind::NotFound => {
                        "The requested program or record could not be found."
                    }
                    _ => "Something went wrong talking to the server. Please try again.",
                };
                OperationError::new(kind, message)
            }
            other => OperationError::system(format!("storage operation failed: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_tokens() {
        assert_eq!(ErrorKind::NoActiveProgram.as_str(), "no_active_program");
        assert_eq!(ErrorKind::DayIndexInvalid.as_str(), "day_index_invalid");
        assert!(ErrorKind::DayIndexInvalid.is_consistency());
        assert!(!ErrorKind::Validation.is_consistency());
    }

    #[test]
    fn server_messages_are_classified_not_forwarded() {
        assert_eq!(
            classify_server_message("401 Unauthorized: bad token xyz"),
            ErrorKind::Authentication
        );
        assert_eq!(
            classify_server_message("duplicate key value violates constraint"),
            ErrorKind::AlreadyAssigned
        );
        assert_eq!(
            classify_server_message("connection reset by peer"),
            ErrorKind::SystemError
        );
    }

    #[test]
    fn storage_not_found_maps_to_not_found_kind() {
        let err: OperationError = StorageError::NotFound.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.repair.is_none());
    }
}
