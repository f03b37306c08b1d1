use std::fmt;

use thiserror::Error;

/// Failures scoped to a single card operation. None of them are fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("{field} is required")]
    Validation { field: &'static str },

    #[error("{command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl CardError {
    /// Text shown to the user in the open editor or an alert.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { field } => format!("{field} is required."),
            Self::Command { source, .. } => format!("Save failed: {source}"),
            Self::NotFound { kind, id } => format!("{kind} {id} no longer exists."),
        }
    }
}

/// Rejection reported by the external command layer. The message is optional
/// because hosts do not always provide one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandError {
    pub message: Option<String>,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => f.write_str(message),
            _ => f.write_str("unknown error"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{CardError, CommandError};

    #[test]
    fn command_error_falls_back_to_generic_text() {
        assert_eq!(CommandError::default().to_string(), "unknown error");
        assert_eq!(CommandError::new("  ").to_string(), "unknown error");
        assert_eq!(CommandError::new("backend offline").to_string(), "backend offline");
    }

    #[test]
    fn user_messages() {
        let err = CardError::Command {
            command: "create_todo",
            source: CommandError::new("backend offline"),
        };
        assert_eq!(err.to_string(), "create_todo failed: backend offline");
        assert_eq!(err.user_message(), "Save failed: backend offline");
        assert_eq!(
            CardError::Validation { field: "Title" }.user_message(),
            "Title is required."
        );
    }
}
