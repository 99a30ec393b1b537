//! Core data types for registry items and session outcomes.

use serde::{Deserialize, Serialize};

/// A single candidate entry in the remote registry.
///
/// The check digit is derived from the realm code and serial number and is
/// never set independently; construct items through [`RegistryItem::new`]
/// or the [`crate::generator::ItemGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryItem {
    /// Registry partition code, constant per run (e.g. `OL1O`).
    pub realm_code: String,
    /// Zero-padded 8-digit decimal serial.
    pub serial_number: String,
    /// Single decimal check digit over `realm_code ++ serial_number`.
    pub check_digit: String,
}

impl RegistryItem {
    /// Build an item, computing the check digit for the given realm code
    /// and serial.
    pub fn new(realm_code: &str, serial_number: &str) -> CoreResult<Self> {
        let digit = crate::checksum::check_digit(realm_code, serial_number)?;
        Ok(Self {
            realm_code: realm_code.to_string(),
            serial_number: serial_number.to_string(),
            check_digit: digit.to_string(),
        })
    }

    /// The full identifier in `REALM/SERIAL/DIGIT` form.
    pub fn identifier(&self) -> String {
        format!(
            "{}/{}/{}",
            self.realm_code, self.serial_number, self.check_digit
        )
    }
}

impl std::fmt::Display for RegistryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Result of driving one item through a remote session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The record exists and its rendered content was extracted.
    Found { artifact: String },
    /// The remote system reported no such record.
    NotFound,
    /// The session failed before reaching a terminal answer.
    Failed { kind: FailureKind, detail: String },
}

impl SessionOutcome {
    /// Shorthand constructor for a failed outcome.
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Stable lowercase label, used in logs and the outcome journal.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found { .. } => "found",
            Self::NotFound => "not_found",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Why a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A remote step exceeded its wait budget, or the whole session its
    /// wall-clock budget.
    Timeout,
    /// A remote interaction call itself errored.
    Interaction,
    /// The run was cancelled while the session was in flight.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Interaction => write!(f, "interaction"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors from the enumeration core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// A character outside the 34-entry value table.
    #[error("invalid character '{ch}' at position {position} in \"{input}\"")]
    InvalidCharacter {
        ch: char,
        position: usize,
        input: String,
    },
}

/// Convenience result type.
pub type CoreResult<T> = Result<T, CoreError>;
