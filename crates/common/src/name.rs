// Workspace name grammar: `^[a-z][a-z0-9-]*$`, case-insensitive.

use thiserror::Error;

/// Maximum allowed workspace name length in characters.
const MAX_NAME_CHARS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("workspace name is empty")]
    Empty,

    #[error("workspace name exceeds maximum length of {MAX_NAME_CHARS} characters")]
    TooLong,

    #[error("workspace name must start with a letter: {0}")]
    InvalidStart(String),

    #[error("workspace name contains invalid character {1:?}: {0}")]
    InvalidCharacter(String, char),
}

/// Validate a workspace name against the addressing grammar.
///
/// The name becomes the host part of `workspace://<name>/`, so it must be a
/// letter followed by letters, digits or hyphens.
pub fn validate_workspace_name(name: &str) -> Result<(), NameError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(NameError::Empty);
    };

    if !first.is_ascii_alphabetic() {
        return Err(NameError::InvalidStart(name.to_string()));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '-')) {
        return Err(NameError::InvalidCharacter(name.to_string(), bad));
    }

    if name.len() > MAX_NAME_CHARS {
        return Err(NameError::TooLong);
    }

    Ok(())
}

pub fn is_valid_workspace_name(name: &str) -> bool {
    validate_workspace_name(name).is_ok()
}

/// The stored form of a workspace name. Names compare case-insensitively and
/// hosts arrive lowercased, so everything is keyed on the lowercase spelling.
pub fn canonical_workspace_name(name: &str) -> String {
    name.to_ascii_lowercase()
}
