use std::error::Error;
use std::fmt;

use crate::codec::ValidationError;
use crate::parser::ParseError;
use crate::patch::PatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    NotFound,
    Backup,
    Write,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(
            CoreErrorCode::NotFound,
            format!("monster {name:?} not found"),
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}

impl From<ParseError> for CoreError {
    fn from(err: ParseError) -> Self {
        Self::new(CoreErrorCode::Parse, err.to_string())
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        Self::new(CoreErrorCode::Validation, err.to_string())
    }
}

impl From<PatchError> for CoreError {
    fn from(err: PatchError) -> Self {
        let code = match err {
            PatchError::Read { .. } => CoreErrorCode::Io,
            PatchError::NotFound(_) => CoreErrorCode::NotFound,
            PatchError::Backup { .. } => CoreErrorCode::Backup,
            PatchError::Write { .. } => CoreErrorCode::Write,
        };
        Self::new(code, err.to_string())
    }
}
