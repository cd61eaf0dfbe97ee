use serde::Serialize;

/// Stable error codes for embedding applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
    Timeout = 30,
    Cancelled = 31,
    ConfigError = 70,
    InternalError = 90,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
