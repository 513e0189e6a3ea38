//! Failure taxonomy shared by every module's error type.
//!
//! Callers branch on `failure_kind()` rather than on concrete variants when
//! they only need to decide the user-facing reaction.

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response was received.
    Network,
    /// 401/403 on an authenticated call. Always resolves to logout.
    Authentication,
    /// 4xx rejection, usually with a server-supplied message.
    Validation,
    /// A domain rule rejected the operation (e.g. insufficient balance).
    Domain,
    /// Local fault: storage, parsing, missing session.
    Internal,
}

/// Stable machine-readable codes for errors.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;

    fn failure_kind(&self) -> FailureKind;

    fn retryable(&self) -> bool {
        matches!(self.failure_kind(), FailureKind::Network)
    }
}
