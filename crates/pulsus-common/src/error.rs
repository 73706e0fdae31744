//! The closed set of error kinds every stage can produce (spec §7).
//!
//! Unlike the teacher's `RunError`, which classifies errors after the
//! fact from a free-form message (it wraps arbitrary subprocess/LLM
//! output it does not control), Pulsus controls every call site that can
//! raise one of these, so each variant is constructed directly with its
//! structured fields rather than pattern-matched out of a string.

use thiserror::Error;

/// Stable kind for every user-visible or logged failure (spec §7 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NoCandidates,
    PolicyBlocked,
    GeneratorFailure,
    ValidationFailure,
    SandboxTimeout,
    SandboxResourceExhaustion,
    RegistryError,
    LoggerError,
    InternalError,
}

impl ErrorKind {
    /// Whether this kind is recoverable by the core without surfacing to
    /// the caller as a terminal failure (spec §7 "Recoverable by core?").
    pub fn recoverable(self) -> bool {
        matches!(self, ErrorKind::NoCandidates | ErrorKind::RegistryError)
    }

    /// Whether this kind is shown to the end user (spec §7 "Surface to
    /// user?").
    pub fn surfaced_to_user(self) -> bool {
        !matches!(
            self,
            ErrorKind::NoCandidates | ErrorKind::RegistryError | ErrorKind::LoggerError
        )
    }
}

/// Structured error enum, one variant per row of spec §7.
#[derive(Debug, Error)]
pub enum PulsusError {
    #[error("could not parse utterance: {message}")]
    InvalidInput { message: String },

    #[error("no candidates scored above threshold, falling back to GENERATE")]
    NoCandidates,

    #[error("blocked by policy: {reason}")]
    PolicyBlocked { reason: String },

    #[error("generator failed after retries: {detail}")]
    GeneratorFailure { detail: String },

    #[error("validation failed at stage `{stage}`: {}", diagnostics.join("; "))]
    ValidationFailure {
        stage: String,
        diagnostics: Vec<String>,
    },

    #[error("sandbox exceeded wall-clock limit ({limit_ms}ms)")]
    SandboxTimeout { limit_ms: u64 },

    #[error("sandbox exceeded resource limit: {resource}")]
    SandboxResourceExhaustion { resource: String },

    #[error("skipped malformed registry entry `{locator}`: {detail}")]
    RegistryError { locator: String, detail: String },

    #[error("audit logger write failed: {detail}")]
    LoggerError { detail: String },

    #[error("internal error: {detail}")]
    InternalError { detail: String },
}

impl PulsusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PulsusError::InvalidInput { .. } => ErrorKind::InvalidInput,
            PulsusError::NoCandidates => ErrorKind::NoCandidates,
            PulsusError::PolicyBlocked { .. } => ErrorKind::PolicyBlocked,
            PulsusError::GeneratorFailure { .. } => ErrorKind::GeneratorFailure,
            PulsusError::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            PulsusError::SandboxTimeout { .. } => ErrorKind::SandboxTimeout,
            PulsusError::SandboxResourceExhaustion { .. } => ErrorKind::SandboxResourceExhaustion,
            PulsusError::RegistryError { .. } => ErrorKind::RegistryError,
            PulsusError::LoggerError { .. } => ErrorKind::LoggerError,
            PulsusError::InternalError { .. } => ErrorKind::InternalError,
        }
    }

    /// The `Envelope.status` this error maps to (spec §7 "Status").
    pub fn status(&self) -> crate::envelope::Status {
        use crate::envelope::Status;
        match self {
            PulsusError::NoCandidates | PulsusError::RegistryError { .. } => Status::Partial,
            PulsusError::PolicyBlocked { .. }
            | PulsusError::GeneratorFailure { .. }
            | PulsusError::ValidationFailure { .. }
            | PulsusError::SandboxTimeout { .. }
            | PulsusError::SandboxResourceExhaustion { .. } => Status::Blocked,
            PulsusError::InvalidInput { .. }
            | PulsusError::LoggerError { .. }
            | PulsusError::InternalError { .. } => Status::Failure,
        }
    }
}
