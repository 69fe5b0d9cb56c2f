// Copyright 2025 Cowboy AI, LLC.

//! Error taxonomy for the knowledge fabric.
//!
//! Every fallible public operation in this crate returns [`DomainResult`].
//! The variants below are a 1:1 mapping of the error kinds named in the
//! error-handling design: transient kinds (`BackendUnavailable`,
//! `PoolExhausted`, `BackpressureExceeded`) are distinguished from kinds that
//! are never retried (`ValidationError`, `EntityNotFound`, `SchemaConflict`).

use thiserror::Error;

/// Errors that can occur anywhere in the knowledge fabric.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Malformed or missing required configuration; fatal at start.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Transient backend connectivity loss. The GAL retries this kind
    /// internally up to `max_retry_time` before it surfaces.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A connection pool could not hand out a connection within its
    /// configured wait bound.
    #[error("pool exhausted: waited {waited_ms}ms for a connection")]
    PoolExhausted {
        /// How long the caller waited before giving up.
        waited_ms: u64,
    },

    /// Bad input; always surfaced, never retried.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A referenced entity does not exist.
    #[error("entity not found: {label} with id {id}")]
    EntityNotFound {
        /// The node label that was searched.
        label: String,
        /// The id that was searched for.
        id: String,
    },

    /// A `Create` attempted to reuse an id already bound to its label.
    #[error("duplicate id: {label} with id {id} already exists")]
    DuplicateID {
        /// The node label.
        label: String,
        /// The id that was already present.
        id: String,
    },

    /// A schema extension conflicted with an existing, incompatible
    /// definition. Fatal during schema extension.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// A statement was syntactically or semantically invalid — a
    /// programmer error, surfaced and logged with the statement.
    #[error("query error: {message} (statement: {statement})")]
    QueryError {
        /// Description of what was wrong with the statement.
        message: String,
        /// The offending statement, retained for diagnostics.
        statement: String,
    },

    /// A sharing or access policy vetoed a candidate. Not an error in the
    /// conventional sense — reported through sync result counters — but
    /// represented here so call sites that need to short-circuit a single
    /// item can still propagate it as a `Result`.
    #[error("policy veto: {0}")]
    PolicyVeto(String),

    /// The event pipeline's dispatch queue was full and stayed full past
    /// `backpressure_wait_ms`.
    #[error("backpressure exceeded: queue stayed full for {waited_ms}ms")]
    BackpressureExceeded {
        /// How long the producer waited before giving up.
        waited_ms: u64,
    },

    /// The event processor has been stopped and rejects further `Log`
    /// calls.
    #[error("processor stopped")]
    ProcessorStopped,

    /// The operation was cancelled before completion.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The caller's deadline elapsed before the operation completed.
    #[error("timeout after {elapsed_ms}ms")]
    Timeout {
        /// How long the operation ran before the deadline elapsed.
        elapsed_ms: u64,
    },

    /// Invariant violation (e.g. a cycle among non-weak dependencies).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict: expected version {expected}, but found {actual}")]
    ConcurrencyConflict {
        /// Version the caller expected.
        expected: u64,
        /// Version actually stored.
        actual: u64,
    },

    /// Generic not-found, for collaborators that don't carry label/id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Generic already-exists, for collaborators that don't carry label/id.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Serialization failure when crossing a persistence or wire boundary.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A named capability is recognized but not implemented by this build.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Catch-all for conditions that don't fit another variant.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result type for knowledge-fabric operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl DomainError {
    /// Create a generic internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        DomainError::InternalError(msg.into())
    }

    /// True for errors that represent "nothing there", as opposed to a
    /// failure to look.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::EntityNotFound { .. })
    }

    /// True for errors that should never be retried by a caller.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            DomainError::ValidationError(_) | DomainError::InvariantViolation(_)
        )
    }

    /// True for errors the GAL (and only the GAL) is permitted to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::BackendUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_not_found_message() {
        let err = DomainError::EntityNotFound {
            label: "Project".to_string(),
            id: "123".to_string(),
        };
        assert_eq!(err.to_string(), "entity not found: Project with id 123");
        assert!(err.is_not_found());
    }

    #[test]
    fn transient_classification() {
        assert!(DomainError::BackendUnavailable("timeout".into()).is_transient());
        assert!(!DomainError::ValidationError("bad".into()).is_transient());
        assert!(!DomainError::PoolExhausted { waited_ms: 10 }.is_transient());
    }

    #[test]
    fn validation_classification() {
        assert!(DomainError::ValidationError("x".into()).is_validation_error());
        assert!(DomainError::InvariantViolation("x".into()).is_validation_error());
        assert!(!DomainError::EntityNotFound {
            label: "X".into(),
            id: "1".into()
        }
        .is_validation_error());
    }

    #[test]
    fn serde_json_conversion() {
        let bad = "{ invalid";
        let serde_err = serde_json::from_str::<serde_json::Value>(bad).unwrap_err();
        let domain_err: DomainError = serde_err.into();
        match domain_err {
            DomainError::SerializationError(msg) => assert!(!msg.is_empty()),
            _ => panic!("expected SerializationError"),
        }
    }

    #[test]
    fn clone_preserves_display() {
        let err = DomainError::ConcurrencyConflict {
            expected: 2,
            actual: 1,
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
