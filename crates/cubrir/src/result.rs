//! Result and error types for Cubrir.

use thiserror::Error;

/// Result type for Cubrir operations
pub type CubrirResult<T> = Result<T, CubrirError>;

/// Errors that can occur while tracing execution or building coverage
#[derive(Debug, Error)]
pub enum CubrirError {
    /// Tracer invoked on a VM with no program loaded
    #[error("no program loaded")]
    NotLoaded,

    /// Tracer invoked on a VM that already ran to failure; its state is
    /// undefined and stepping must not be attempted
    #[error("VM has failed, state is undefined")]
    AlreadyFailed,

    /// The program under trace raised a runtime fault mid-execution.
    /// The partial trace up to the fault is still valid and is available
    /// on the [`Trace`](crate::Trace) this error was produced from.
    #[error("execution failed: {fault}")]
    ExecutionFailed {
        /// Fault description reported by the VM
        fault: String,
    },

    /// The VM reported a state tag the tracer does not recognize.
    /// Indicates a VM/tracer version mismatch; a tool-level bug if observed.
    #[error("unknown VM state: {state}")]
    UnknownState {
        /// The unrecognized state tag
        state: String,
    },

    /// The document-selection pattern matched nothing in debug metadata,
    /// most likely a wrong path fragment
    #[error("no document matching {pattern:?} in debug metadata")]
    NoMatchingDocument {
        /// The substring that failed to match
        pattern: String,
    },

    /// A requested method id is absent from debug metadata
    #[error("method {method:?} not found in debug metadata")]
    MethodNotFound {
        /// The method id that was looked up
        method: String,
    },

    /// Debug metadata could not be parsed
    #[error("malformed debug metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Report serialization failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
