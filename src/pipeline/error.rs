//! Graph engine error types.

use thiserror::Error;

/// Errors that can occur within the filter graph engine.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Connector roles, type paths or the refinement predicate disagree.
    #[error("Connector mismatch: {0}")]
    Mismatch(String),

    /// A node was created from a capability that cannot back it.
    #[error("Capability missing for '{registration}': {reason}")]
    CapabilityMissing {
        registration: String,
        reason: String,
    },

    /// No data could be obtained anywhere upstream.
    #[error("Could not resolve image data upstream of '{node}'")]
    ResolveFailure { node: String },

    /// A handle refers to an object that was released.
    #[error("Stale handle: {0}")]
    StaleHandle(String),

    /// A connector position lies outside the declared arity.
    #[error("Position {position} out of range for {what} (declared {declared})")]
    OutOfRange {
        what: String,
        position: usize,
        declared: String,
    },

    /// The node that should provide a socket has no free socket slot.
    #[error("No free socket on '{0}'")]
    NoFreeSocket(String),

    /// The pull recursion re-entered a node or exceeded the depth limit.
    #[error("Cycle detected while pulling through '{0}'")]
    CycleDetected(String),

    /// A capability's run or context functor failed.
    #[error("Node '{node}' failed: {source}")]
    Run {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// A ticket operation needed a bound array or output image.
    #[error("Ticket is missing {0}")]
    TicketIncomplete(&'static str),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
