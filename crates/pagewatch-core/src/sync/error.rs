//! Publish errors
//!
//! A failed publish never invalidates local results: every snapshot was
//! already persisted before publishing began. The messages say so.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

use super::manager::PublishStep;

/// Errors from publishing dirty snapshots
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local candidate could not be built
    #[error("Could not prepare publish: {0}. Local results are saved; remote copy is stale")]
    Candidate(#[source] StorageError),

    /// The mirror rejected or failed a step
    #[error("Publish failed while {step}: {source}. Local results are saved; remote copy is stale")]
    Remote {
        step: PublishStep,
        #[source]
        source: RemoteError,
    },

    /// Another writer kept moving the branch
    #[error("Publish gave up after {attempts} conflicting attempts. Local results are saved; remote copy is stale")]
    Exhausted {
        attempts: u32,
        #[source]
        source: RemoteError,
    },
}

impl SyncError {
    /// Step at which the publish stopped
    pub fn step(&self) -> PublishStep {
        match self {
            SyncError::Candidate(_) => PublishStep::BuildCandidate,
            SyncError::Remote { step, .. } => *step,
            SyncError::Exhausted { .. } => PublishStep::AdvanceRef,
        }
    }

    /// Whether running `publish` again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Candidate(e) => e.is_recoverable(),
            SyncError::Remote { source, .. } => !matches!(
                source,
                RemoteError::Unauthorized { .. } | RemoteError::NotConfigured(_)
            ),
            SyncError::Exhausted { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_mention_local_state() {
        let err = SyncError::Remote {
            step: PublishStep::AdvanceRef,
            source: RemoteError::conflict("not a fast-forward"),
        };
        let msg = err.to_string();
        assert!(msg.contains("advancing the branch"));
        assert!(msg.contains("Local results are saved"));
        assert!(msg.contains("remote copy is stale"));
    }

    #[test]
    fn test_retryable() {
        let unauthorized = SyncError::Remote {
            step: PublishStep::ReadHead,
            source: RemoteError::Unauthorized { status: 401 },
        };
        assert!(!unauthorized.is_retryable());

        let exhausted = SyncError::Exhausted {
            attempts: 3,
            source: RemoteError::conflict("moved"),
        };
        assert!(exhausted.is_retryable());
        assert_eq!(exhausted.step(), PublishStep::AdvanceRef);
    }
}
