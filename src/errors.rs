use std::io;

use sqlx;
use thiserror::Error;

use crate::geo::CodecError;
use crate::Id;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents a geodetic point that cannot be encoded or decoded.
    #[error("invalid geodetic point")]
    Codec {
        #[from]
        source: CodecError,
    },

    /// Represents a failure to serialize a classification or place
    /// name into its stored form.
    #[error("could not serialize {entity}")]
    Blob {
        entity: &'static str,
        source: serde_json::Error,
    },

    /// Represents a creation step that ran before the step it
    /// depends on had produced an ID.
    #[error("{step} requires {dependency}, which was not created")]
    MissingDependency {
        step: &'static str,
        dependency: &'static str,
    },

    /// Represents a failure at one step of a unit of work. Nothing
    /// from the unit of work was committed.
    #[error("failed to create {step}")]
    WriteFailed {
        step: &'static str,
        source: Box<BackendError>,
    },

    /// Represents a reference to an occurrence that doesn’t exist.
    #[error("occurrence {0} does not exist")]
    NonExistentOccurrence(Id),

    /// Represents a submission that could not be parsed.
    #[error("malformed submission")]
    MalformedSubmission(#[source] serde_json::Error),

    /// Represents an error retrieving the contents of a form
    /// submission.
    #[error("malformed form submission")]
    MalformedFormSubmission(#[source] warp::Error),

    /// Represents an attachment request that carried no files.
    #[error("no files were uploaded")]
    NoFiles,

    /// Represents a request without the authenticated user header.
    #[error("no authenticated user")]
    MissingUser,

    /// Represents an error reading or writing stored files.
    #[error("file storage error")]
    Storage { source: io::Error },

    /// Represents a write task that stopped before reaching commit or
    /// rollback.
    #[error("write task did not complete")]
    Interrupted(#[source] tokio::task::JoinError),
}

impl BackendError {
    /// Wraps this error as the cause of a failed creation step.
    pub fn at_step(self, step: &'static str) -> Self {
        BackendError::WriteFailed {
            step,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through any step failures.
    pub fn root_cause(&self) -> &BackendError {
        match self {
            BackendError::WriteFailed { source, .. } => source.root_cause(),
            e => e,
        }
    }
}
