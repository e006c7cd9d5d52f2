use std::path::{Path, PathBuf};

use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use crate::errors::BackendError;

#[cfg(test)]
pub(crate) mod mock;

/// Where uploaded bytes live. The database only ever sees the path a
/// store hands back.
pub trait Store: Send + Sync {
    /// Saves `raw` under a name derived from `filename` and returns
    /// the path it was saved to. Two saves of the same filename never
    /// collide.
    fn save<'a>(&'a self, filename: &'a str, raw: Vec<u8>)
        -> BoxFuture<'a, Result<String, BackendError>>;

    /// Deletes what was saved at `path`.
    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), BackendError>>;
}

/// Returns a unique storage name for an uploaded file, keeping a
/// readable version of its original name.
pub fn unique_name(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize(filename))
}

/// Keeps the final path component of `filename` and replaces anything
/// outside `[A-Za-z0-9._-]`.
fn sanitize(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_owned()
    } else {
        cleaned
    }
}

/// A store that writes to a local directory.
pub struct LocalStore {
    directory: PathBuf,
}

impl LocalStore {
    /// Creates a new instance. The directory must already exist.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        LocalStore {
            directory: directory.as_ref().to_owned(),
        }
    }
}

impl Store for LocalStore {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        raw: Vec<u8>,
    ) -> BoxFuture<'a, Result<String, BackendError>> {
        async move {
            let path = self.directory.join(unique_name(filename));

            tokio::fs::write(&path, raw)
                .await
                .map_err(|source| BackendError::Storage { source })?;

            Ok(path.to_string_lossy().into_owned())
        }
        .boxed()
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        async move {
            tokio::fs::remove_file(path)
                .await
                .map_err(|source| BackendError::Storage { source })
        }
        .boxed()
    }
}
