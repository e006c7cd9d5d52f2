use bytes::Buf;
use futures::future;
use futures::stream::TryStreamExt;
use warp::multipart::{FormData, Part};

use crate::errors::BackendError;
use crate::upload::UploadedFile;

/// The form field that carries attachment files.
pub const FILES_FIELD: &str = "files";

/// Collects every file in the `files` field of a multipart form. Parts
/// under other names, or without a filename, are skipped.
///
/// The form is a stream: each part's body has to be read before the
/// next part is requested.
pub async fn parse_attachments(mut form: FormData) -> Result<Vec<UploadedFile>, BackendError> {
    let mut files = vec![];

    while let Some(part) = form
        .try_next()
        .await
        .map_err(BackendError::MalformedFormSubmission)?
    {
        if part.name() != FILES_FIELD {
            continue;
        }

        let filename = match part.filename() {
            Some(filename) => filename.to_owned(),
            None => continue,
        };

        let bytes = part_as_vec(part)
            .await
            .map_err(BackendError::MalformedFormSubmission)?;

        files.push(UploadedFile { filename, bytes });
    }

    Ok(files)
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut vec, mut chunk| {
            vec.extend_from_slice(&chunk.copy_to_bytes(chunk.remaining()));
            future::ready(Ok(vec))
        })
        .await
}
