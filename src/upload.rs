use std::sync::Arc;

use log::{debug, error, o, Logger};
use serde::Serialize;

use crate::attachment::{AttachmentRecorder, StoredFile};
use crate::errors::BackendError;
use crate::store::Store;
use crate::Id;

/// A file as it arrived in a request.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A file that was stored and recorded against an occurrence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttachedFile {
    pub id: Id,
    pub path: String,
    pub original_filename: String,
}

/// Stores uploaded files and records them as attachments.
#[derive(Clone)]
pub struct AttachmentUploader {
    logger: Arc<Logger>,
    store: Arc<dyn Store>,
    recorder: AttachmentRecorder,
}

impl AttachmentUploader {
    pub fn new(logger: Arc<Logger>, store: Arc<dyn Store>, recorder: AttachmentRecorder) -> Self {
        AttachmentUploader {
            logger,
            store,
            recorder,
        }
    }

    /// Stores and records each file in turn. Files handled before a
    /// failure stay attached; the failing file’s bytes are removed
    /// from the store.
    pub async fn attach(
        &self,
        occurrence_id: Id,
        uploader_id: Id,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<AttachedFile>, BackendError> {
        if files.is_empty() {
            return Err(BackendError::NoFiles);
        }

        let logger = Arc::new(self.logger.new(o!("occurrence_id" => occurrence_id)));
        let mut attached = Vec::with_capacity(files.len());

        for (index, file) in files.into_iter().enumerate() {
            debug!(logger, "Storing file..."; "index" => index, "filename" => &file.filename, "size" => file.bytes.len());

            attached.push(
                self.attach_one(&logger, occurrence_id, uploader_id, file)
                    .await?,
            );
        }

        Ok(attached)
    }

    async fn attach_one(
        &self,
        logger: &Logger,
        occurrence_id: Id,
        uploader_id: Id,
        file: UploadedFile,
    ) -> Result<AttachedFile, BackendError> {
        let UploadedFile { filename, bytes } = file;

        let path = self.store.save(&filename, bytes).await?;
        let stored = StoredFile {
            path,
            original_filename: filename,
        };

        match self.recorder.record(occurrence_id, uploader_id, &stored).await {
            Ok(id) => Ok(AttachedFile {
                id,
                path: stored.path,
                original_filename: stored.original_filename,
            }),
            Err(e) => {
                debug!(logger, "Removing stored file..."; "path" => &stored.path);

                if let Err(delete_error) = self.store.delete(&stored.path).await {
                    error!(logger, "Failed to remove orphaned file"; "path" => &stored.path, "error" => ?delete_error);
                }

                Err(e)
            }
        }
    }
}
