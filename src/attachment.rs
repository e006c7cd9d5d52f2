use std::path::Path;
use std::sync::Arc;

use log::{debug, o, warn, Logger};
use serde::Serialize;
use time::OffsetDateTime;

use crate::db::{Db, UnitOfWork};
use crate::errors::BackendError;
use crate::Id;

/// A file whose bytes are already in the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredFile {
    /// Where the store put the bytes.
    pub path: String,

    /// The name the file was uploaded with.
    pub original_filename: String,
}

/// An attachment row before it has an ID.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAttachment {
    pub file_path: String,
    pub original_filename: Option<String>,
    pub extension_id: Option<Id>,
    pub user_id: Id,
    pub uploaded: OffsetDateTime,
}

/// Returns the extension of `filename` in the form the reference
/// table uses: lower case with a leading dot.
///
/// ```
/// use specimen_backend::attachment::extension_of;
/// assert_eq!(extension_of("IMG_0042.JPG").as_deref(), Some(".jpg"));
/// assert_eq!(extension_of("README"), None);
/// ```
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Records attachment metadata against an existing occurrence.
#[derive(Clone)]
pub struct AttachmentRecorder {
    logger: Arc<Logger>,
    db: Arc<dyn Db>,
}

impl AttachmentRecorder {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db>) -> Self {
        AttachmentRecorder { logger, db }
    }

    /// Creates the attachment row and the row linking it to
    /// `occurrence_id` in one unit of work, returning the attachment’s
    /// ID. An extension missing from the reference table is recorded
    /// as unknown.
    pub async fn record(
        &self,
        occurrence_id: Id,
        uploader_id: Id,
        file: &StoredFile,
    ) -> Result<Id, BackendError> {
        let logger = self
            .logger
            .new(o!("occurrence_id" => occurrence_id, "path" => file.path.clone()));

        let mut uow = self.db.begin().await?;

        match record_in(uow.as_mut(), occurrence_id, uploader_id, file).await {
            Ok(attachment_id) => {
                uow.commit().await?;
                debug!(logger, "Recorded attachment"; "attachment_id" => attachment_id);

                Ok(attachment_id)
            }
            Err(e) => {
                warn!(logger, "Rolling back attachment"; "error" => %e, "cause" => ?e.root_cause());

                if let Err(rollback_error) = uow.rollback().await {
                    warn!(logger, "Rollback failed"; "error" => ?rollback_error);
                }

                Err(e)
            }
        }
    }
}

async fn record_in(
    uow: &mut dyn UnitOfWork,
    occurrence_id: Id,
    uploader_id: Id,
    file: &StoredFile,
) -> Result<Id, BackendError> {
    let extension_id = match extension_of(&file.original_filename) {
        Some(extension) => uow
            .find_extension(&extension)
            .await
            .map_err(|e| e.at_step("file extension"))?,
        None => None,
    };

    let attachment = NewAttachment {
        file_path: file.path.clone(),
        original_filename: Some(file.original_filename.clone()),
        extension_id,
        user_id: uploader_id,
        uploaded: OffsetDateTime::now_utc(),
    };

    let attachment_id = uow
        .insert_attachment(&attachment)
        .await
        .map_err(|e| e.at_step("attachment"))?;

    uow.insert_attachment_group(occurrence_id, attachment_id)
        .await
        .map_err(|e| e.at_step("attachment group"))?;

    Ok(attachment_id)
}
