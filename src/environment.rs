use std::sync::Arc;

use log::Logger;

use crate::attachment::AttachmentRecorder;
use crate::db::Db;
use crate::store::Store;
use crate::upload::AttachmentUploader;
use crate::writer::AggregateWriter;

/// The maximum form data size to accept when none is configured. This
/// should be enforced by the HTTP gateway, so on the Rust side it’s
/// set to an unreasonably large number.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db>,
    pub store: Arc<dyn Store>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db>,
        store: Arc<dyn Store>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            store,
            config,
        }
    }

    pub fn writer(&self) -> AggregateWriter {
        AggregateWriter::new(self.logger.clone(), self.db.clone())
    }

    pub fn uploader(&self) -> AttachmentUploader {
        let recorder = AttachmentRecorder::new(self.logger.clone(), self.db.clone());

        AttachmentUploader::new(self.logger.clone(), self.store.clone(), recorder)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub(crate) max_upload_bytes: u64,
}

impl Config {
    pub fn new(max_upload_bytes: Option<u64>) -> Self {
        Self {
            max_upload_bytes: max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(None)
    }
}
