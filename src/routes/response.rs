use serde::Serialize;

use crate::upload::AttachedFile;
use crate::Id;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Attached {
        occurrence_id: Id,
        attachments: Vec<AttachedFile>,
    },
    Created {
        id: Id,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
}
