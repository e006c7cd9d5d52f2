use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, o};
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::aggregate::AggregateGraph;
use crate::builder::build;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::io::parse_attachments;
use crate::routes::{
    rejection::{Context, Rejection},
    response::SuccessResponse,
    OCCURRENCES_PATH,
};
use crate::submission::Submission;
use crate::upload::{AttachedFile, AttachmentUploader, UploadedFile};
use crate::writer::AggregateWriter;
use crate::Id;

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {{
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    }};
}

pub async fn create(environment: Environment, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::create(), e);

        debug!(environment.logger, "Parsing submission..."; "size" => body.len());
        let submission: Submission = serde_json::from_slice(&body)
            .map_err(BackendError::MalformedSubmission)
            .map_err(error_handler)?;

        debug!(environment.logger, "Building aggregate..."; "user_id" => submission.user_id);
        let graph = build(&submission).map_err(error_handler)?;

        let id = write_detached(environment.writer(), graph)
            .await
            .map_err(error_handler)?;

        let logger = environment.logger.new(o!("occurrence_id" => id));
        debug!(logger, "Sending response...");

        with_header(
            with_status(json(&SuccessResponse::Created { id }), StatusCode::CREATED),
            "location",
            occurrence_location(id),
        )
    }
}

pub async fn attach(
    environment: Environment,
    occurrence_id: Id,
    user: Option<Id>,
    content: FormData,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::attach(occurrence_id), e);

        let uploader_id = user.ok_or(BackendError::MissingUser).map_err(error_handler)?;

        debug!(environment.logger, "Parsing attachments..."; "occurrence_id" => occurrence_id);
        let files = parse_attachments(content).await.map_err(error_handler)?;

        let attachments = attach_detached(environment.uploader(), occurrence_id, uploader_id, files)
            .await
            .map_err(error_handler)?;

        with_status(
            json(&SuccessResponse::Attached {
                occurrence_id,
                attachments,
            }),
            StatusCode::CREATED,
        )
    }
}

pub async fn retrieve(environment: Environment, id: Id) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::retrieve(id), e);

        debug!(environment.logger, "Retrieving occurrence..."; "id" => id);

        let occurrence = environment
            .db
            .retrieve_occurrence(id)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NonExistentOccurrence(id))
            .map_err(error_handler)?;

        with_status(json(&occurrence), StatusCode::OK)
    }
}

/// Runs the write on its own task so that a dropped request cannot
/// stop it between steps.
async fn write_detached(writer: AggregateWriter, graph: AggregateGraph) -> Result<Id, BackendError> {
    tokio::spawn(async move { writer.write(&graph).await })
        .await
        .map_err(BackendError::Interrupted)?
}

/// Stores and records the files on their own task, so that a dropped
/// request cannot leave stored bytes without a recorded attachment.
async fn attach_detached(
    uploader: AttachmentUploader,
    occurrence_id: Id,
    uploader_id: Id,
    files: Vec<UploadedFile>,
) -> Result<Vec<AttachedFile>, BackendError> {
    tokio::spawn(async move { uploader.attach(occurrence_id, uploader_id, files).await })
        .await
        .map_err(BackendError::Interrupted)?
}

fn occurrence_location(id: Id) -> String {
    format!("/{}/{}", OCCURRENCES_PATH, id)
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
