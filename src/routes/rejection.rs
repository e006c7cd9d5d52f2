use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;
use crate::Id;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Attach { occurrence_id: Id },
    Create,
    Retrieve { id: Id },
}

impl Context {
    pub fn attach(occurrence_id: Id) -> Context {
        Context::Attach { occurrence_id }
    }

    pub fn create() -> Context {
        Context::Create
    }

    pub fn retrieve(id: Id) -> Context {
        Context::Retrieve { id }
    }
}
