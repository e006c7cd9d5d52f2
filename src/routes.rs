use std::sync::Arc;

use log::{error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

/// The path every occurrence route lives under.
pub const OCCURRENCES_PATH: &str = "occurrences";

/// The header the authenticating gateway puts the user’s ID in.
pub const USER_HEADER: &str = "x-user-id";

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status_code_for(e), "message" => %r.error);
        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status_code_for(e)));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e.root_cause() {
        Codec { .. }
        | MalformedSubmission(..)
        | MalformedFormSubmission(..)
        | NoFiles
        | MissingUser => StatusCode::BAD_REQUEST,
        NonExistentOccurrence(..) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body, get as g, header, path as p, path::param as par, post};

    use super::{handlers, OCCURRENCES_PATH, USER_HEADER};
    use crate::environment::Environment;
    use crate::Id;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
        ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
        ($route_variable:ident; $first:expr, $($rest:expr),+) => (
            let $route_variable = $route_variable.and($first);
            route_filter!($route_variable; $($rest),+);
        )
    }

    macro_rules! route {
        ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
            pub fn $name(environment: Environment) -> Route {
                let $route_variable = warp::any()
                    .map(move || environment.clone())
                    .and(p(OCCURRENCES_PATH));

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_create_route => create, rt; end(), post(), body::bytes());
    route!(make_retrieve_route => retrieve, rt; par::<Id>(), end(), g());

    /// The form size limit comes from the environment, so this one is
    /// built by hand.
    pub fn make_attach_route(environment: Environment) -> Route {
        let max_length = environment.config.max_upload_bytes;

        warp::any()
            .map(move || environment.clone())
            .and(p(OCCURRENCES_PATH))
            .and(par::<Id>())
            .and(p("attachments"))
            .and(end())
            .and(post())
            .and(header::optional::<Id>(USER_HEADER))
            .and(form().max_length(max_length))
            .and_then(handlers::attach)
            .boxed()
    }
}
