use warp::path::end;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::SuccessResponse;

pub fn make_healthz_route() -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone
{
    warp::path("healthz").and(end()).and(warp::get()).map(|| {
        json(&SuccessResponse::Healthz {
            revision: info::REVISION,
            timestamp: info::BUILD_TIMESTAMP,
            version: info::VERSION,
        })
    })
}
