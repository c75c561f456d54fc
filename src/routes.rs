use std::sync::Arc;

use log::{error, warn, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// Analysis requests carry a title and a locale; anything bigger than
/// this is not one.
const MAX_CONTENT_LENGTH: u64 = 16 * 1024;

/// What every downstream failure looks like from the outside.
const GENERIC_FAILURE: &str = "Processing failed";

/// Assembles the public API, including error formatting.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_analyze_route(environment.clone())
        .or(make_top_route(environment.clone()))
        .or(make_profession_route(environment.clone()))
        .or(make_list_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
}

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Rejected request"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        let message = if status.is_server_error() {
            GENERIC_FAILURE.to_owned()
        } else {
            e.to_string()
        };

        return Ok(with_status(json(&r.flatten(message)), status));
    }

    if let Some(e) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(bad_request(e.to_string()));
    }

    if let Some(e) = rej.find::<reject::InvalidQuery>() {
        return Ok(bad_request(e.to_string()));
    }

    Err(rej)
}

fn bad_request(message: String) -> WithStatus<Json> {
    with_status(json(&response::ErrorResponse::new(message)), StatusCode::BAD_REQUEST)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body, get as g, path as p, path::param as par, post, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::analysis::Id;
    use crate::environment::Environment;

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
                let $route_variable = warp::any().map(move || environment.clone());

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_analyze_route => analyze, rt; p("analyze"), end(), post(), body::content_length_limit(MAX_CONTENT_LENGTH), body::json::<handlers::AnalyzeRequest>());
    route!(make_list_route => list, rt; p("professions"), end(), g(), query::<q::ListQuery>());
    route!(make_top_route => top, rt; p("professions"), p("top"), end(), g(), query::<q::TopQuery>());
    route!(make_profession_route => profession, rt; p("professions"), par::<Id>(), end(), g());
}
