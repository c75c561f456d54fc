use std::time::{Duration, Instant};

use serde::Deserialize;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::analysis::Id;
use crate::environment::Environment;
use crate::listing::{self, PageRequest};
use crate::locale::DEFAULT_LOCALE;
use crate::orchestrator;
use crate::routes::{
    query::{ListQuery, TopQuery},
    rejection::{Context, Rejection},
    response::ErrorResponse,
};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {
        let start = Instant::now();

        // errors skip the header until `try` blocks are stabilized
        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(alias = "jobTitle")]
    title: String,
    #[serde(default)]
    locale: Option<String>,
}

pub async fn analyze(environment: Environment, request: AnalyzeRequest) -> RouteResult {
    timed! {
        let AnalyzeRequest { title, locale } = request;
        let locale = locale.unwrap_or_else(|| DEFAULT_LOCALE.to_owned());

        let analysis = orchestrator::analyze(&environment, &title, &locale)
            .await
            .map_err(|e| Rejection::new(Context::analyze(title.clone(), locale.clone()), e))?;

        json(&analysis)
    }
}

pub async fn list(environment: Environment, query: ListQuery) -> RouteResult {
    timed! {
        let request = PageRequest {
            locale: query.locale.as_deref(),
            sort: query.sort.as_deref(),
            page: query.page,
            limit: query.limit,
        };

        let page = listing::get_page(&environment, request)
            .await
            .map_err(|e| Rejection::new(Context::list(), e))?;

        json(&page)
    }
}

pub async fn top(environment: Environment, query: TopQuery) -> RouteResult {
    timed! {
        let lists = listing::get_top_lists(&environment, query.locale.as_deref())
            .await
            .map_err(|e| Rejection::new(Context::top(), e))?;

        json(&lists)
    }
}

pub async fn profession(environment: Environment, id: Id) -> RouteResult {
    timed! {
        let view = listing::get_profession(&environment, id)
            .await
            .map_err(|e| Rejection::new(Context::profession(id), e))?;

        match view {
            Some(view) => with_status(json(&view), StatusCode::OK),
            None => with_status(json(&ErrorResponse::not_found()), StatusCode::NOT_FOUND),
        }
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
