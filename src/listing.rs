use serde::Serialize;

use crate::analysis::{AnalysisView, Id, ProfessionSummary};
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::locale::Locale;
use crate::pagination::{total_pages, Page, SortOrder};

/// One page of the public listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionPage {
    pub items: Vec<ProfessionSummary>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct TopLists {
    pub risky: Vec<ProfessionSummary>,
    pub safe: Vec<ProfessionSummary>,
}

/// Parameters as they arrive from the caller; absent values take the
/// configured defaults.
#[derive(Clone, Debug, Default)]
pub struct PageRequest<'a> {
    pub locale: Option<&'a str>,
    pub sort: Option<&'a str>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn locale_or_default(locale: Option<&str>) -> Result<Locale, BackendError> {
    locale.map_or_else(|| Ok(Locale::default()), Locale::parse)
}

pub async fn get_page(environment: &Environment, request: PageRequest<'_>) -> Result<ProfessionPage, BackendError> {
    let config = environment.config;

    let locale = locale_or_default(request.locale)?;
    let order = match request.sort {
        Some(sort) => sort.parse()?,
        None => SortOrder::default(),
    };
    let page = Page::new(
        request.page.unwrap_or(1),
        request.limit.unwrap_or(config.default_page_size),
        config.max_page_size,
    );

    let (items, total) = environment.db.list(locale, order, page).await?;

    Ok(ProfessionPage {
        items,
        total,
        page: page.number,
        total_pages: total_pages(total, page.size),
    })
}

pub async fn get_top_lists(environment: &Environment, locale: Option<&str>) -> Result<TopLists, BackendError> {
    let locale = locale_or_default(locale)?;
    let count = environment.config.top_count;

    let risky = environment.db.top_risky(locale, count).await?;
    let safe = environment.db.top_safe(locale, count).await?;

    Ok(TopLists { risky, safe })
}

/// Looks up a stored analysis for display, counting the visit.
/// Moderated analyses are treated as absent.
pub async fn get_profession(environment: &Environment, id: Id) -> Result<Option<AnalysisView>, BackendError> {
    use log::warn;

    let record = match environment.db.retrieve(id).await? {
        Some(record) if !record.is_moderated => record,
        _ => return Ok(None),
    };

    if let Err(e) = environment.db.increment_request_count(id).await {
        warn!(environment.logger, "Failed to increment request count"; "id" => id, "error" => ?e);
    }

    Ok(Some(AnalysisView::from(record)))
}
