//! Resolves an analysis request from the cache, or classifies and
//! stores it on a miss.
//!
//! Concurrent first-time requests for the same key are not coordinated
//! here. Each of them classifies, and the uniqueness constraint of the
//! store decides which result is kept; the others adopt the stored row.

use log::{debug, error, info, o, warn, Logger};

use crate::analysis::{Analysis, AnalysisKey, ClassificationResult, InsertOutcome, NewAnalysis};
use crate::environment::{Environment, SafeDb};
use crate::errors::BackendError;
use crate::locale::Locale;

pub async fn analyze(environment: &Environment, raw_title: &str, locale: &str) -> Result<Analysis, BackendError> {
    let locale = Locale::parse(locale)?;
    let key = AnalysisKey::new(raw_title, locale)?;

    let logger = environment.logger.new(o!(
        "profession" => key.profession().to_owned(),
        "locale" => locale.as_str(),
    ));
    let db = environment.db.as_ref();

    match db.find_by_key(&key).await {
        Ok(Some(record)) => {
            debug!(logger, "Found stored analysis"; "id" => record.id);
            count_request(&logger, db, &key).await;

            return Ok(Analysis::new(record.result, Some(record.id), record.is_moderated));
        }
        Ok(None) => debug!(logger, "No stored analysis"),
        Err(e) => warn!(logger, "Lookup failed, classifying anyway"; "error" => ?e),
    }

    let result = environment
        .classifier
        .classify(raw_title, locale)
        .await
        .map_err(|e| {
            error!(logger, "Classification failed"; "error" => ?e);
            e
        })?;

    let new = NewAnalysis::new(key.clone(), result.clone());
    let is_moderated = new.is_moderated();

    match db.insert(new).await {
        Ok(InsertOutcome::Inserted(id)) => {
            info!(logger, "Stored new analysis"; "id" => id, "moderated" => is_moderated);

            Ok(Analysis::new(result, Some(id), is_moderated))
        }
        Ok(InsertOutcome::AlreadyExists) => Ok(adopt_stored(&logger, db, &key, result).await),
        Err(e) => {
            error!(logger, "Failed to store analysis"; "error" => ?e);

            Ok(Analysis::unstored(result))
        }
    }
}

/// Called after losing an insert race: answers with the row that won.
async fn adopt_stored(logger: &Logger, db: &SafeDb, key: &AnalysisKey, fallback: ClassificationResult) -> Analysis {
    match db.find_by_key(key).await {
        Ok(Some(record)) => {
            debug!(logger, "Adopted concurrently stored analysis"; "id" => record.id);
            count_request(logger, db, key).await;

            Analysis::new(record.result, Some(record.id), record.is_moderated)
        }
        Ok(None) => {
            error!(logger, "Conflicting analysis disappeared");

            Analysis::unstored(fallback)
        }
        Err(e) => {
            error!(logger, "Failed to read back conflicting analysis"; "error" => ?e);

            Analysis::unstored(fallback)
        }
    }
}

/// Failing to count a request never fails the request.
async fn count_request(logger: &Logger, db: &SafeDb, key: &AnalysisKey) {
    if let Err(e) = db.increment_request_count_by_key(key).await {
        warn!(logger, "Failed to increment request count"; "error" => ?e);
    }
}
