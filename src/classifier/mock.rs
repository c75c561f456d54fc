use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Barrier;

use crate::analysis::{ClassificationResult, ProfessionCategory};
use crate::classifier::Classifier;
use crate::errors::BackendError;
use crate::locale::Locale;

type Responder = dyn Fn(&str, Locale) -> Result<ClassificationResult, BackendError> + Send + Sync;

/// A classifier that answers from a closure and counts its calls. With
/// a barrier, every call waits until enough callers have arrived, which
/// lets tests line up concurrent cache misses.
pub struct MockClassifier {
    respond: Box<Responder>,
    calls: AtomicUsize,
    barrier: Option<Arc<Barrier>>,
}

impl MockClassifier {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, Locale) -> Result<ClassificationResult, BackendError> + Send + Sync + 'static,
    {
        MockClassifier {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            barrier: None,
        }
    }

    pub fn returning(result: ClassificationResult) -> Self {
        Self::new(move |_, _| Ok(result.clone()))
    }

    pub fn unavailable() -> Self {
        Self::new(|_, _| {
            Err(BackendError::ClassificationUnavailable {
                reason: "mock classifier is down".to_owned(),
            })
        })
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn classify<'a>(
        &'a self,
        title: &'a str,
        locale: Locale,
    ) -> BoxFuture<'a, Result<ClassificationResult, BackendError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }

            (self.respond)(title, locale)
        }
        .boxed()
    }
}

/// A plausible, already sanitized verdict.
pub fn sample_result(risk_score: u8) -> ClassificationResult {
    ClassificationResult {
        risk_score,
        verdict: format!("Risk {}", risk_score),
        reasoning: "Some tasks can be automated. Others cannot.".to_owned(),
        safe_skills: vec!["judgement".to_owned(), "negotiation".to_owned(), "care".to_owned()],
        replaced_tasks: vec!["reporting".to_owned(), "scheduling".to_owned(), "data entry".to_owned()],
        is_profession: true,
        is_censored: false,
        category: Some(ProfessionCategory::Management),
    }
}

/// The degenerate verdict of a moderated title.
pub fn censored_result() -> ClassificationResult {
    ClassificationResult {
        risk_score: 0,
        verdict: "Not a profession".to_owned(),
        reasoning: "This input cannot be analyzed.".to_owned(),
        safe_skills: vec![],
        replaced_tasks: vec![],
        is_profession: false,
        is_censored: true,
        category: None,
    }
}
