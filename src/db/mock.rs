use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::BoxFuture;
use futures::FutureExt;
use time::OffsetDateTime;

use crate::analysis::{AnalysisKey, AnalysisRecord, Id, InsertOutcome, NewAnalysis, ProfessionSummary, Times};
use crate::db::Db;
use crate::errors::BackendError;
use crate::locale::Locale;
use crate::pagination::{Page, SortOrder};

#[derive(Default)]
struct Tables {
    keys: HashMap<AnalysisKey, Id>,
    rows: BTreeMap<Id, AnalysisRecord>,
    last_id: Id,
}

/// An in-memory store that enforces the same uniqueness constraint as
/// the real table. Reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct MockDb {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockDb {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every stored row, in id order.
    pub fn records(&self) -> Vec<AnalysisRecord> {
        self.read().rows.values().cloned().collect()
    }

    pub fn request_count(&self, key: &AnalysisKey) -> Option<i64> {
        let tables = self.read();

        tables
            .keys
            .get(key)
            .and_then(|id| tables.rows.get(id))
            .map(|row| row.request_count)
    }

    /// Stores a row directly, bypassing failure injection. Returns the
    /// existing id when the key is already present.
    pub fn seed(&self, analysis: NewAnalysis) -> Id {
        let key = analysis.key().clone();

        match self.write_row(analysis) {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::AlreadyExists => self.read().keys[&key],
        }
    }

    /// Flips the moderation flag of a row without touching its result,
    /// the way a manual correction of the table would.
    pub fn set_moderated(&self, id: Id, is_moderated: bool) {
        if let Some(row) = self.write().rows.get_mut(&id) {
            row.is_moderated = is_moderated;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reads(&self) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(BackendError::StoreUnavailable)
        } else {
            Ok(())
        }
    }

    fn check_writes(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::StoreUnavailable)
        } else {
            Ok(())
        }
    }

    fn write_row(&self, analysis: NewAnalysis) -> InsertOutcome {
        let mut tables = self.write();

        if tables.keys.contains_key(analysis.key()) {
            return InsertOutcome::AlreadyExists;
        }

        tables.last_id += 1;
        let id = tables.last_id;
        let now = OffsetDateTime::now_utc();

        let record = AnalysisRecord {
            id,
            profession: analysis.key().profession().to_owned(),
            locale: analysis.key().locale(),
            risk_percentage: Some(analysis.risk_percentage()),
            is_moderated: analysis.is_moderated(),
            category: analysis.category(),
            request_count: 1,
            times: Times {
                created_at: now,
                updated_at: now,
            },
            result: analysis.result,
        };

        tables.keys.insert(analysis.key, id);
        tables.rows.insert(id, record);

        InsertOutcome::Inserted(id)
    }

    fn bump(&self, id: Id) {
        if let Some(row) = self.write().rows.get_mut(&id) {
            row.request_count += 1;
            row.times.updated_at = OffsetDateTime::now_utc();
        }
    }

    fn listed(&self, locale: Locale, order: SortOrder) -> Vec<ProfessionSummary> {
        let tables = self.read();

        let mut items: Vec<ProfessionSummary> = tables
            .rows
            .values()
            .filter(|row| row.locale == locale && !row.is_moderated)
            .filter_map(|row| {
                row.risk_percentage
                    .map(|risk| ProfessionSummary::new(row.id, row.profession.clone(), risk))
            })
            .collect();

        items.sort_by(|a, b| {
            let by_risk = match order {
                SortOrder::RiskAscending => a.risk_percentage.cmp(&b.risk_percentage),
                SortOrder::RiskDescending => b.risk_percentage.cmp(&a.risk_percentage),
            };

            by_risk.then(a.id.cmp(&b.id))
        });

        items
    }
}

impl Db for MockDb {
    fn ensure_schema(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        async move { self.check_writes() }.boxed()
    }

    fn find_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>> {
        let key = key.clone();

        async move {
            self.check_reads()?;

            let tables = self.read();

            Ok(tables.keys.get(&key).and_then(|id| tables.rows.get(id)).cloned())
        }
        .boxed()
    }

    fn retrieve(&self, id: Id) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>> {
        async move {
            self.check_reads()?;

            Ok(self.read().rows.get(&id).cloned())
        }
        .boxed()
    }

    fn insert(&self, analysis: NewAnalysis) -> BoxFuture<'_, Result<InsertOutcome, BackendError>> {
        async move {
            self.check_writes()?;

            Ok(self.write_row(analysis))
        }
        .boxed()
    }

    fn increment_request_count(&self, id: Id) -> BoxFuture<'_, Result<(), BackendError>> {
        async move {
            self.check_writes()?;
            self.bump(id);

            Ok(())
        }
        .boxed()
    }

    fn increment_request_count_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<(), BackendError>> {
        let key = key.clone();

        async move {
            self.check_writes()?;

            let id = self.read().keys.get(&key).copied();

            if let Some(id) = id {
                self.bump(id);
            }

            Ok(())
        }
        .boxed()
    }

    fn list(
        &self,
        locale: Locale,
        order: SortOrder,
        page: Page,
    ) -> BoxFuture<'_, Result<(Vec<ProfessionSummary>, i64), BackendError>> {
        async move {
            self.check_reads()?;

            let items = self.listed(locale, order);
            let total = items.len() as i64;
            let page = items
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.size as usize)
                .collect();

            Ok((page, total))
        }
        .boxed()
    }

    fn top_risky(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>> {
        async move {
            self.check_reads()?;

            Ok(self
                .listed(locale, SortOrder::RiskDescending)
                .into_iter()
                .take(count.max(0) as usize)
                .collect())
        }
        .boxed()
    }

    fn top_safe(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>> {
        async move {
            self.check_reads()?;

            Ok(self
                .listed(locale, SortOrder::RiskAscending)
                .into_iter()
                .take(count.max(0) as usize)
                .collect())
        }
        .boxed()
    }
}
