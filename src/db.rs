use futures::future::BoxFuture;

use crate::analysis::{AnalysisKey, AnalysisRecord, Id, InsertOutcome, NewAnalysis, ProfessionSummary};
use crate::errors::BackendError;
use crate::locale::Locale;
use crate::pagination::{Page, SortOrder};

pub mod mock;

/// Durable storage for analyses, keyed uniquely by (profession, locale).
pub trait Db {
    /// Creates or extends the schema. Safe to call any number of times.
    fn ensure_schema(&self) -> BoxFuture<'_, Result<(), BackendError>>;

    fn find_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>>;

    fn retrieve(&self, id: Id) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>>;

    /// Inserts a new analysis with a request count of 1. Losing a race
    /// for the same key is reported as [`InsertOutcome::AlreadyExists`],
    /// never as an error.
    fn insert(&self, analysis: NewAnalysis) -> BoxFuture<'_, Result<InsertOutcome, BackendError>>;

    fn increment_request_count(&self, id: Id) -> BoxFuture<'_, Result<(), BackendError>>;

    fn increment_request_count_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<(), BackendError>>;

    /// Returns one page of the listed (non-moderated, scored) analyses
    /// of a locale, together with the total number of listed analyses.
    fn list(
        &self,
        locale: Locale,
        order: SortOrder,
        page: Page,
    ) -> BoxFuture<'_, Result<(Vec<ProfessionSummary>, i64), BackendError>>;

    fn top_risky(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>>;

    fn top_safe(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgPoolOptions, PgRow},
        types::Json,
    };
    use time::OffsetDateTime;
    use tokio::sync::OnceCell;

    use crate::analysis::{
        AnalysisKey, AnalysisRecord, ClassificationResult, Id, InsertOutcome, NewAnalysis, ProfessionCategory,
        ProfessionSummary, Times,
    };
    use crate::errors::BackendError;
    use crate::locale::Locale;
    use crate::pagination::{Page, SortOrder};

    const PROFESSION_LOCALE_CONSTRAINT: &str = "profession_analysis_profession_locale";

    /// SQLSTATE `duplicate_column`.
    const DUPLICATE_COLUMN: &str = "42701";

    /// Columns added after the table was first shipped, in order.
    const ADDITIVE_COLUMNS: &[&str] = &[
        include_str!("queries/add_risk_percentage.sql"),
        include_str!("queries/add_is_moderated.sql"),
        include_str!("queries/add_category.sql"),
    ];

    pub struct PgDb {
        pool: PgPool,
        schema: OnceCell<()>,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb {
                pool,
                schema: OnceCell::new(),
            }
        }

        /// Opens a pool whose connection checkouts give up after
        /// `acquire_timeout`.
        pub async fn connect(
            connection_string: &str,
            max_connections: u32,
            acquire_timeout: Duration,
        ) -> Result<Self, BackendError> {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(acquire_timeout)
                .connect(connection_string)
                .await
                .map_err(map_sqlx_error)?;

            Ok(PgDb::new(pool))
        }

        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        /// Runs the schema initialization once per process; later calls
        /// return immediately.
        async fn ready(&self) -> Result<(), BackendError> {
            self.schema
                .get_or_try_init(|| initialize_schema(&self.pool))
                .await
                .map(|_| ())
        }
    }

    async fn initialize_schema(pool: &PgPool) -> Result<(), BackendError> {
        sqlx::query(include_str!("queries/create_table.sql"))
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;

        for statement in ADDITIVE_COLUMNS {
            add_column(pool, statement).await.map_err(map_sqlx_error)?;
        }

        sqlx::query(include_str!("queries/create_listing_index.sql"))
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn add_column(pool: &PgPool, statement: &'static str) -> Result<(), sqlx::Error> {
        match sqlx::query(statement).execute(pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref e)) if e.code().as_deref() == Some(DUPLICATE_COLUMN) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn ensure_schema(&self) -> BoxFuture<'_, Result<(), BackendError>> {
            self.ready().boxed()
        }

        fn find_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>> {
            let key = key.clone();

            async move {
                self.ready().await?;

                let query = sqlx::query(include_str!("queries/retrieve_by_key.sql"));

                let record = query
                    .bind(key.profession())
                    .bind(key.locale().as_str())
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn retrieve(&self, id: Id) -> BoxFuture<'_, Result<Option<AnalysisRecord>, BackendError>> {
            async move {
                self.ready().await?;

                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn insert(&self, analysis: NewAnalysis) -> BoxFuture<'_, Result<InsertOutcome, BackendError>> {
            async move {
                self.ready().await?;

                let query = sqlx::query_as::<_, (Id,)>(include_str!("queries/create.sql"));

                let result = query
                    .bind(analysis.key().profession())
                    .bind(analysis.key().locale().as_str())
                    .bind(Json(analysis.result()))
                    .bind(analysis.risk_percentage())
                    .bind(analysis.is_moderated())
                    .bind(analysis.category().map(|category| category.as_str()))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error);

                match result {
                    Ok((id,)) => Ok(InsertOutcome::Inserted(id)),
                    Err(BackendError::DuplicateKey) => Ok(InsertOutcome::AlreadyExists),
                    Err(e) => Err(e),
                }
            }
            .boxed()
        }

        fn increment_request_count(&self, id: Id) -> BoxFuture<'_, Result<(), BackendError>> {
            async move {
                self.ready().await?;

                sqlx::query(include_str!("queries/increment_request_count.sql"))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn increment_request_count_by_key(&self, key: &AnalysisKey) -> BoxFuture<'_, Result<(), BackendError>> {
            let key = key.clone();

            async move {
                self.ready().await?;

                sqlx::query(include_str!("queries/increment_request_count_by_key.sql"))
                    .bind(key.profession())
                    .bind(key.locale().as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

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
                self.ready().await?;

                let (total,): (i64,) = sqlx::query_as(include_str!("queries/count_listed.sql"))
                    .bind(locale.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                let items = list(&self.pool, locale, order, page.size, page.offset()).await?;

                Ok((items, total))
            }
            .boxed()
        }

        fn top_risky(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>> {
            async move {
                self.ready().await?;

                list(&self.pool, locale, SortOrder::RiskDescending, count, 0).await
            }
            .boxed()
        }

        fn top_safe(&self, locale: Locale, count: i64) -> BoxFuture<'_, Result<Vec<ProfessionSummary>, BackendError>> {
            async move {
                self.ready().await?;

                list(&self.pool, locale, SortOrder::RiskAscending, count, 0).await
            }
            .boxed()
        }
    }

    async fn list(
        pool: &PgPool,
        locale: Locale,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProfessionSummary>, BackendError> {
        let query = match order {
            SortOrder::RiskAscending => sqlx::query(include_str!("queries/list_ascending.sql")),
            SortOrder::RiskDescending => sqlx::query(include_str!("queries/list_descending.sql")),
        };

        let items = query
            .bind(locale.as_str())
            .bind(limit)
            .bind(offset)
            .try_map(|row: PgRow| {
                let id: Id = try_get(&row, "id")?;
                let profession: String = try_get(&row, "profession")?;
                let risk_percentage: i32 = try_get(&row, "risk_percentage")?;

                Ok(ProfessionSummary::new(id, profession, risk_percentage))
            })
            .fetch_all(pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(items)
    }

    fn record_from_row(row: &PgRow) -> Result<AnalysisRecord, sqlx::Error> {
        let Json(result): Json<ClassificationResult> = try_get(row, "analysis_json")?;
        let locale: String = try_get(row, "locale")?;
        let locale = Locale::parse(&locale).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let category: Option<String> = try_get(row, "category")?;
        let created_at: OffsetDateTime = try_get(row, "created_at")?;
        let updated_at: OffsetDateTime = try_get(row, "updated_at")?;

        Ok(AnalysisRecord {
            id: try_get(row, "id")?,
            profession: try_get(row, "profession")?,
            locale,
            result,
            risk_percentage: try_get(row, "risk_percentage")?,
            is_moderated: try_get(row, "is_moderated")?,
            category: category.as_deref().map(ProfessionCategory::from_column),
            request_count: try_get(row, "request_count")?,
            times: Times {
                created_at,
                updated_at,
            },
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::Row;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(PROFESSION_LOCALE_CONSTRAINT) => {
                BackendError::DuplicateKey
            }
            Error::PoolTimedOut | Error::PoolClosed => BackendError::StoreUnavailable,
            _ => BackendError::Sqlx { source: error },
        }
    }
}
