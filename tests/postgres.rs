//! Runs the store against a real database. These tests are ignored by
//! default; run them with `--ignored` and `BACKEND_DB_CONNECTION_STRING`
//! pointing at a disposable database.

use std::sync::Arc;
use std::time::Duration;

use risk_backend::analysis::{AnalysisKey, InsertOutcome, NewAnalysis};
use risk_backend::classifier::mock::{censored_result, sample_result};
use risk_backend::config::get_variable;
use risk_backend::db::{Db, PgDb};
use risk_backend::locale::Locale;
use risk_backend::pagination::{Page, SortOrder};

/// Connects and clears the rows of one locale, so that tests using
/// different locales can run side by side.
async fn connect(locale: &str) -> PgDb {
    dotenv::dotenv().ok();

    let db = PgDb::connect(
        &get_variable("BACKEND_DB_CONNECTION_STRING"),
        5,
        Duration::from_secs(5),
    )
    .await
    .expect("connect to database");

    db.ensure_schema().await.expect("create schema");

    sqlx::query("DELETE FROM profession_analysis WHERE locale = $1")
        .bind(locale)
        .execute(db.pool())
        .await
        .expect("clear table");

    db
}

fn key(title: &str, locale: &str) -> AnalysisKey {
    AnalysisKey::new(title, Locale::parse(locale).unwrap()).unwrap()
}

#[tokio::test]
#[ignore]
async fn postgres_store_works() {
    let db = Arc::new(connect("de").await);

    // schema initialization is idempotent
    db.ensure_schema().await.unwrap();
    PgDb::new(db.pool().clone()).ensure_schema().await.unwrap();

    let nurse = key("Nurse", "de");

    let id = match db.insert(NewAnalysis::new(nurse.clone(), sample_result(20))).await.unwrap() {
        InsertOutcome::Inserted(id) => id,
        other => panic!("unexpected outcome {:?}", other),
    };

    assert_eq!(
        db.insert(NewAnalysis::new(nurse.clone(), sample_result(80))).await.unwrap(),
        InsertOutcome::AlreadyExists
    );

    let record = db.find_by_key(&nurse).await.unwrap().expect("find by key");
    assert_eq!(record.id, id);
    assert_eq!(record.result, sample_result(20));
    assert_eq!(record.risk_percentage, Some(20));
    assert_eq!(record.request_count, 1);
    assert!(!record.is_moderated);

    db.increment_request_count(id).await.unwrap();
    db.increment_request_count_by_key(&nurse).await.unwrap();

    let record = db.retrieve(id).await.unwrap().expect("retrieve");
    assert_eq!(record.request_count, 3);
    assert!(record.times.updated_at >= record.times.created_at);

    assert!(db.find_by_key(&key("nurse", "fr")).await.unwrap().is_none());

    for (title, risk) in &[("Pilot", 50), ("Clerk", 90), ("Gardener", 5)] {
        db.insert(NewAnalysis::new(key(title, "de"), sample_result(*risk)))
            .await
            .unwrap();
    }
    db.insert(NewAnalysis::new(key("Politician", "de"), censored_result()))
        .await
        .unwrap();

    let de = Locale::parse("de").unwrap();

    let (items, total) = db
        .list(de, SortOrder::RiskDescending, Page::new(1, 3, 100))
        .await
        .unwrap();
    assert_eq!(total, 4);
    assert_eq!(
        items.iter().map(|item| item.risk_percentage).collect::<Vec<_>>(),
        vec![90, 50, 20]
    );

    let (items, _) = db
        .list(de, SortOrder::RiskDescending, Page::new(2, 3, 100))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].profession, "gardener");

    let safe = db.top_safe(de, 5).await.unwrap();
    assert_eq!(safe.len(), 4);
    assert!(safe.iter().all(|item| item.profession != "politician"));

    let risky = db.top_risky(de, 2).await.unwrap();
    assert_eq!(risky[0].profession, "clerk");
}

#[tokio::test]
#[ignore]
async fn concurrent_inserts_keep_one_row() {
    let db = Arc::new(connect("fr").await);
    let baker = key("Baker", "fr");

    let attempts = (0..8).map(|i| {
        let db = db.clone();
        let baker = baker.clone();

        tokio::spawn(async move { db.insert(NewAnalysis::new(baker, sample_result(i))).await })
    });

    let outcomes = futures::future::join_all(attempts).await;
    let inserted = outcomes
        .into_iter()
        .map(|outcome| outcome.expect("join insert").expect("insert"))
        .filter(|outcome| matches!(outcome, InsertOutcome::Inserted(_)))
        .count();

    assert_eq!(inserted, 1);
}
