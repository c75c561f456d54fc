use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use warp::http::{Response, StatusCode};
use warp::hyper::body::Bytes;

use risk_backend::analysis::{AnalysisKey, NewAnalysis};
use risk_backend::classifier::mock::{censored_result, sample_result, MockClassifier};
use risk_backend::db::mock::MockDb;
use risk_backend::environment::{Config, Environment};
use risk_backend::locale::Locale;
use risk_backend::routes;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AnalysisResponse {
    risk_score: u8,
    verdict: String,
    reasoning: String,
    safe_skills: Vec<String>,
    replaced_tasks: Vec<String>,
    is_profession: bool,
    is_censored: bool,
    category: Option<String>,
    id: Option<i64>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Summary {
    id: i64,
    profession: String,
    risk_percentage: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PageResponse {
    items: Vec<Summary>,
    total: i64,
    page: i64,
    total_pages: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopResponse {
    risky: Vec<Summary>,
    safe: Vec<Summary>,
}

struct Fixture {
    db: Arc<MockDb>,
    classifier: Arc<MockClassifier>,
    environment: Environment,
}

impl Fixture {
    fn new(classifier: MockClassifier) -> Self {
        let db = Arc::new(MockDb::new());
        let classifier = Arc::new(classifier);
        let environment = Environment::new(
            Arc::new(log::discard()),
            db.clone(),
            classifier.clone(),
            Config::default(),
        );

        Fixture {
            db,
            classifier,
            environment,
        }
    }

    fn seed(&self, title: &str, locale: &str, risk_score: u8) -> i64 {
        let key = AnalysisKey::new(title, Locale::parse(locale).unwrap()).unwrap();

        self.db.seed(NewAnalysis::new(key, sample_result(risk_score)))
    }

    async fn post(&self, body: Value) -> Response<Bytes> {
        warp::test::request()
            .method("POST")
            .path("/analyze")
            .json(&body)
            .reply(&routes::make_api(self.environment.clone()))
            .await
    }

    async fn get(&self, path: &str) -> Response<Bytes> {
        warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes::make_api(self.environment.clone()))
            .await
    }
}

fn parse<T: for<'de> Deserialize<'de>>(response: &Response<Bytes>) -> T {
    serde_json::from_slice(response.body()).expect("parse response body")
}

#[tokio::test]
async fn analyses_are_cached_by_normalized_title() {
    let fixture = Fixture::new(MockClassifier::returning(sample_result(42)));

    let first = fixture
        .post(json!({ "title": "Software Engineer", "locale": "en" }))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().contains_key("server-timing"));

    let first: AnalysisResponse = parse(&first);
    assert_eq!(first.risk_score, 42);
    assert_eq!(first.safe_skills.len(), 3);
    assert_eq!(first.replaced_tasks.len(), 3);
    assert!(first.is_profession);
    assert!(!first.is_censored);
    assert!(!first.verdict.is_empty());
    assert!(!first.reasoning.is_empty());
    assert_eq!(first.category.as_deref(), Some("management"));
    assert!(first.id.is_some());

    let second = fixture
        .post(json!({ "jobTitle": " software engineer ", "locale": "en" }))
        .await;
    assert_eq!(second.status(), StatusCode::OK);

    let second: AnalysisResponse = parse(&second);
    assert_eq!(second.id, first.id);
    assert_eq!(fixture.classifier.calls(), 1);
}

#[tokio::test]
async fn locale_defaults_to_english() {
    let fixture = Fixture::new(MockClassifier::returning(sample_result(42)));

    let response = fixture.post(json!({ "title": "Baker" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(fixture.db.records()[0].locale.as_str(), "en");
}

#[tokio::test]
async fn moderated_titles_stay_hidden() {
    let fixture = Fixture::new(MockClassifier::returning(censored_result()));

    let response = fixture.post(json!({ "title": "politician", "locale": "en" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let analysis: AnalysisResponse = parse(&response);
    assert!(analysis.is_censored);
    assert_eq!(analysis.risk_score, 0);
    assert!(analysis.safe_skills.is_empty());
    assert!(analysis.replaced_tasks.is_empty());
    assert_eq!(analysis.id, None);

    let page: PageResponse = parse(&fixture.get("/professions?locale=en&sort=risk_desc").await);
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);

    let id = fixture.db.records()[0].id;
    let response = fixture.get(&format!("/professions/{}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_input_is_a_client_error() {
    let fixture = Fixture::new(MockClassifier::returning(sample_result(42)));

    for body in &[
        json!({ "title": "   ", "locale": "en" }),
        json!({ "title": "Baker", "locale": "klingon" }),
        json!({ "title": "a".repeat(300), "locale": "en" }),
    ] {
        let response = fixture.post(body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);

        let body: Value = parse(&response);
        assert_ne!(body["error"], "Processing failed");
        assert!(body["error"].is_string());
    }

    let response = fixture.post(json!({ "locale": "en" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(fixture.classifier.calls(), 0);
}

#[tokio::test]
async fn downstream_failures_are_masked() {
    let fixture = Fixture::new(MockClassifier::unavailable());

    let response = fixture.post(json!({ "title": "Baker", "locale": "en" })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = parse(&response);
    assert_eq!(body["error"], "Processing failed");
    assert!(fixture.db.records().is_empty());
}

#[tokio::test]
async fn listing_pages_and_sorts() {
    let fixture = Fixture::new(MockClassifier::unavailable());

    for (i, risk) in [30, 90, 10, 70, 50].iter().enumerate() {
        fixture.seed(&format!("job {}", i), "en", *risk);
    }
    fixture.seed("beruf", "de", 99);

    let response = fixture.get("/professions?locale=en&page=2&limit=2&sort=risk_asc").await;
    assert_eq!(response.status(), StatusCode::OK);

    let page: PageResponse = parse(&response);
    assert_eq!(page.total, 5);
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 3);
    assert_eq!(
        page.items.iter().map(|item| item.risk_percentage).collect::<Vec<_>>(),
        vec![50, 70]
    );

    let page: PageResponse = parse(&fixture.get("/professions").await);
    assert_eq!(page.items[0].risk_percentage, 90);
    assert_eq!(page.total_pages, 1);

    let response = fixture.get("/professions?sort=popularity").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = fixture.get("/professions?page=first").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn top_lists() {
    let fixture = Fixture::new(MockClassifier::unavailable());

    for (i, risk) in [30, 90, 10, 70, 50, 20, 80].iter().enumerate() {
        fixture.seed(&format!("job {}", i), "en", *risk);
    }

    let response = fixture.get("/professions/top?locale=en").await;
    assert_eq!(response.status(), StatusCode::OK);

    let top: TopResponse = parse(&response);
    assert_eq!(
        top.risky.iter().map(|item| item.risk_percentage).collect::<Vec<_>>(),
        vec![90, 80, 70, 50, 30]
    );
    assert_eq!(
        top.safe.iter().map(|item| item.risk_percentage).collect::<Vec<_>>(),
        vec![10, 20, 30, 50, 70]
    );
}

#[tokio::test]
async fn direct_lookup() {
    let fixture = Fixture::new(MockClassifier::unavailable());
    let id = fixture.seed("Welder", "en", 25);

    let response = fixture.get(&format!("/professions/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = parse(&response);
    assert_eq!(body["id"], id);
    assert_eq!(body["profession"], "welder");
    assert_eq!(body["locale"], "en");
    assert_eq!(body["riskPercentage"], 25);
    assert_eq!(body["riskScore"], 25);
    assert_eq!(body["requestCount"], 1);
    assert!(body["createdAt"].is_string());

    let body: Value = parse(&fixture.get(&format!("/professions/{}", id)).await);
    assert_eq!(body["requestCount"], 2);

    let response = fixture.get("/professions/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = parse(&response);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn healthz_reports_build_metadata() {
    let response = warp::test::request()
        .method("GET")
        .path("/healthz")
        .reply(&routes::admin::make_healthz_route())
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = parse(&response);
    assert_eq!(body["name"], "risk-backend");
    assert_eq!(body["version"], info::VERSION);
}
