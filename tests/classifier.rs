use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use risk_backend::classifier::{Classifier, ClassifierConfig, HttpClassifier};
use risk_backend::errors::BackendError;
use risk_backend::locale::Locale;

fn classifier(server: &MockServer, timeout: Duration) -> HttpClassifier {
    HttpClassifier::new(ClassifierConfig {
        base_url: server.uri(),
        api_key: "test-key".to_owned(),
        model: "test-model".to_owned(),
        timeout,
        temperature: 0.7,
    })
    .expect("build classifier")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "completion-1",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
}

const REPLY: &str = r#"{
    "risk_score": 64,
    "verdict": "Partly automatable",
    "reasoning": "Routine work is going away. Judgement stays.",
    "safe_skills": ["judgement", "negotiation", "mentoring"],
    "replaced_tasks": ["reporting", "scheduling", "data entry"],
    "is_profession": true,
    "is_censored": false,
    "category": "finance"
}"#;

#[tokio::test]
async fn classifies_through_chat_completions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Profession: Accountant" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(REPLY)))
        .expect(1)
        .mount(&server)
        .await;

    let result = classifier(&server, Duration::from_secs(5))
        .classify("Accountant", Locale::parse("ru").unwrap())
        .await
        .expect("classification succeeds");

    assert_eq!(result.risk_score, 64);
    assert_eq!(result.safe_skills.len(), 3);
    assert!(!result.is_censored);
}

#[tokio::test]
async fn error_statuses_mean_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let error = classifier(&server, Duration::from_secs(5))
        .classify("Accountant", Locale::default())
        .await
        .unwrap_err();

    match error {
        BackendError::ClassificationUnavailable { reason } => assert!(reason.contains("503")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn slow_replies_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(REPLY))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let error = classifier(&server, Duration::from_millis(200))
        .classify("Accountant", Locale::default())
        .await
        .unwrap_err();

    assert!(matches!(error, BackendError::ClassificationUnavailable { .. }));
}

#[tokio::test]
async fn malformed_content_is_invalid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I am not JSON")))
        .mount(&server)
        .await;

    let error = classifier(&server, Duration::from_secs(5))
        .classify("Accountant", Locale::default())
        .await
        .unwrap_err();

    match error {
        BackendError::InvalidClassifierResponse { raw, .. } => assert_eq!(raw, "I am not JSON"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn malformed_envelopes_are_invalid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let error = classifier(&server, Duration::from_secs(5))
        .classify("Accountant", Locale::default())
        .await
        .unwrap_err();

    assert!(matches!(error, BackendError::InvalidClassifierResponse { .. }));
}
