use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::analysis::{ClassificationResult, ProfessionCategory, MAX_LIST_ITEMS, MAX_RISK_SCORE};
use crate::config::{get_variable, get_variable_or, parse_variable_or};
use crate::errors::BackendError;
use crate::locale::Locale;

pub mod mock;

/// Produces a verdict for a job title. Implementations make exactly
/// one attempt per call.
pub trait Classifier {
    fn classify<'a>(
        &'a self,
        title: &'a str,
        locale: Locale,
    ) -> BoxFuture<'a, Result<ClassificationResult, BackendError>>;
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        ClassifierConfig {
            base_url: get_variable_or("BACKEND_CLASSIFIER_BASE_URL", "https://api.deepseek.com"),
            api_key: get_variable("BACKEND_CLASSIFIER_API_KEY"),
            model: get_variable_or("BACKEND_CLASSIFIER_MODEL", "deepseek-chat"),
            timeout: Duration::from_secs(parse_variable_or("BACKEND_CLASSIFIER_TIMEOUT_SECS", 30)),
            temperature: parse_variable_or("BACKEND_CLASSIFIER_TEMPERATURE", 0.7),
        }
    }
}

/// A client for an OpenAI-compatible chat completion endpoint.
#[derive(Clone, Debug)]
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

impl HttpClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, BackendError> {
        let mut user_agent = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&info::user_agent())
            .map_err(|e| BackendError::InvalidConfiguration { reason: e.to_string() })?;
        user_agent.insert(header::USER_AGENT, value);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(user_agent)
            .build()
            .map_err(|e| BackendError::InvalidConfiguration { reason: e.to_string() })?;

        // without the trailing slash `join` would replace the last segment
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let endpoint = Url::parse(&base_url)
            .and_then(|url| url.join("chat/completions"))
            .map_err(|e| BackendError::InvalidConfiguration { reason: e.to_string() })?;

        Ok(HttpClassifier {
            client,
            endpoint,
            api_key: config.api_key,
            model: config.model,
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self, title: &str, locale: Locale) -> Result<ClassificationResult, BackendError> {
        let system_prompt = system_prompt(locale);
        let user_prompt = format!("Profession: {}", title);

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();

            return Err(BackendError::ClassificationUnavailable {
                reason: format!("classifier returned status {}: {}", status, error_body),
            });
        }

        let raw = response.text().await.map_err(unavailable)?;

        let envelope: ChatResponse = serde_json::from_str(&raw).map_err(|e| BackendError::InvalidClassifierResponse {
            raw: raw.clone(),
            reason: format!("malformed completion envelope: {}", e),
        })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidClassifierResponse {
                raw: raw.clone(),
                reason: "completion has no content".to_owned(),
            })?;

        parse_reply(&content)
    }
}

impl Classifier for HttpClassifier {
    fn classify<'a>(
        &'a self,
        title: &'a str,
        locale: Locale,
    ) -> BoxFuture<'a, Result<ClassificationResult, BackendError>> {
        self.request(title, locale).boxed()
    }
}

fn unavailable(error: reqwest::Error) -> BackendError {
    let reason = if error.is_timeout() {
        format!("classifier timed out: {}", error)
    } else {
        format!("classifier unreachable: {}", error)
    };

    BackendError::ClassificationUnavailable { reason }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// The JSON document the model is instructed to produce.
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    risk_score: u32,
    verdict: String,
    reasoning: String,
    safe_skills: Vec<String>,
    replaced_tasks: Vec<String>,
    is_profession: bool,
    is_censored: bool,
    #[serde(default)]
    category: Option<ProfessionCategory>,
}

/// Parses the model's reply. Anything that is not a complete document
/// with an in-range score is rejected; over-long lists are trimmed and
/// censored replies are stripped down to the degenerate form.
pub fn parse_reply(content: &str) -> Result<ClassificationResult, BackendError> {
    let invalid = |reason: String| BackendError::InvalidClassifierResponse {
        raw: content.to_owned(),
        reason,
    };

    let reply: ClassifierReply = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;

    if reply.risk_score > u32::from(MAX_RISK_SCORE) {
        return Err(invalid(format!(
            "risk score {} is outside 0..={}",
            reply.risk_score, MAX_RISK_SCORE
        )));
    }

    let result = ClassificationResult {
        risk_score: reply.risk_score as u8,
        verdict: reply.verdict,
        reasoning: reply.reasoning,
        safe_skills: reply.safe_skills,
        replaced_tasks: reply.replaced_tasks,
        is_profession: reply.is_profession,
        is_censored: reply.is_censored,
        category: reply.category,
    };

    Ok(result.sanitized())
}

/// Builds the system instruction for a locale.
pub fn system_prompt(locale: Locale) -> String {
    let categories = ProfessionCategory::ALL
        .iter()
        .map(|category| category.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert AI Job Market Analyst.
Analyze the user's profession and return a JSON object.
Language of response: {locale}.

JSON Structure required:
{{
  "risk_score": (integer 0-100),
  "verdict": (short punchy title),
  "reasoning": (2 sentences explanation),
  "safe_skills": (array of {items} skills hard to automate),
  "replaced_tasks": (array of {items} tasks AI will take over),
  "is_profession": (true if the input is a real profession or job title),
  "is_censored": (true if the input must be moderated),
  "category": (one of: {categories})
}}

Moderation rules:
- If the input is not a profession, set "is_profession" to false.
- If the input is political, religious, profane or sexual, or is not a profession, set "is_censored" to true, "risk_score" to 0, and both arrays to [].
- Otherwise set "is_censored" to false."#,
        locale = locale,
        items = MAX_LIST_ITEMS,
        categories = categories,
    )
}
