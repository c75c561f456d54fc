use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::errors::BackendError;
use crate::locale::Locale;
use crate::normalization::normalize_title;

/// The surrogate identity of a stored analysis.
pub type Id = i64;

/// The largest risk score a classifier may report.
pub const MAX_RISK_SCORE: u8 = 100;

/// How many skills or tasks are kept from a classification.
pub const MAX_LIST_ITEMS: usize = 3;

/// The cache identity of an analysis: a normalized profession in a
/// given locale.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    profession: String,
    locale: Locale,
}

impl AnalysisKey {
    /// Builds a key from user input, failing if the title is unusable.
    pub fn new(raw_title: &str, locale: Locale) -> Result<Self, BackendError> {
        Ok(AnalysisKey {
            profession: normalize_title(raw_title)?,
            locale,
        })
    }

    pub fn profession(&self) -> &str {
        &self.profession
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}

/// The structured verdict produced by the classifier and stored as a
/// JSON document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub risk_score: u8,
    pub verdict: String,
    pub reasoning: String,
    pub safe_skills: Vec<String>,
    pub replaced_tasks: Vec<String>,
    pub is_profession: bool,
    pub is_censored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ProfessionCategory>,
}

impl ClassificationResult {
    /// Applies the producer contract: lists are capped at
    /// [`MAX_LIST_ITEMS`], and censored results carry no score and no
    /// lists.
    pub fn sanitized(mut self) -> Self {
        if self.is_censored {
            self.risk_score = 0;
            self.safe_skills.clear();
            self.replaced_tasks.clear();
        } else {
            self.safe_skills.truncate(MAX_LIST_ITEMS);
            self.replaced_tasks.truncate(MAX_LIST_ITEMS);
        }

        self
    }
}

/// The closed set of profession categories the classifier chooses
/// from. Used for reporting only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfessionCategory {
    InformationTechnology,
    Management,
    Administrative,
    Government,
    Marketing,
    Sales,
    Finance,
    Legal,
    Healthcare,
    Education,
    Science,
    Engineering,
    Production,
    Construction,
    Transport,
    Hospitality,
    Retail,
    Arts,
    Media,
    Agriculture,
    Security,
    Sports,
    Beauty,
    HomeServices,
    /// Anything the classifier names that is not in this list.
    #[serde(other)]
    Other,
}

impl ProfessionCategory {
    pub const ALL: &'static [ProfessionCategory] = &[
        ProfessionCategory::InformationTechnology,
        ProfessionCategory::Management,
        ProfessionCategory::Administrative,
        ProfessionCategory::Government,
        ProfessionCategory::Marketing,
        ProfessionCategory::Sales,
        ProfessionCategory::Finance,
        ProfessionCategory::Legal,
        ProfessionCategory::Healthcare,
        ProfessionCategory::Education,
        ProfessionCategory::Science,
        ProfessionCategory::Engineering,
        ProfessionCategory::Production,
        ProfessionCategory::Construction,
        ProfessionCategory::Transport,
        ProfessionCategory::Hospitality,
        ProfessionCategory::Retail,
        ProfessionCategory::Arts,
        ProfessionCategory::Media,
        ProfessionCategory::Agriculture,
        ProfessionCategory::Security,
        ProfessionCategory::Sports,
        ProfessionCategory::Beauty,
        ProfessionCategory::HomeServices,
        ProfessionCategory::Other,
    ];

    /// The identifier used in the prompt and in the `category` column.
    pub fn as_str(&self) -> &'static str {
        use ProfessionCategory::*;

        match self {
            InformationTechnology => "information_technology",
            Management => "management",
            Administrative => "administrative",
            Government => "government",
            Marketing => "marketing",
            Sales => "sales",
            Finance => "finance",
            Legal => "legal",
            Healthcare => "healthcare",
            Education => "education",
            Science => "science",
            Engineering => "engineering",
            Production => "production",
            Construction => "construction",
            Transport => "transport",
            Hospitality => "hospitality",
            Retail => "retail",
            Arts => "arts",
            Media => "media",
            Agriculture => "agriculture",
            Security => "security",
            Sports => "sports",
            Beauty => "beauty",
            HomeServices => "home_services",
            Other => "other",
        }
    }

    pub fn from_column(value: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == value)
            .unwrap_or(ProfessionCategory::Other)
    }
}

/// A row about to be inserted. The denormalized columns are derived
/// from the result here and nowhere else.
#[derive(Clone, Debug)]
pub struct NewAnalysis {
    pub(crate) key: AnalysisKey,
    pub(crate) result: ClassificationResult,
}

impl NewAnalysis {
    pub fn new(key: AnalysisKey, result: ClassificationResult) -> Self {
        NewAnalysis { key, result }
    }

    pub fn key(&self) -> &AnalysisKey {
        &self.key
    }

    pub fn result(&self) -> &ClassificationResult {
        &self.result
    }

    pub fn risk_percentage(&self) -> i32 {
        i32::from(self.result.risk_score)
    }

    pub fn is_moderated(&self) -> bool {
        self.result.is_censored
    }

    pub fn category(&self) -> Option<ProfessionCategory> {
        self.result.category
    }
}

/// The times a row was created and last written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A single stored analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisRecord {
    pub id: Id,
    pub profession: String,
    pub locale: Locale,
    pub result: ClassificationResult,
    pub risk_percentage: Option<i32>,
    pub is_moderated: bool,
    pub category: Option<ProfessionCategory>,
    pub request_count: i64,
    pub times: Times,
}

/// The public view of a stored analysis, as returned by a direct
/// lookup.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    id: Id,
    profession: String,
    locale: Locale,
    risk_percentage: Option<i32>,
    request_count: i64,
    #[serde(flatten)]
    times: Times,
    #[serde(flatten)]
    result: ClassificationResult,
}

impl From<AnalysisRecord> for AnalysisView {
    fn from(record: AnalysisRecord) -> Self {
        AnalysisView {
            id: record.id,
            profession: record.profession,
            locale: record.locale,
            risk_percentage: record.risk_percentage,
            request_count: record.request_count,
            times: record.times,
            result: record.result,
        }
    }
}

/// A minimal version of a stored analysis, used by the listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionSummary {
    pub id: Id,
    pub profession: String,
    pub risk_percentage: i32,
}

impl ProfessionSummary {
    pub fn new(id: Id, profession: String, risk_percentage: i32) -> Self {
        Self {
            id,
            profession,
            risk_percentage,
        }
    }
}

/// What the store did with an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created with this identity.
    Inserted(Id),

    /// Another writer created the row for the same key first.
    AlreadyExists,
}

/// The answer to an analysis request. The identity is withheld for
/// moderated rows and for results that could not be stored.
///
/// Moderation follows the row's flag rather than the stored result, since
/// the flag can be changed on its own after the row is written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub result: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl Analysis {
    pub fn new(result: ClassificationResult, id: Option<Id>, is_moderated: bool) -> Self {
        let id = if is_moderated { None } else { id };

        Analysis { result, id }
    }

    pub fn unstored(result: ClassificationResult) -> Self {
        Analysis { result, id: None }
    }
}
