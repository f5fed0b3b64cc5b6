//! Request and response shapes of the AI-backed endpoints, shared by the
//! proxy server and its clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::extract::{extract_json, snippet, strip_fences};
use crate::models::coerce::text_from_string_or_number;

/// Characters of raw model output quoted back when it is not valid JSON.
const RAW_SNIPPET_LEN: usize = 200;

/// Keys an estimate must carry.
pub const GI_KEYS: [&str; 4] = ["food", "gi", "calories", "suitability"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogContentRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl BlogContentRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            keywords: None,
        }
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        let keywords = keywords.into();
        self.keywords = (!keywords.trim().is_empty()).then_some(keywords);
        self
    }
}

/// A generated article, ready to prefill the create-post form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogContent {
    pub title: String,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiRequest {
    #[serde(default)]
    pub food: String,
    #[serde(default)]
    pub prompt: String,
}

impl GiRequest {
    /// Builds the request the GI checker sends for `food`.
    pub fn for_food(food: impl Into<String>) -> Self {
        let food = food.into();
        let prompt = gi_prompt(&food);
        Self { food, prompt }
    }
}

/// Glycemic index estimate. Values are rendered as text whether the model
/// answered with strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiEstimate {
    #[serde(deserialize_with = "text_from_string_or_number")]
    pub food: String,
    #[serde(deserialize_with = "text_from_string_or_number")]
    pub gi: String,
    #[serde(deserialize_with = "text_from_string_or_number")]
    pub calories: String,
    #[serde(deserialize_with = "text_from_string_or_number")]
    pub suitability: String,
}

impl fmt::Display for GiEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Food:        {}", self.food)?;
        writeln!(f, "GI:          {}", self.gi)?;
        writeln!(f, "Calories:    {}", self.calories)?;
        write!(f, "Suitability: {}", self.suitability)
    }
}

/// Body of the GI endpoint. `result` stays untyped on the wire so clients can
/// report a partial shape instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GiResponse {
    pub fn ok(estimate: &GiEstimate) -> Self {
        Self {
            success: true,
            result: serde_json::to_value(estimate).ok(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// One headline from the diabetes news feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsFeed {
    pub items: Vec<NewsItem>,
}

/// Why model output could not be turned into a GI estimate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GiParseError {
    #[error("Failed to interpret AI response. It might not be valid JSON. Raw response snippet: {snippet}...")]
    InvalidJson { snippet: String },

    #[error("AI response format was incorrect or missing data. Please try again.")]
    MissingKeys,
}

/// Model output for a blog request was not the expected JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("AI generated invalid JSON. Please try again or refine your prompt.")]
pub struct BlogParseError {
    pub raw: String,
}

pub fn gi_prompt(food: &str) -> String {
    format!(
        "Estimate the glycemic index (GI), approximate calorie content per serving, \
         and whether the following food is suitable for diabetic patients based on its GI: \"{}\". \
         Respond STRICTLY in JSON format with the following keys: {{food, gi, calories, suitability}}",
        food
    )
}

pub fn blog_prompt(request: &BlogContentRequest) -> String {
    let mut prompt = format!(
        "Generate a highly SEO-friendly blog post based on the following topic: \"{}\".",
        request.topic.trim()
    );
    if let Some(keywords) = &request.keywords {
        prompt.push_str(&format!(
            " Include the following keywords for SEO: {}.",
            keywords.trim()
        ));
    }
    prompt.push_str(
        " The blog post should be well-structured with an engaging title, a concise summary \
         (1-2 sentences), and comprehensive content. Provide the output in JSON format with \
         the following structure: {\"title\": \"string\", \"summary\": \"string\", \
         \"content\": \"string (Markdown format)\", \"seoKeywords\": [\"string\"]}. \
         Ensure the content is informative and relevant to diabetes management.",
    );
    prompt
}

/// Checks that an estimate carries every key, accepting strings or numbers.
pub fn validate_gi_result(value: &Value) -> Result<GiEstimate, GiParseError> {
    let object = value.as_object().ok_or(GiParseError::MissingKeys)?;
    if GI_KEYS
        .iter()
        .any(|key| object.get(*key).map_or(true, Value::is_null))
    {
        return Err(GiParseError::MissingKeys);
    }
    serde_json::from_value(value.clone()).map_err(|_| GiParseError::MissingKeys)
}

/// Turns raw model text into an estimate.
pub fn parse_gi_response(raw: &str) -> Result<GiEstimate, GiParseError> {
    let candidate = extract_json(raw).unwrap_or(raw);
    let value: Value = serde_json::from_str(candidate).map_err(|_| GiParseError::InvalidJson {
        snippet: snippet(raw, RAW_SNIPPET_LEN).to_string(),
    })?;
    validate_gi_result(&value)
}

/// Turns raw model text into blog content.
pub fn parse_blog_response(raw: &str) -> Result<BlogContent, BlogParseError> {
    serde_json::from_str(strip_fences(raw)).map_err(|_| BlogParseError {
        raw: raw.to_string(),
    })
}
