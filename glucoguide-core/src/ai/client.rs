//! HTTP client for the proxy server's AI and news endpoints.

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::contracts::{
    validate_gi_result, BlogContent, BlogContentRequest, GiEstimate, GiRequest, GiResponse,
    NewsFeed, NewsItem,
};
use crate::error::AppError;

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Talks to the `glucoguide-server` proxy.
#[derive(Debug, Clone)]
pub struct AiClient {
    base_url: String,
    http: reqwest::Client,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Asks the proxy for an SEO blog article on `request.topic`.
    pub async fn generate_blog_content(
        &self,
        request: &BlogContentRequest,
    ) -> Result<BlogContent, AppError> {
        if request.topic.trim().is_empty() {
            return Err(AppError::validation("Topic is required."));
        }
        let response = self
            .http
            .post(self.url("/generate-blog-content"))
            .json(request)
            .send()
            .await
            .map_err(unavailable)?;
        decode(check_status(response).await?).await
    }

    /// Asks the proxy to estimate GI, calories and suitability for `food`.
    pub async fn estimate_gi(&self, food: &str) -> Result<GiEstimate, AppError> {
        let food = food.trim();
        if food.is_empty() {
            return Err(AppError::validation("Please enter a food name."));
        }
        let response = self
            .http
            .post(self.url("/gi"))
            .json(&GiRequest::for_food(food))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        let body: GiResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Err(AppError::generation(format!(
                    "Unexpected response ({}): {}",
                    status, e
                )))
            }
        };
        if !status.is_success() || !body.success {
            return Err(AppError::generation(
                body.error
                    .unwrap_or_else(|| format!("Server returned status {}", status)),
            ));
        }
        let result = body
            .result
            .ok_or_else(|| AppError::generation("Response carried no result"))?;
        validate_gi_result(&result).map_err(|e| AppError::generation(e.to_string()))
    }

    /// Latest diabetes headlines.
    pub async fn fetch_news(&self) -> Result<Vec<NewsItem>, AppError> {
        let response = self
            .http
            .get(self.url("/rss"))
            .send()
            .await
            .map_err(unavailable)?;
        let feed: NewsFeed = decode(check_status(response).await?).await?;
        Ok(feed.items)
    }
}

fn unavailable(e: reqwest::Error) -> AppError {
    tracing::warn!(error = %e, "proxy request failed");
    AppError::UpstreamUnavailable(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(error) }) => error,
        _ => format!("Server returned status {}", status),
    };
    Err(AppError::GenerationFailed(message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    response
        .json()
        .await
        .map_err(|e| AppError::generation(format!("Unexpected response body: {}", e)))
}
