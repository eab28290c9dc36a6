use std::fmt;
use std::time::Duration;

use reelshop_model::{Category, EmailAddress, Product, ProductId, ProductPage, SignupOutcome};
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use super::envelope;
use super::filters::{ProductFilters, SearchFilters};
use crate::config::FeedConfig;
use crate::error::ApiError;

const ALREADY_SUBSCRIBED: &str = "Already subscribed";

/// Typed client for the product REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = normalize_base_url(base_url.into());
        log::info!("[ApiClient] Using base URL: {}", base_url);
        Self { client, base_url }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// One page of the main feed.
    pub async fn fetch_products(&self, filters: &ProductFilters) -> Result<ProductPage, ApiError> {
        let request = self
            .client
            .get(self.url("/api/products/comprehensive-filter"))
            .query(&filters.to_query());
        let body = self.send_json(request).await?;
        let page = envelope::feed_page(body);

        log::debug!(
            "[ApiClient] fetched {} products (page {}, more: {})",
            page.products.len(),
            page.page,
            page.has_more
        );
        Ok(page)
    }

    pub async fn search_products(
        &self,
        keyword: &str,
        filters: &SearchFilters,
    ) -> Result<ProductPage, ApiError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ApiError::InvalidInput("search keyword is empty".to_string()));
        }

        let request = self
            .client
            .get(self.url("/api/products/search"))
            .query(&filters.to_query(keyword));
        let body = self.send_json(request).await?;
        if let Some(message) = envelope::server_error(&body) {
            return Err(ApiError::Server(message));
        }
        Ok(envelope::listing(body))
    }

    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        let body = self
            .send_json(self.client.get(self.url("/api/categories")))
            .await?;
        if let Some(message) = envelope::server_error(&body) {
            return Err(ApiError::Server(message));
        }
        Ok(envelope::categories(body))
    }

    /// Categories, retried with linear backoff (`step * attempt`) while the
    /// request fails or comes back empty. Gives up with an empty list.
    pub async fn fetch_categories_with_retry(
        &self,
        max_retries: u32,
        step: Duration,
    ) -> Vec<Category> {
        let attempts = max_retries.max(1);
        for attempt in 1..=attempts {
            match self.fetch_categories().await {
                Ok(categories) if !categories.is_empty() => return categories,
                Ok(_) => log::warn!(
                    "[ApiClient] categories empty (attempt {}/{})",
                    attempt,
                    attempts
                ),
                Err(err) => log::warn!(
                    "[ApiClient] categories failed (attempt {}/{}): {}",
                    attempt,
                    attempts,
                    err
                ),
            }
            if attempt < attempts {
                tokio::time::sleep(step * attempt).await;
            }
        }
        Vec::new()
    }

    /// A single product. `None` when the body holds no decodable product.
    pub async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, ApiError> {
        let path = format!("/api/products/{}", urlencode_segment(id.as_str()));
        let body = self.send_json(self.client.get(self.url(&path))).await?;
        if let Some(message) = envelope::server_error(&body) {
            return Err(ApiError::Server(message));
        }
        Ok(envelope::single_product(body))
    }

    /// Products for a set of ids, as used by the liked view. An empty id
    /// list never reaches the network.
    pub async fn fetch_products_by_ids(
        &self,
        ids: &[ProductId],
        currency: &str,
    ) -> Result<ProductPage, ApiError> {
        if ids.is_empty() {
            return Ok(ProductPage::empty());
        }

        let request = self
            .client
            .post(self.url("/api/products/by-ids"))
            .json(&json!({ "product_ids": ids, "currency": currency }));
        let body = self.send_json(request).await?;
        if let Some(message) = envelope::server_error(&body) {
            return Err(ApiError::Server(message));
        }
        Ok(envelope::listing(body))
    }

    pub async fn health_check(&self) -> Result<Value, ApiError> {
        self.send_json(self.client.get(self.url("/api/health")))
            .await
    }

    /// Submit `email` to the mailing list endpoint at `signup_url`.
    pub async fn join_mailing_list(
        &self,
        signup_url: &str,
        email: &EmailAddress,
    ) -> Result<SignupOutcome, ApiError> {
        let response = self
            .client
            .post(signup_url)
            .form(&[("email", email.as_str())])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        match body.as_ref().and_then(|body| body.get("ok")).and_then(Value::as_bool) {
            Some(true) => {
                let message = body
                    .as_ref()
                    .and_then(|body| body.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let outcome = if message.eq_ignore_ascii_case(ALREADY_SUBSCRIBED) {
                    SignupOutcome::AlreadySubscribed
                } else {
                    SignupOutcome::Subscribed
                };
                log::info!("[ApiClient] mailing list signup: {:?}", outcome);
                Ok(outcome)
            }
            Some(false) => {
                let message = body
                    .as_ref()
                    .and_then(envelope::error_message)
                    .unwrap_or_else(|| "signup rejected".to_string());
                if status.is_success() {
                    Err(ApiError::Server(message))
                } else {
                    Err(ApiError::Status {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            None if !status.is_success() => Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            }),
            None => Err(ApiError::Server(format!(
                "unexpected signup response: {}",
                text
            ))),
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .as_ref()
                .and_then(envelope::error_message)
                .unwrap_or(text);
            log::warn!("[ApiClient] request failed with {}: {}", status, message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Trim whitespace and trailing slashes, and assume `http://` when no scheme
/// is given.
pub fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    if normalized != raw {
        log::warn!(
            "[ApiClient] Normalized base URL from '{}' to '{}'",
            raw,
            normalized
        );
    }
    normalized
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
