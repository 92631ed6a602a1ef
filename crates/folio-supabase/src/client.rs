use folio_api::ApiError;
use folio_core::Result;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::SupabaseConfig;

const MAX_ERROR_BODY: usize = 500;

/// Error body PostgREST returns with non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
    pub code: Option<String>,
}

impl PostgrestError {
    pub fn describe(&self) -> String {
        let mut text = self.message.clone();
        if let Some(code) = &self.code {
            text.push_str(&format!(" [{}]", code));
        }
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!(": {}", details));
        }
        if let Some(hint) = self.hint.as_deref().filter(|h| !h.is_empty()) {
            text.push_str(&format!(" (hint: {})", hint));
        }
        text
    }
}

/// Thin PostgREST client: one method call is one HTTP request.
pub struct SupabaseClient {
    rest_url: String,
    schema: String,
    default_headers: HeaderMap,
    client: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );

        // Request timeouts are applied by the store
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::invalid(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            rest_url: config.rest_url(),
            schema: config.schema.clone(),
            default_headers: headers,
            client,
        })
    }

    pub fn table_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/{}", self.rest_url, table)
        } else {
            format!("{}/{}?{}", self.rest_url, table, query)
        }
    }

    pub async fn get(&self, operation: &str, url: &str) -> Result<String> {
        self.send(operation, Method::GET, url, None).await
    }

    pub async fn post(&self, operation: &str, url: &str, body: &serde_json::Value) -> Result<String> {
        self.send(operation, Method::POST, url, Some(body)).await
    }

    pub async fn patch(&self, operation: &str, url: &str, body: &serde_json::Value) -> Result<String> {
        self.send(operation, Method::PATCH, url, Some(body)).await
    }

    pub async fn delete(&self, operation: &str, url: &str) -> Result<String> {
        self.send(operation, Method::DELETE, url, None).await
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        debug!(%method, url, operation, "PostgREST request");

        let reading = method == Method::GET;
        let mut request = self
            .client
            .request(method, url)
            .headers(self.default_headers.clone());

        if self.schema != "public" {
            let profile = if reading { "Accept-Profile" } else { "Content-Profile" };
            request = request.header(profile, &self.schema);
        }
        if !reading {
            // Writes echo the affected rows, so an update or delete that matched nothing is visible
            request = request.header("Prefer", "return=representation");
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let message = Self::format_reqwest_error(e, url, operation);
            error!(operation, url, %message, "PostgREST request failed");
            ApiError::backend(operation, message)
        })?;

        Self::handle_response(response, url, operation).await
    }

    /// Helper to create better error messages from reqwest errors
    fn format_reqwest_error(e: reqwest::Error, url: &str, operation: &str) -> String {
        if e.is_timeout() {
            format!(
                "Failed to {} for {}: timeout - request took too long",
                operation, url
            )
        } else if {
            #[cfg(not(target_arch = "wasm32"))]
            {
                e.is_connect()
            }
            #[cfg(target_arch = "wasm32")]
            {
                false // is_connect not available on WASM
            }
        } {
            format!(
                "Failed to {} for {}: connection error - check network connectivity and the project URL. Error: {}",
                operation, url, e
            )
        } else if e.is_request() {
            format!(
                "Failed to {} for {}: request error - invalid URL or malformed request. Error: {}",
                operation, url, e
            )
        } else if e.is_decode() {
            format!(
                "Failed to {} for {}: decode error - unexpected response format from server. Error: {}",
                operation, url, e
            )
        } else {
            format!("Failed to {} for {}: {}", operation, url, e)
        }
    }

    /// Return the body of a 2xx response, or decode the PostgREST error
    async fn handle_response(response: reqwest::Response, url: &str, operation: &str) -> Result<String> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ApiError::backend(
                operation,
                format!("Failed to read response body from {}: {}", url, e),
            )
        })?;

        if !status.is_success() {
            let message = error_message(status.as_u16(), url, &response_text);
            error!(operation, status = status.as_u16(), %message, "PostgREST error response");
            return Err(ApiError::backend(operation, message));
        }

        Ok(response_text)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::invalid("Supabase API key contains characters not allowed in a header"))
}

/// Readable message for a non-2xx response body.
pub(crate) fn error_message(status: u16, url: &str, body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(error) if !error.message.is_empty() => format!("HTTP {}: {}", status, error.describe()),
        _ => {
            let body = if body.chars().count() > MAX_ERROR_BODY {
                format!("{}... (truncated)", body.chars().take(MAX_ERROR_BODY).collect::<String>())
            } else {
                body.to_string()
            };
            format!("HTTP {} error from {}: {}", status, url, body)
        }
    }
}

/// Decode a JSON response body.
pub(crate) fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::backend(operation, format!("unexpected response: {}", e)))
}
