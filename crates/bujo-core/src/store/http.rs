//! HTTP document store client
//!
//! Talks to a REST document database:
//! - `PUT    {base}/{path}` upserts a document
//! - `GET    {base}/{path}` reads one (404 means absent)
//! - `DELETE {base}/{path}` removes one
//! - `GET    {base}/{collection}?orderBy=..&field=..&greaterThan=..` lists children
//! - `POST   {base}/batch` writes several documents atomically

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{DocumentQuery, DocumentStore};
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Remote document store reached over HTTP with bearer auth.
#[derive(Clone)]
pub struct HttpDocumentStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpDocumentStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpDocumentStore")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url,
            auth_token: normalize_text_option(auth_token),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{encoded}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchWrite<'a> {
    path: &'a str,
    document: &'a Value,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    writes: Vec<BatchWrite<'a>>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn set(&self, path: &str, document: Value) -> Result<()> {
        let response = self
            .request(Method::PUT, &self.url_for(path))
            .json(&document)
            .send()
            .await?;
        ensure_success(response, "write").await
    }

    async fn set_batch(&self, documents: Vec<(String, Value)>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let body = BatchRequest {
            writes: documents
                .iter()
                .map(|(path, document)| BatchWrite { path, document })
                .collect(),
        };
        let response = self
            .request(Method::POST, &format!("{}/batch", self.base_url))
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "batch write").await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let response = self.request(Method::GET, &self.url_for(path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response, "read").await);
        }
        Ok(Some(response.json::<Value>().await?))
    }

    async fn list(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(field) = &query.order_by {
            params.push(("orderBy", field.as_str()));
        }
        if let Some((field, value)) = &query.greater_than {
            params.push(("field", field.as_str()));
            params.push(("greaterThan", value.as_str()));
        }

        let response = self
            .request(Method::GET, &self.url_for(collection))
            .query(&params)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(api_error(response, "list").await);
        }
        Ok(response.json::<ListResponse>().await?.documents)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.url_for(path))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response, "delete").await
    }
}

async fn ensure_success(response: reqwest::Response, operation: &str) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(api_error(response, operation).await)
    }
}

async fn api_error(response: reqwest::Response, operation: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Network(format!(
        "Document {operation} failed: {}",
        parse_api_error(status, &body)
    ))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("remote base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote base URL must include http:// or https://".to_string(),
        ))
    }
}
