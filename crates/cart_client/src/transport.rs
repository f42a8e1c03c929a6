use anyhow::{Context, Result};
use async_trait::async_trait;
use cart_shared::protocol::SaveResponse;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::csrf::CSRF_HEADER;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{path}': {source}")]
    Endpoint {
        path: String,
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(StatusCode),
}

/// Carries one JSON save request to the cart endpoint.
#[async_trait]
pub trait SaveTransport: Send + Sync {
    async fn post_json(
        &self,
        path: &str,
        csrf_token: &str,
        body: &Value,
    ) -> Result<SaveResponse, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid cart server url '{base_url}'"))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl SaveTransport for HttpTransport {
    async fn post_json(
        &self,
        path: &str,
        csrf_token: &str,
        body: &Value,
    ) -> Result<SaveResponse, TransportError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|source| TransportError::Endpoint {
                path: path.to_string(),
                source,
            })?;

        let response = self
            .http
            .post(url)
            .header(CSRF_HEADER, csrf_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        Ok(response.json().await?)
    }
}
