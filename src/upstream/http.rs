// src/upstream/http.rs — reqwest client for the answer service

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::body::BodyStream;
use super::types::{AskRequest, DocumentInfo, DocumentListResponse, HealthResponse};
use super::{AnswerSource, ByteStream};
use crate::infra::config::ServerConfig;
use crate::infra::errors::ChatError;

pub struct HttpAnswerSource {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpAnswerSource {
    pub fn new(config: &ServerConfig) -> Result<Self, ChatError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChatError> {
        self.base_url
            .join(path)
            .map_err(|e| ChatError::Config(format!("Invalid endpoint '{path}': {e}")))
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>, ChatError> {
        let response = self
            .client
            .get(self.endpoint("documents")?)
            .send()
            .await
            .map_err(unreachable_service)?;
        let response = check_status(response)?;
        let list: DocumentListResponse = response.json().await?;
        Ok(list.documents)
    }

    pub async fn health(&self) -> Result<HealthResponse, ChatError> {
        let response = self
            .client
            .get(self.endpoint("health")?)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(unreachable_service)?;
        Ok(check_status(response)?.json().await?)
    }
}

#[async_trait]
impl AnswerSource for HttpAnswerSource {
    async fn open(&self, request: &AskRequest) -> Result<ByteStream, ChatError> {
        let response = self
            .client
            .post(self.endpoint("ask")?)
            .json(request)
            .send()
            .await
            .map_err(unreachable_service)?;

        let response = check_status(response)?;
        tracing::debug!(
            document = %request.document_id,
            "answer stream opened"
        );
        Ok(Box::pin(BodyStream::new(response.bytes_stream())))
    }
}

/// Endpoints are joined relative to the base, so it must end with `/`.
fn parse_base_url(raw: &str) -> Result<Url, ChatError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ChatError::Config(format!("Invalid base URL '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ChatError::Config(format!("Invalid base URL '{raw}'")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        tracing::warn!(url = %response.url(), "answer service returned 404");
        return Err(ChatError::NotFound);
    }
    if !status.is_success() {
        tracing::warn!(url = %response.url(), status = status.as_u16(), "answer service error");
        return Err(ChatError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn unreachable_service(e: reqwest::Error) -> ChatError {
    ChatError::Transport(format!("Cannot reach answer service: {e}"))
}
