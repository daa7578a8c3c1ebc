//! Real remote sources
//!
//! - [`HttpRegionSource`]: the regions endpoint (`GET <endpoint>` for roots,
//!   `GET <endpoint>?parentCode=<code>` for children)
//! - [`HttpDictionarySource`]: static JSON assets served over HTTP
//! - [`FileDictionarySource`]: the same assets read from disk

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use his_core::{
    DictionaryKind, DictionaryRecord, DictionarySource, RegionRecord, RegionSource, SourceError,
};

/// Query parameter carrying the parent code
pub const PARENT_CODE_PARAM: &str = "parentCode";

async fn get_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::decode(e.to_string()))
}

/// Region source backed by the hospital regions endpoint
#[derive(Debug, Clone)]
pub struct HttpRegionSource {
    client: Client,
    endpoint: String,
}

impl HttpRegionSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Share an existing client (connection pool)
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RegionSource for HttpRegionSource {
    async fn fetch_roots(&self) -> Result<Vec<RegionRecord>, SourceError> {
        debug!(endpoint = %self.endpoint, "Fetching provinces");
        get_json(self.client.get(&self.endpoint)).await
    }

    async fn fetch_children(&self, parent_code: &str) -> Result<Vec<RegionRecord>, SourceError> {
        debug!(endpoint = %self.endpoint, parent_code, "Fetching children");
        get_json(
            self.client
                .get(&self.endpoint)
                .query(&[(PARENT_CODE_PARAM, parent_code)]),
        )
        .await
    }
}

/// Dictionary source fetching static JSON assets over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpDictionarySource {
    client: Client,
    ethnicity_url: Option<String>,
    nationality_url: Option<String>,
}

impl HttpDictionarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_ethnicity_url(mut self, url: impl Into<String>) -> Self {
        self.ethnicity_url = Some(url.into());
        self
    }

    pub fn with_nationality_url(mut self, url: impl Into<String>) -> Self {
        self.nationality_url = Some(url.into());
        self
    }

    fn url(&self, kind: DictionaryKind) -> Option<&str> {
        match kind {
            DictionaryKind::Ethnicity => self.ethnicity_url.as_deref(),
            DictionaryKind::Nationality => self.nationality_url.as_deref(),
        }
    }
}

#[async_trait]
impl DictionarySource for HttpDictionarySource {
    async fn fetch_dictionary(
        &self,
        kind: DictionaryKind,
    ) -> Result<Vec<DictionaryRecord>, SourceError> {
        let url = self
            .url(kind)
            .ok_or_else(|| SourceError::unavailable(format!("no URL configured for {kind}")))?;
        debug!(%kind, url, "Fetching dictionary");
        get_json(self.client.get(url)).await
    }
}

/// Dictionary source reading JSON assets from local files
#[derive(Debug, Clone, Default)]
pub struct FileDictionarySource {
    ethnicity_path: Option<PathBuf>,
    nationality_path: Option<PathBuf>,
}

impl FileDictionarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ethnicity_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ethnicity_path = Some(path.into());
        self
    }

    pub fn with_nationality_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.nationality_path = Some(path.into());
        self
    }
}

#[async_trait]
impl DictionarySource for FileDictionarySource {
    async fn fetch_dictionary(
        &self,
        kind: DictionaryKind,
    ) -> Result<Vec<DictionaryRecord>, SourceError> {
        let path = match kind {
            DictionaryKind::Ethnicity => self.ethnicity_path.as_ref(),
            DictionaryKind::Nationality => self.nationality_path.as_ref(),
        }
        .ok_or_else(|| SourceError::unavailable(format!("no file configured for {kind}")))?;

        debug!(%kind, path = %path.display(), "Reading dictionary");
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| SourceError::decode(e.to_string()))
    }
}
