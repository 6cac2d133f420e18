//! Thin REST client for the Directus item, role, user and asset endpoints.

use bytes::Bytes;
use metrics::counter;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::CmsSettings;
use crate::infra::error::InfraError;
use crate::infra::telemetry::{METRIC_CMS_FAILURE, METRIC_CMS_REQUEST};

/// Query parameters understood by the Directus list endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    filter: Option<Value>,
    fields: Vec<String>,
    sort: Vec<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    search: Option<String>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort.push(field.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = self.filter.as_ref() {
            pairs.push(("filter", filter.to_string()));
        }
        if !self.fields.is_empty() {
            pairs.push(("fields", self.fields.join(",")));
        }
        if !self.sort.is_empty() {
            pairs.push(("sort", self.sort.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(search) = self.search.as_ref() {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

/// Raw bytes of a stored asset with the type reported by the CMS.
#[derive(Debug, Clone)]
pub struct AssetBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct CmsClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl std::fmt::Debug for CmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsClient")
            .field("base", &self.base.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl CmsClient {
    /// Build a client from a configuration snapshot.
    pub fn new(settings: &CmsSettings) -> Result<Self, InfraError> {
        let url = settings
            .url
            .as_ref()
            .ok_or_else(|| InfraError::configuration("cms.url (DIRECTUS_URL) is not set"))?;

        let mut base = url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build cms http client: {err}"))
            })?;

        Ok(Self {
            http,
            base,
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("folio/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Copy of this client that authenticates with `token` instead.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            http: self.http.clone(),
            base: self.base.clone(),
            token: Some(token.to_string()),
        }
    }

    pub async fn list_items<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &ItemQuery,
    ) -> Result<ItemsResponse<T>, InfraError> {
        let url = with_query(self.endpoint(&["items", collection])?, query);
        let response = self.send(self.http.request(Method::GET, url)).await?;
        decode(response).await
    }

    /// First item whose `slug` equals `slug`, if any.
    pub async fn read_item_by_slug<T: DeserializeOwned>(
        &self,
        collection: &str,
        slug: &str,
        query: &ItemQuery,
    ) -> Result<Option<T>, InfraError> {
        let query = query
            .clone()
            .filter(serde_json::json!({ "slug": { "_eq": slug } }))
            .limit(1);
        let page: ItemsResponse<T> = self.list_items(collection, &query).await?;
        Ok(page.data.into_iter().next())
    }

    pub async fn create_item<T: DeserializeOwned>(
        &self,
        collection: &str,
        body: &Value,
        query: &ItemQuery,
    ) -> Result<T, InfraError> {
        let url = with_query(self.endpoint(&["items", collection])?, query);
        let response = self
            .send(self.http.request(Method::POST, url).json(body))
            .await?;
        let item: ItemResponse<T> = decode(response).await?;
        Ok(item.data)
    }

    pub async fn read_roles<T: DeserializeOwned>(
        &self,
        query: &ItemQuery,
    ) -> Result<Vec<T>, InfraError> {
        let url = with_query(self.endpoint(&["roles"])?, query);
        let response = self.send(self.http.request(Method::GET, url)).await?;
        let page: ItemsResponse<T> = decode(response).await?;
        Ok(page.data)
    }

    pub async fn read_users<T: DeserializeOwned>(
        &self,
        query: &ItemQuery,
    ) -> Result<Vec<T>, InfraError> {
        let url = with_query(self.endpoint(&["users"])?, query);
        let response = self.send(self.http.request(Method::GET, url)).await?;
        let page: ItemsResponse<T> = decode(response).await?;
        Ok(page.data)
    }

    /// Download the asset stored under `key`; `key` may contain `/`.
    pub async fn fetch_asset(&self, key: &str) -> Result<AssetBody, InfraError> {
        let mut segments = vec!["assets"];
        segments.extend(key.split('/').filter(|segment| !segment.is_empty()));
        let url = self.endpoint(&segments)?;

        let response = self.send(self.http.request(Method::GET, url)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(AssetBody {
            bytes,
            content_type,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::configuration(format!("cms url `{}` cannot be a base", self.base))
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, InfraError> {
        let request = match self.token.as_deref() {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                    InfraError::configuration(format!("cms token is not a valid header: {err}"))
                })?;
                request.header(AUTHORIZATION, value)
            }
            None => request,
        };

        counter!(METRIC_CMS_REQUEST).increment(1);
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                counter!(METRIC_CMS_FAILURE, "kind" => "transport").increment(1);
                warn!(target: "folio::infra::cms", error = %err, "cms request failed");
                return Err(InfraError::Http(err));
            }
        };

        let status = response.status();
        debug!(
            target: "folio::infra::cms",
            url = %response.url(),
            status = status.as_u16(),
            "cms response"
        );
        if status.is_success() {
            return Ok(response);
        }

        counter!(METRIC_CMS_FAILURE, "kind" => "status").increment(1);
        Err(upstream_error(status, response).await)
    }
}

fn with_query(mut url: Url, query: &ItemQuery) -> Url {
    let pairs = query.to_pairs();
    if !pairs.is_empty() {
        let mut serializer = url.query_pairs_mut();
        for (key, value) in &pairs {
            serializer.append_pair(key, value);
        }
    }
    url
}

async fn upstream_error(status: StatusCode, response: Response) -> InfraError {
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.errors.into_iter().next())
        .map(|entry| entry.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    InfraError::upstream(status.as_u16(), message)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, InfraError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|err| InfraError::decode(format!("failed to parse cms payload: {err}")))
}
