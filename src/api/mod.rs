use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CollectionError, CollectionResult, FetchError};
use crate::model::{Entity, EntityId};
use crate::query::ListQuery;

pub mod model;

pub use model::{DeleteOptions, ListResponse, Page, Stats};

const USER_AGENT: &str = "bizadmin/0.1";

/// The REST contract shared by every collection endpoint.
#[async_trait]
pub trait CollectionService<E: Entity>: Send + Sync {
    /// `GET /{resource}?skip=&limit=&search=&<filters>`
    async fn list(&self, query: &ListQuery) -> CollectionResult<Page<E>>;

    /// `POST /{resource}`
    async fn create(&self, payload: &Value) -> CollectionResult<E>;

    /// `PUT /{resource}/{id}`
    async fn update(&self, id: &EntityId, payload: &Value) -> CollectionResult<E>;

    /// `DELETE /{resource}/{id}`, with the options as body when given.
    async fn delete(&self, id: &EntityId, options: Option<DeleteOptions>) -> CollectionResult<()>;

    /// `GET /{resource}/stats`
    async fn stats(&self) -> CollectionResult<Stats>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: String,
    tenant_id: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: Url, token: String) -> Result<Self, FetchError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_http(http, base_url, token))
    }

    pub fn with_http(http: Client, base_url: Url, token: String) -> Self {
        Self {
            http,
            base_url,
            token,
            tenant_id: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        let base_url = Url::parse(&cfg.api.base_url)
            .map_err(|err| FetchError::Url(format!("{}: {}", cfg.api.base_url, err)))?;
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = cfg.api.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_http(http, base_url, cfg.api.token.clone())
            .with_tenant(cfg.session_context().tenant_id))
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn collection<E: Entity>(&self, path: &str) -> RestCollection<E> {
        RestCollection {
            client: self.clone(),
            path: path.trim_matches('/').to_string(),
            _entity: PhantomData,
        }
    }

    /// Append path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, resource: &str, extra: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::Url(format!("{} cannot be a base", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(resource.split('/').filter(|s| !s.is_empty()));
            segments.extend(extra.iter().copied());
        }
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Request, FetchError> {
        let mut builder = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .header("X-Request-Id", Uuid::new_v4().to_string());
        if let Some(tenant) = &self.tenant_id {
            builder = builder.header("X-Tenant-ID", tenant);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    /// Send a request; `Ok(None)` for empty or 204 responses.
    async fn execute(&self, request: reqwest::Request) -> CollectionResult<Option<Value>> {
        info!(method = %request.method(), url = %request.url(), "api request");
        for (name, value) in request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization") {
                debug!("  {}: Bearer [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }

        let res = self
            .http
            .execute(request)
            .await
            .map_err(FetchError::from)?;
        let status = res.status();
        let text = res.text().await.map_err(FetchError::from)?;

        if !status.is_success() {
            warn!(%status, body = %text, "api error response");
            return Err(CollectionError::from_status(status, &text));
        }
        debug!(%status, bytes = text.len(), "api response");

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }
        let json = serde_json::from_str(&text)
            .map_err(|err| FetchError::Decode(format!("invalid JSON: {}", err)))?;
        Ok(Some(json))
    }
}

/// One collection endpoint, e.g. `tenants` or `crm/customers`.
pub struct RestCollection<E> {
    client: ApiClient,
    path: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for RestCollection<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for RestCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestCollection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> RestCollection<E> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch one page without decoding it; used to inspect what a backend sends.
    pub async fn list_raw(&self, query: &ListQuery) -> CollectionResult<Value> {
        let url = self.client.endpoint(&self.path, &[])?;
        let request = self
            .client
            .build_request(Method::GET, url, &query.to_params(), None)?;
        Ok(self.client.execute(request).await?.unwrap_or(Value::Null))
    }

    fn decode_entity(&self, body: Option<Value>) -> CollectionResult<E> {
        let body = body.ok_or_else(|| FetchError::Decode("empty response body".into()))?;
        serde_json::from_value(body)
            .map_err(|err| FetchError::Decode(format!("{}: {}", self.path, err)).into())
    }
}

#[async_trait]
impl<E: Entity> CollectionService<E> for RestCollection<E> {
    #[instrument(skip_all, fields(resource = %self.path, page = query.page))]
    async fn list(&self, query: &ListQuery) -> CollectionResult<Page<E>> {
        let body = self.list_raw(query).await?;
        let decoded = ListResponse::<E>::decode(body).map_err(|err| {
            warn!(%err, "rejecting list response");
            err
        })?;
        debug!(shape = decoded.shape(), "decoded list response");
        Ok(decoded.into_page())
    }

    #[instrument(skip_all, fields(resource = %self.path))]
    async fn create(&self, payload: &Value) -> CollectionResult<E> {
        let url = self.client.endpoint(&self.path, &[])?;
        let request = self
            .client
            .build_request(Method::POST, url, &[], Some(payload))?;
        let body = self.client.execute(request).await?;
        self.decode_entity(body)
    }

    #[instrument(skip_all, fields(resource = %self.path, id = %id))]
    async fn update(&self, id: &EntityId, payload: &Value) -> CollectionResult<E> {
        let url = self.client.endpoint(&self.path, &[id.as_str()])?;
        let request = self
            .client
            .build_request(Method::PUT, url, &[], Some(payload))?;
        let body = self.client.execute(request).await?;
        self.decode_entity(body)
    }

    #[instrument(skip_all, fields(resource = %self.path, id = %id))]
    async fn delete(&self, id: &EntityId, options: Option<DeleteOptions>) -> CollectionResult<()> {
        let url = self.client.endpoint(&self.path, &[id.as_str()])?;
        let body = options
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        let request = self
            .client
            .build_request(Method::DELETE, url, &[], body.as_ref())?;
        self.client.execute(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(resource = %self.path))]
    async fn stats(&self) -> CollectionResult<Stats> {
        let url = self.client.endpoint(&self.path, &["stats"])?;
        let request = self.client.build_request(Method::GET, url, &[], None)?;
        let body = self.client.execute(request).await?.unwrap_or(Value::Null);
        Ok(Stats::decode(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ApiClient {
        ApiClient::new(
            Url::parse("https://api.example.com/api/v1/").unwrap(),
            "secret-token".into(),
        )
        .unwrap()
        .with_tenant(Some("tenant-9".into()))
    }

    #[test]
    fn endpoint_joins_and_encodes_segments() {
        let c = client();
        let url = c.endpoint("crm/customers", &["a b/c"]).unwrap();
        assert_eq!(url.path(), "/api/v1/crm/customers/a%20b%2Fc");

        let url = c.endpoint("tenants", &["stats"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/v1/tenants/stats");
    }

    #[test]
    fn build_request_sets_headers_and_query() {
        let c = client();
        let url = c.endpoint("tenants", &[]).unwrap();
        let mut q = ListQuery::new(2, 20);
        q.search = "acme".into();
        q.filters.insert("status".into(), "active".into());
        let request = c
            .build_request(Method::GET, url, &q.to_params(), None)
            .unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.url().query(),
            Some("skip=20&limit=20&search=acme&status=active")
        );
        let headers = request.headers();
        assert_eq!(
            headers.get("Authorization").and_then(|h| h.to_str().ok()),
            Some("Bearer secret-token")
        );
        assert_eq!(
            headers.get("X-Tenant-ID").and_then(|h| h.to_str().ok()),
            Some("tenant-9")
        );
        assert!(headers.get("X-Request-Id").is_some());
    }

    #[test]
    fn build_request_serializes_json_body() {
        let c = client();
        let url = c.endpoint("tenants", &["7"]).unwrap();
        let body = json!({ "deleteAllData": true });
        let request = c
            .build_request(Method::DELETE, url, &[], Some(&body))
            .unwrap();
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok()),
            Some("application/json")
        );
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(bytes).unwrap(), body);
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("tenant-9"));
    }
}
