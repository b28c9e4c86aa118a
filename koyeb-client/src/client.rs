//! Koyeb REST client (reqwest-based)
//!
//! Implements the read-only `KoyebApi` capability used by the mapper and the
//! waiter, plus the write endpoints the provider needs.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use koyeb_core::api::{
    ApiError, ApiResult, App, Deployment, Domain, KoyebApi, Page, Secret, Service, Volume,
};

use crate::config::ClientConfig;
use crate::models::{
    CreateApp, CreateDomain, CreateService, CreateVolume, SecretBody, UpdateDomain,
    UpdateService, UpdateVolume,
};

/// Koyeb API client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct KoyebClient {
    http: Client,
    config: ClientConfig,
}

impl KoyebClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Use a caller-provided reqwest client (shared pools, tests)
    pub fn with_http_client(config: ClientConfig, http: Client) -> Self {
        Self { http, config }
    }

    /// Create a client from `KOYEB_*` environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    // ── Apps ──────────────────────────────────────────────────────────

    pub async fn create_app(&self, body: &CreateApp) -> ApiResult<App> {
        self.send_json(Method::POST, "/v1/apps", "app", Some(body))
            .await
    }

    pub async fn delete_app(&self, id: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("/v1/apps/{}", id), "app")
            .await
    }

    // ── Services ──────────────────────────────────────────────────────

    pub async fn create_service(&self, body: &CreateService) -> ApiResult<Service> {
        self.send_json(Method::POST, "/v1/services", "service", Some(body))
            .await
    }

    pub async fn update_service(&self, id: &str, body: &UpdateService) -> ApiResult<Service> {
        self.send_json(
            Method::PUT,
            &format!("/v1/services/{}", id),
            "service",
            Some(body),
        )
        .await
    }

    pub async fn delete_service(&self, id: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("/v1/services/{}", id), "service")
            .await
    }

    // ── Domains ───────────────────────────────────────────────────────

    pub async fn create_domain(&self, body: &CreateDomain) -> ApiResult<Domain> {
        self.send_json(Method::POST, "/v1/domains", "domain", Some(body))
            .await
    }

    pub async fn update_domain(&self, id: &str, body: &UpdateDomain) -> ApiResult<Domain> {
        self.send_json(
            Method::PATCH,
            &format!("/v1/domains/{}", id),
            "domain",
            Some(body),
        )
        .await
    }

    pub async fn delete_domain(&self, id: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("/v1/domains/{}", id), "domain")
            .await
    }

    // ── Secrets ───────────────────────────────────────────────────────

    pub async fn create_secret(&self, body: &SecretBody) -> ApiResult<Secret> {
        self.send_json(Method::POST, "/v1/secrets", "secret", Some(body))
            .await
    }

    pub async fn update_secret(&self, id: &str, body: &SecretBody) -> ApiResult<Secret> {
        self.send_json(
            Method::PUT,
            &format!("/v1/secrets/{}", id),
            "secret",
            Some(body),
        )
        .await
    }

    pub async fn delete_secret(&self, id: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("/v1/secrets/{}", id), "secret")
            .await
    }

    /// Reveal the value of a secret. Plain secrets yield a string, registry
    /// secrets an object with the registry credentials.
    pub async fn reveal_secret(&self, id: &str) -> ApiResult<serde_json::Value> {
        let empty = serde_json::Map::new();
        self.send_json(
            Method::POST,
            &format!("/v1/secrets/{}/reveal", id),
            "value",
            Some(&empty),
        )
        .await
    }

    // ── Volumes ───────────────────────────────────────────────────────

    pub async fn create_volume(&self, body: &CreateVolume) -> ApiResult<Volume> {
        self.send_json(Method::POST, "/v1/volumes", "volume", Some(body))
            .await
    }

    pub async fn update_volume(&self, id: &str, body: &UpdateVolume) -> ApiResult<Volume> {
        self.send_json(
            Method::POST,
            &format!("/v1/volumes/{}", id),
            "volume",
            Some(body),
        )
        .await
    }

    pub async fn delete_volume(&self, id: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("/v1/volumes/{}", id), "volume")
            .await
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_url, path);
        debug!("Koyeb {} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.config.token)
    }

    /// GET a listing endpoint and extract one page of `key`
    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        query: &[(&str, String)],
    ) -> ApiResult<Page<T>> {
        let response = self
            .request(Method::GET, path)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let body = self.read_body(response, key).await?;

        let has_next = body.get("has_next").and_then(serde_json::Value::as_bool);
        let items = match body.get(key) {
            Some(items) => serde_json::from_value(items.clone())
                .map_err(|e| ApiError::Decode(format!("{}: {}", key, e)))?,
            None => Vec::new(),
        };
        Ok(Page::new(items, has_next))
    }

    /// Send a request and decode the object found under `key`
    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        key: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            if self.config.debug {
                debug!(
                    "Request body: {}",
                    serde_json::to_string(body).unwrap_or_default()
                );
            }
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(transport)?;
        let mut envelope = self.read_body(response, key).await?;

        let value = envelope
            .get_mut(key)
            .map(serde_json::Value::take)
            .ok_or_else(|| ApiError::Decode(format!("missing '{}' in response", key)))?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{}: {}", key, e)))
    }

    async fn send_empty(&self, method: Method, path: &str, resource: &str) -> ApiResult<()> {
        let response = self
            .request(method, path)
            .send()
            .await
            .map_err(transport)?;
        self.read_body(response, resource).await.map(|_| ())
    }

    /// Turn a response into JSON, mapping error statuses to `ApiError`
    async fn read_body(&self, response: Response, resource: &str) -> ApiResult<serde_json::Value> {
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        if self.config.debug {
            debug!("Response {}: {}", status, text);
        }

        if !status.is_success() {
            return Err(error_for_status(status, resource, text));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, key: &str) -> ApiResult<T> {
        self.send_json::<T, ()>(Method::GET, path, key, None).await
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

fn error_for_status(status: StatusCode, resource: &str, body: String) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::not_found(resource, body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
            body,
        },
        _ => ApiError::Http {
            resource: resource.to_string(),
            status: status.as_u16(),
            body: if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            },
        },
    }
}

fn page_query(offset: usize, limit: usize) -> Vec<(&'static str, String)> {
    vec![("offset", offset.to_string()), ("limit", limit.to_string())]
}

#[async_trait]
impl KoyebApi for KoyebClient {
    async fn list_apps(&self, offset: usize, limit: usize) -> ApiResult<Page<App>> {
        self.list("/v1/apps", "apps", &page_query(offset, limit))
            .await
    }

    async fn list_services(
        &self,
        app_id: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> ApiResult<Page<Service>> {
        let mut query = page_query(offset, limit);
        if let Some(app_id) = app_id {
            query.push(("app_id", app_id.to_string()));
        }
        self.list("/v1/services", "services", &query).await
    }

    async fn list_domains(&self, offset: usize, limit: usize) -> ApiResult<Page<Domain>> {
        self.list("/v1/domains", "domains", &page_query(offset, limit))
            .await
    }

    async fn list_secrets(&self, offset: usize, limit: usize) -> ApiResult<Page<Secret>> {
        self.list("/v1/secrets", "secrets", &page_query(offset, limit))
            .await
    }

    async fn get_app(&self, id: &str) -> ApiResult<App> {
        self.get_one(&format!("/v1/apps/{}", id), "app").await
    }

    async fn get_service(&self, id: &str) -> ApiResult<Service> {
        self.get_one(&format!("/v1/services/{}", id), "service")
            .await
    }

    async fn get_domain(&self, id: &str) -> ApiResult<Domain> {
        self.get_one(&format!("/v1/domains/{}", id), "domain")
            .await
    }

    async fn get_deployment(&self, id: &str) -> ApiResult<Deployment> {
        self.get_one(&format!("/v1/deployments/{}", id), "deployment")
            .await
    }

    async fn get_secret(&self, id: &str) -> ApiResult<Secret> {
        self.get_one(&format!("/v1/secrets/{}", id), "secret")
            .await
    }

    async fn get_volume(&self, id: &str) -> ApiResult<Volume> {
        self.get_one(&format!("/v1/volumes/{}", id), "volume")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status() {
        let err = error_for_status(StatusCode::NOT_FOUND, "app", "no app".to_string());
        assert!(err.is_not_found());

        let err = error_for_status(StatusCode::FORBIDDEN, "app", String::new());
        assert!(matches!(err, ApiError::Unauthorized { status: 403, .. }));

        let err = error_for_status(StatusCode::BAD_GATEWAY, "service", String::new());
        match err {
            ApiError::Http { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "HTTP 502 Bad Gateway");
            }
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_page_query() {
        assert_eq!(
            page_query(200, 100),
            vec![("offset", "200".to_string()), ("limit", "100".to_string())]
        );
    }
}
