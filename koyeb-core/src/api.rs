//! API - The listing/fetch capability the provider core depends on
//!
//! The mapper and the waiter never talk HTTP themselves. They are handed a
//! `&dyn KoyebApi`, which the real client (and test fakes) implement.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by an API client
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested object does not exist (HTTP 404)
    #[error("{resource} not found: {body}")]
    NotFound { resource: String, body: String },

    /// The credential was rejected (HTTP 401/403)
    #[error("Authentication failed ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Any other non-success HTTP status
    #[error("HTTP {status} from {resource}: {body}")]
    Http {
        resource: String,
        status: u16,
        body: String,
    },

    /// Network or connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The client is misconfigured
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, body: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            body: body.into(),
        }
    }

    /// Returns true if the error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One page of a listing endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Whether the server reported more pages. `None` when the endpoint
    /// did not say, in which case a full page implies there may be more.
    pub has_next: Option<bool>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_next: Option<bool>) -> Self {
        Self { items, has_next }
    }

    /// Decide whether another page should be requested after this one
    pub fn has_more(&self, limit: usize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        match self.has_next {
            Some(more) => more,
            None => self.items.len() >= limit,
        }
    }
}

/// An item returned by a listing endpoint
///
/// This is how each resource kind exposes its display name to the mapper.
pub trait Listed {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    /// Owning app, for kinds scoped to an app
    fn app_id(&self) -> Option<&str> {
        None
    }
}

/// Koyeb application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    pub status: String,
    pub domains: Vec<Domain>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Koyeb service, always owned by an app
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub app_id: String,
    pub organization_id: String,
    pub status: String,
    pub version: String,
    pub messages: Vec<String>,
    pub active_deployment_id: Option<String>,
    pub latest_deployment_id: Option<String>,
    pub paused_at: Option<String>,
    pub resumed_at: Option<String>,
    pub terminated_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Custom or auto-assigned domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub app_id: Option<String>,
    pub organization_id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub domain_type: String,
    pub version: String,
    pub deployment_group: Option<String>,
    pub intended_cname: Option<String>,
    pub messages: Vec<String>,
    pub verified_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Registry kinds a `REGISTRY` secret can hold credentials for
pub const REGISTRY_KINDS: &[&str] = &[
    "docker_hub_registry",
    "github_registry",
    "gitlab_registry",
    "digital_ocean_container_registry",
    "private_registry",
    "azure_container_registry",
];

/// Secret metadata (the value is only returned by the reveal endpoint)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Remaining fields, including the registry configuration block
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Secret {
    /// The registry kind configured on this secret, if any
    pub fn registry_kind(&self) -> Option<&'static str> {
        REGISTRY_KINDS.iter().copied().find(|kind| {
            self.extra
                .get(*kind)
                .is_some_and(|value| !value.is_null())
        })
    }
}

/// A single rollout of a service definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub id: String,
    pub service_id: String,
    pub app_id: String,
    pub status: String,
    pub messages: Vec<String>,
    pub created_at: Option<String>,
}

/// Persistent volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub region: String,
    pub max_size: i64,
    pub cur_size: i64,
    pub status: String,
    pub backing_store: String,
    pub service_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub read_only: bool,
    pub organization_id: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Listed for App {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Listed for Service {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn app_id(&self) -> Option<&str> {
        Some(&self.app_id)
    }
}

impl Listed for Domain {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Listed for Secret {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Read-only capability over the Koyeb API
///
/// Listing methods take an `offset` and a `limit` and return one page.
/// Single-object getters return `ApiError::NotFound` when the object is gone.
#[async_trait]
pub trait KoyebApi: Send + Sync {
    async fn list_apps(&self, offset: usize, limit: usize) -> ApiResult<Page<App>>;

    /// List services. `app_id` narrows the listing server-side when the
    /// endpoint supports it; callers must not rely on it for correctness.
    async fn list_services(
        &self,
        app_id: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> ApiResult<Page<Service>>;

    async fn list_domains(&self, offset: usize, limit: usize) -> ApiResult<Page<Domain>>;

    async fn list_secrets(&self, offset: usize, limit: usize) -> ApiResult<Page<Secret>>;

    async fn get_app(&self, id: &str) -> ApiResult<App>;

    async fn get_service(&self, id: &str) -> ApiResult<Service>;

    async fn get_domain(&self, id: &str) -> ApiResult<Domain>;

    async fn get_deployment(&self, id: &str) -> ApiResult<Deployment>;

    async fn get_secret(&self, id: &str) -> ApiResult<Secret>;

    async fn get_volume(&self, id: &str) -> ApiResult<Volume>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_has_more_follows_server_flag() {
        let page = Page::new(vec![App::default()], Some(true));
        assert!(page.has_more(100));

        let page = Page::new(vec![App::default(); 100], Some(false));
        assert!(!page.has_more(100));
    }

    #[test]
    fn test_page_has_more_without_flag_uses_page_size() {
        let full = Page::new(vec![App::default(); 2], None);
        assert!(full.has_more(2));

        let short = Page::new(vec![App::default()], None);
        assert!(!short.has_more(2));
    }

    #[test]
    fn test_empty_page_stops_pagination() {
        let page: Page<App> = Page::new(vec![], Some(true));
        assert!(!page.has_more(100));
    }

    #[test]
    fn test_service_deserializes_with_missing_fields() {
        let service: Service = serde_json::from_str(
            r#"{"id": "s-1", "name": "web", "app_id": "a-1", "status": "HEALTHY"}"#,
        )
        .unwrap();
        assert_eq!(service.name, "web");
        assert_eq!(service.app_id(), Some("a-1"));
        assert!(service.latest_deployment_id.is_none());
    }

    #[test]
    fn test_domain_type_field_is_renamed() {
        let domain: Domain =
            serde_json::from_str(r#"{"id": "d-1", "name": "example.com", "type": "CUSTOM"}"#)
                .unwrap();
        assert_eq!(domain.domain_type, "CUSTOM");
    }

    #[test]
    fn test_secret_registry_kind() {
        let secret: Secret = serde_json::from_str(
            r#"{"id": "s-1", "name": "hub", "type": "REGISTRY", "docker_hub_registry": {"username": "me"}}"#,
        )
        .unwrap();
        assert_eq!(secret.registry_kind(), Some("docker_hub_registry"));

        let secret: Secret =
            serde_json::from_str(r#"{"id": "s-2", "name": "db", "type": "SIMPLE", "value": null}"#)
                .unwrap();
        assert_eq!(secret.registry_kind(), None);
    }

    #[test]
    fn test_api_error_not_found() {
        let error = ApiError::not_found("app", "no such app");
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "app not found: no such app");

        let error = ApiError::Transport("connection refused".to_string());
        assert!(!error.is_not_found());
    }
}
