//! Request bodies for the write endpoints
//!
//! Read models live in `koyeb_core::api` since the mapper and waiter consume
//! them. Only the provider writes, so these stay in the client.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CreateApp {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDomain {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(rename = "type")]
    pub domain_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateDomain {
    /// Empty string detaches the domain from its app
    pub app_id: String,
}

/// Body for creating or updating a secret
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretBody {
    pub name: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Registry credentials, keyed by registry kind (e.g. `docker_hub_registry`)
    #[serde(flatten)]
    pub registry: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateService {
    pub app_id: String,
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateService {
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolume {
    pub name: String,
    pub volume_type: String,
    pub max_size: i64,
    pub region: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateVolume {
    pub name: String,
    pub max_size: i64,
}
