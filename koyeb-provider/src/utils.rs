//! Utility functions for attribute validation and conversion

use std::collections::HashMap;

use koyeb_core::api::{App, Domain, Secret, Service, Volume};
use koyeb_core::resource::{Resource, Value};
use thiserror::Error;

use crate::resources::ResourceConfig;

/// Secret types accepted by the API
pub const SECRET_TYPES: &[&str] = &["SIMPLE", "REGISTRY"];

pub const DEFAULT_SECRET_TYPE: &str = "SIMPLE";

/// Backing stores accepted for volumes
pub const VOLUME_TYPES: &[&str] = &[
    "PERSISTENT_VOLUME_BACKING_STORE_INVALID",
    "PERSISTENT_VOLUME_BACKING_STORE_LOCAL_BLK",
];

pub const DEFAULT_VOLUME_TYPE: &str = "PERSISTENT_VOLUME_BACKING_STORE_LOCAL_BLK";

/// A resource block that cannot be sent to the API as written
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Missing required attribute '{0}'")]
    Missing(String),

    #[error("Unknown attribute '{0}'")]
    Unknown(String),

    #[error("Attribute '{attribute}' must be between {min} and {max} characters, got {len}")]
    Length {
        attribute: String,
        min: usize,
        max: usize,
        len: usize,
    },

    #[error("Attribute '{attribute}' must be one of {allowed:?}, got '{value}'")]
    NotAllowed {
        attribute: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Attribute '{attribute}' must be {expected}")]
    WrongType {
        attribute: String,
        expected: &'static str,
    },
}

/// Check a resource block against its type configuration
pub fn validate_resource(
    resource: &Resource,
    config: &ResourceConfig,
) -> Result<(), AttributeError> {
    for key in resource.attributes.keys() {
        if !config.attributes.iter().any(|(name, _)| name == key) {
            return Err(AttributeError::Unknown(key.clone()));
        }
    }

    for (name, required) in config.attributes {
        if *required && !resource.attributes.contains_key(*name) {
            return Err(AttributeError::Missing(name.to_string()));
        }
    }

    if let Some((min, max)) = config.name_length
        && let Some(name) = resource.attributes.get("name")
    {
        let name = name.as_str().ok_or_else(|| AttributeError::WrongType {
            attribute: "name".to_string(),
            expected: "a string",
        })?;
        validate_length("name", name, min, max)?;
    }

    Ok(())
}

pub fn validate_length(
    attribute: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), AttributeError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AttributeError::Length {
            attribute: attribute.to_string(),
            min,
            max,
            len,
        });
    }
    Ok(())
}

pub fn validate_one_of(
    attribute: &str,
    value: &str,
    allowed: &[&str],
) -> Result<(), AttributeError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AttributeError::NotAllowed {
            attribute: attribute.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

pub fn required_str<'a>(resource: &'a Resource, key: &str) -> Result<&'a str, AttributeError> {
    resource
        .get_str(key)
        .ok_or_else(|| AttributeError::Missing(key.to_string()))
}

pub fn required_int(resource: &Resource, key: &str) -> Result<i64, AttributeError> {
    match resource.attributes.get(key) {
        Some(Value::Int(i)) => Ok(*i),
        Some(_) => Err(AttributeError::WrongType {
            attribute: key.to_string(),
            expected: "an integer",
        }),
        None => Err(AttributeError::Missing(key.to_string())),
    }
}

/// Convert a map attribute to a JSON object
pub fn required_object(
    resource: &Resource,
    key: &str,
) -> Result<serde_json::Value, AttributeError> {
    match resource.attributes.get(key) {
        Some(value @ Value::Map(_)) => Ok(value.to_json()),
        Some(_) => Err(AttributeError::WrongType {
            attribute: key.to_string(),
            expected: "a map",
        }),
        None => Err(AttributeError::Missing(key.to_string())),
    }
}

// =============================================================================
// API objects to attributes
// =============================================================================

fn insert_opt(attributes: &mut HashMap<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        attributes.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn insert_str(attributes: &mut HashMap<String, Value>, key: &str, value: &str) {
    insert_opt(attributes, key, Some(value));
}

pub fn app_attributes(app: &App) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", &app.name);
    insert_str(&mut attributes, "organization_id", &app.organization_id);
    insert_str(&mut attributes, "status", &app.status);
    insert_opt(&mut attributes, "created_at", app.created_at.as_deref());
    insert_opt(&mut attributes, "updated_at", app.updated_at.as_deref());

    let domains: Vec<Value> = app
        .domains
        .iter()
        .map(|domain| {
            let mut map = HashMap::new();
            insert_str(&mut map, "id", &domain.id);
            insert_str(&mut map, "name", &domain.name);
            insert_str(&mut map, "status", &domain.status);
            insert_str(&mut map, "type", &domain.domain_type);
            Value::Map(map)
        })
        .collect();
    attributes.insert("domains".to_string(), Value::List(domains));
    attributes
}

pub fn service_attributes(service: &Service) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", &service.name);
    insert_str(&mut attributes, "app_id", &service.app_id);
    insert_str(&mut attributes, "organization_id", &service.organization_id);
    insert_str(&mut attributes, "version", &service.version);
    insert_str(&mut attributes, "status", &service.status);
    insert_str(&mut attributes, "messages", &service.messages.join(" "));
    insert_opt(
        &mut attributes,
        "latest_deployment",
        service.latest_deployment_id.as_deref(),
    );
    insert_opt(
        &mut attributes,
        "active_deployment",
        service.active_deployment_id.as_deref(),
    );
    insert_opt(&mut attributes, "paused_at", service.paused_at.as_deref());
    insert_opt(&mut attributes, "resumed_at", service.resumed_at.as_deref());
    insert_opt(
        &mut attributes,
        "terminated_at",
        service.terminated_at.as_deref(),
    );
    insert_opt(&mut attributes, "created_at", service.created_at.as_deref());
    insert_opt(&mut attributes, "updated_at", service.updated_at.as_deref());
    attributes
}

/// `app_name` is looked up separately since domains only carry the app ID
pub fn domain_attributes(domain: &Domain, app_name: Option<&str>) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", &domain.name);
    insert_opt(&mut attributes, "app_name", app_name);
    insert_str(&mut attributes, "organization_id", &domain.organization_id);
    insert_str(&mut attributes, "status", &domain.status);
    insert_str(&mut attributes, "type", &domain.domain_type);
    insert_str(&mut attributes, "version", &domain.version);
    insert_str(&mut attributes, "messages", &domain.messages.join(" "));
    insert_opt(
        &mut attributes,
        "deployment_group",
        domain.deployment_group.as_deref(),
    );
    insert_opt(
        &mut attributes,
        "intended_cname",
        domain.intended_cname.as_deref(),
    );
    insert_opt(&mut attributes, "verified_at", domain.verified_at.as_deref());
    insert_opt(&mut attributes, "created_at", domain.created_at.as_deref());
    insert_opt(&mut attributes, "updated_at", domain.updated_at.as_deref());
    attributes
}

/// Registry fields surfaced back for each registry kind
fn registry_fields(kind: &str) -> &'static [&'static str] {
    match kind {
        "private_registry" => &["username", "password", "url"],
        "azure_container_registry" => &["username", "password", "registry_name"],
        _ => &["username", "password"],
    }
}

/// `revealed` is the output of the reveal endpoint: a string for simple
/// secrets, an object of credentials for registry secrets
pub fn secret_attributes(secret: &Secret, revealed: &serde_json::Value) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", &secret.name);
    insert_str(&mut attributes, "organization_id", &secret.organization_id);
    insert_str(&mut attributes, "type", &secret.secret_type);
    insert_opt(&mut attributes, "created_at", secret.created_at.as_deref());
    insert_opt(&mut attributes, "updated_at", secret.updated_at.as_deref());

    match (secret.registry_kind(), revealed) {
        (Some(kind), serde_json::Value::Object(credentials)) => {
            let fields: HashMap<String, Value> = registry_fields(kind)
                .iter()
                .filter_map(|field| {
                    credentials
                        .get(*field)
                        .and_then(Value::from_json)
                        .map(|v| (field.to_string(), v))
                })
                .collect();
            attributes.insert(kind.to_string(), Value::Map(fields));
        }
        (_, serde_json::Value::String(value)) => {
            attributes.insert("value".to_string(), Value::String(value.clone()));
        }
        _ => {}
    }
    attributes
}

pub fn volume_attributes(volume: &Volume) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", &volume.name);
    insert_str(&mut attributes, "region", &volume.region);
    insert_str(&mut attributes, "organization_id", &volume.organization_id);
    insert_str(&mut attributes, "status", &volume.status);
    insert_str(&mut attributes, "backing_store", &volume.backing_store);
    insert_opt(&mut attributes, "service_id", volume.service_id.as_deref());
    insert_opt(&mut attributes, "snapshot_id", volume.snapshot_id.as_deref());
    insert_opt(&mut attributes, "created_at", volume.created_at.as_deref());
    insert_opt(&mut attributes, "updated_at", volume.updated_at.as_deref());
    attributes.insert("max_size".to_string(), Value::Int(volume.max_size));
    attributes.insert("cur_size".to_string(), Value::Int(volume.cur_size));
    attributes.insert("read_only".to_string(), Value::Bool(volume.read_only));
    attributes
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resources::{APP_CONFIG, SECRET_CONFIG, VOLUME_CONFIG};

    #[test]
    fn test_validate_app_name_length() {
        let resource = Resource::new("app", "web").with_attribute("name", "ab");
        assert_eq!(
            validate_resource(&resource, &APP_CONFIG),
            Err(AttributeError::Length {
                attribute: "name".to_string(),
                min: 3,
                max: 23,
                len: 2,
            })
        );

        let resource = Resource::new("app", "web").with_attribute("name", "my-app");
        assert_eq!(validate_resource(&resource, &APP_CONFIG), Ok(()));
    }

    #[test]
    fn test_validate_missing_and_unknown_attributes() {
        let resource = Resource::new("volume", "data").with_attribute("name", "data");
        assert_eq!(
            validate_resource(&resource, &VOLUME_CONFIG),
            Err(AttributeError::Missing("region".to_string()))
        );

        let resource = Resource::new("secret", "db")
            .with_attribute("name", "db")
            .with_attribute("valeu", "typo");
        assert_eq!(
            validate_resource(&resource, &SECRET_CONFIG),
            Err(AttributeError::Unknown("valeu".to_string()))
        );
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("type", "SIMPLE", SECRET_TYPES).is_ok());
        let err = validate_one_of("type", "simple", SECRET_TYPES).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute 'type' must be one of [\"SIMPLE\", \"REGISTRY\"], got 'simple'"
        );
    }

    #[test]
    fn test_required_int_rejects_strings() {
        let resource = Resource::new("volume", "data").with_attribute("max_size", "10");
        assert!(matches!(
            required_int(&resource, "max_size"),
            Err(AttributeError::WrongType { .. })
        ));
    }

    #[test]
    fn test_domain_attributes_skip_missing_app() {
        let domain = Domain {
            id: "d-1".to_string(),
            name: "example.com".to_string(),
            domain_type: "CUSTOM".to_string(),
            messages: vec!["Pending".to_string(), "verification".to_string()],
            ..Default::default()
        };
        let attributes = domain_attributes(&domain, None);
        assert_eq!(
            attributes.get("messages"),
            Some(&Value::String("Pending verification".to_string()))
        );
        assert!(!attributes.contains_key("app_name"));
        assert!(!attributes.contains_key("verified_at"));
    }

    #[test]
    fn test_simple_secret_attributes_carry_value() {
        let secret = Secret {
            name: "db-password".to_string(),
            secret_type: "SIMPLE".to_string(),
            ..Default::default()
        };
        let attributes = secret_attributes(&secret, &json!("hunter2"));
        assert_eq!(attributes.get("value"), Some(&Value::from("hunter2")));
    }

    #[test]
    fn test_registry_secret_attributes_keep_known_fields() {
        let secret: Secret = serde_json::from_value(json!({
            "name": "registry",
            "type": "REGISTRY",
            "private_registry": {"username": "me", "url": "registry.example.com"}
        }))
        .unwrap();
        let revealed = json!({
            "username": "me",
            "password": "pw",
            "url": "registry.example.com",
            "unexpected": "dropped"
        });

        let attributes = secret_attributes(&secret, &revealed);
        let Some(Value::Map(registry)) = attributes.get("private_registry") else {
            panic!("Expected private_registry map");
        };
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("password"), Some(&Value::from("pw")));
        assert!(!attributes.contains_key("value"));
    }
}
